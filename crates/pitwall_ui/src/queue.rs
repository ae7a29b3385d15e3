//! Outbound call buffering and the batched flush loop.
//!
//! A single scheduling tick can accumulate dozens of independent "refresh this
//! widget" requests from unrelated plugins reacting to the same upstream
//! event. Sending them individually would multiply round trips by the number
//! of plugins and recipients, so queued updates are drained once per tick into
//! one batched transport call.

use pitwall_transport::{Call, DedicatedClient, TransportError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error};

/// Default flush tick interval.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(250);

/// Per-manager buffer of pending outbound operations plus the periodically
/// ticking flush loop that drains it.
///
/// Producers (plugin code, via [`crate::Manialink`]) push at any time; the
/// flush loop is the sole consumer. The hand-off is swap-and-clear: a flush
/// captures the entire pending list atomically, so entries arriving during a
/// send land in the next tick's batch, never lost and never duplicated.
///
/// The pending list is unbounded between ticks; realistic event rates bound
/// it in practice and [`OutboundQueue::len`] exposes it for monitoring.
pub struct OutboundQueue {
    client: Arc<dyn DedicatedClient>,
    pending: Mutex<Vec<Call>>,
    flush_interval: Duration,
}

impl OutboundQueue {
    pub fn new(client: Arc<dyn DedicatedClient>, flush_interval: Duration) -> Self {
        Self {
            client,
            pending: Mutex::new(Vec::new()),
            flush_interval,
        }
    }

    pub fn with_default_interval(client: Arc<dyn DedicatedClient>) -> Self {
        Self::new(client, DEFAULT_FLUSH_INTERVAL)
    }

    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    /// Append one operation for the next flush.
    pub async fn push(&self, call: Call) {
        self.pending.lock().await.push(call);
    }

    /// Append a group of operations for the next flush.
    pub async fn push_all(&self, calls: Vec<Call>) {
        self.pending.lock().await.extend(calls);
    }

    /// Number of operations currently pending.
    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pending.lock().await.is_empty()
    }

    /// Immediate-mode delivery: send `calls` as one batched call right away.
    ///
    /// A recipient disconnecting races with the send and is not an error;
    /// that condition is swallowed. Any other transport error surfaces.
    pub async fn send_now(&self, calls: Vec<Call>) -> Result<(), TransportError> {
        if calls.is_empty() {
            return Ok(());
        }
        match self.client.call_batch(calls).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_recipient_gone() => {
                debug!("Recipient gone during immediate send, dropping: {}", e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Drain the pending list into one batched transport call.
    ///
    /// Returns the number of operations captured by the swap. An empty
    /// pending list means no transport call at all. A recipient-gone batch is
    /// discarded entirely (no partial resend); other transport errors are
    /// returned for the loop to log.
    pub async fn flush(&self) -> Result<usize, TransportError> {
        let batch = {
            let mut pending = self.pending.lock().await;
            std::mem::take(&mut *pending)
        };
        if batch.is_empty() {
            return Ok(0);
        }

        let count = batch.len();
        debug!("📤 Flushing {} batched UI operations", count);
        match self.client.call_batch(batch).await {
            Ok(_) => Ok(count),
            Err(e) if e.is_recipient_gone() => {
                debug!("Recipient gone during batched flush, batch dropped: {}", e);
                Ok(count)
            }
            Err(e) => Err(e),
        }
    }

    /// Run the flush loop for the lifetime of the process.
    ///
    /// Ticks on the configured interval; transport errors are logged and the
    /// loop keeps ticking. It is never expected to terminate under normal
    /// operation.
    pub async fn run(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.flush_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Err(e) = self.flush().await {
                error!("❌ Batched UI flush failed: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for OutboundQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundQueue")
            .field("flush_interval", &self.flush_interval)
            .finish()
    }
}
