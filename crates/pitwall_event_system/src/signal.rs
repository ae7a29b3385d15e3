//! Signal dispatch: ordered subscriber lists, processing steps, and the two
//! dispatch modes (fail-fast and fault-isolated).
//!
//! Receivers are normalized to a single asynchronous calling convention at
//! registration time. Adapters are provided for plain closures
//! ([`FnReceiver`]), async closures ([`AsyncFnReceiver`]), and typed closures
//! that deserialize the payload into a concrete event struct
//! ([`TypedReceiver`]).

use crate::error::SignalError;
use crate::topic::Topic;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error};
use uuid::Uuid;

/// Handle returned by subscription, used for targeted removal.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Identity of the component that owns a subscription.
///
/// Owner-scoped ("weak") subscriptions are removed when their owner is torn
/// down via [`Signal::purge_owner`]; this replaces garbage-collection-timing
/// tricks with explicit lifetime coupling.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A subscriber normalized to the asynchronous calling convention.
#[async_trait]
pub trait SignalReceiver: Send + Sync {
    /// Handle one dispatched payload.
    async fn handle(&self, payload: &Value) -> Result<(), SignalError>;

    /// Receiver name for logging and diagnostics.
    fn name(&self) -> &str;
}

/// Adapter wrapping a synchronous closure as a receiver.
pub struct FnReceiver<F> {
    name: String,
    f: F,
}

impl<F> FnReceiver<F>
where
    F: Fn(&Value) -> Result<(), SignalError> + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, f: F) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            f,
        })
    }
}

#[async_trait]
impl<F> SignalReceiver for FnReceiver<F>
where
    F: Fn(&Value) -> Result<(), SignalError> + Send + Sync + 'static,
{
    async fn handle(&self, payload: &Value) -> Result<(), SignalError> {
        (self.f)(payload)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Adapter wrapping an async closure as a receiver.
///
/// The future is boxed at construction so the subscriber list stays
/// homogeneous.
pub struct AsyncFnReceiver {
    name: String,
    f: Box<dyn Fn(Value) -> BoxFuture<'static, Result<(), SignalError>> + Send + Sync>,
}

impl AsyncFnReceiver {
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Arc<Self>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), SignalError>> + Send + 'static,
    {
        Arc::new(Self {
            name: name.into(),
            f: Box::new(move |payload| f(payload).boxed()),
        })
    }
}

#[async_trait]
impl SignalReceiver for AsyncFnReceiver {
    async fn handle(&self, payload: &Value) -> Result<(), SignalError> {
        (self.f)(payload.clone()).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Typed receiver that deserializes the payload into `T` before invoking the
/// closure, mirroring how plugins consume processed domain events.
pub struct TypedReceiver<T, F>
where
    T: DeserializeOwned,
    F: Fn(T) -> Result<(), SignalError> + Send + Sync + 'static,
{
    name: String,
    f: F,
    _phantom: std::marker::PhantomData<fn() -> T>,
}

impl<T, F> TypedReceiver<T, F>
where
    T: DeserializeOwned + Send + Sync + 'static,
    F: Fn(T) -> Result<(), SignalError> + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, f: F) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            f,
            _phantom: std::marker::PhantomData,
        })
    }
}

#[async_trait]
impl<T, F> SignalReceiver for TypedReceiver<T, F>
where
    T: DeserializeOwned + Send + Sync + 'static,
    F: Fn(T) -> Result<(), SignalError> + Send + Sync + 'static,
{
    async fn handle(&self, payload: &Value) -> Result<(), SignalError> {
        let event: T = serde_json::from_value(payload.clone())?;
        (self.f)(event)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Result of a processing step: continue with the (possibly enriched) payload,
/// or intentionally stop propagation.
///
/// `Stop` is the glue-stop control signal: it suppresses delivery to the
/// subscribers of the processed topic without being treated as an error, and
/// is never logged as one.
#[derive(Debug, Clone)]
pub enum Glue {
    Continue(Value),
    Stop,
}

/// Transforms a raw payload into the structured payload subscribers see.
///
/// The processor is the one place where malformed or uninteresting raw events
/// are filtered out, and where opaque identifiers get enriched into full
/// entities so that subscribers do not repeat the lookup.
#[async_trait]
pub trait SignalProcessor: Send + Sync {
    async fn process(&self, raw: Value) -> Result<Glue, SignalError>;
}

/// Closure-backed processor, accepting sync or async transformation steps.
pub struct FnProcessor {
    f: Box<dyn Fn(Value) -> BoxFuture<'static, Result<Glue, SignalError>> + Send + Sync>,
}

impl FnProcessor {
    pub fn new<F, Fut>(f: F) -> Arc<Self>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Glue, SignalError>> + Send + 'static,
    {
        Arc::new(Self {
            f: Box::new(move |raw| f(raw).boxed()),
        })
    }

    pub fn sync<F>(f: F) -> Arc<Self>
    where
        F: Fn(Value) -> Result<Glue, SignalError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            f: Box::new(move |raw| std::future::ready(f(raw)).boxed()),
        })
    }
}

#[async_trait]
impl SignalProcessor for FnProcessor {
    async fn process(&self, raw: Value) -> Result<Glue, SignalError> {
        (self.f)(raw).await
    }
}

/// What a dispatch did: how many receivers were delivered to, or that the
/// processing step stopped propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Receivers invoked successfully (robust mode counts only successes)
    Delivered(usize),
    /// The processor returned [`Glue::Stop`]; no receivers ran
    Stopped,
}

struct Subscription {
    id: SubscriptionId,
    receiver: Arc<dyn SignalReceiver>,
    owner: Option<OwnerId>,
    strong: bool,
}

/// Dispatcher for one topic.
///
/// Subscription order is preserved and dispatch order follows it, which keeps
/// delivery deterministic for tests. The subscriber list is not de-duplicated:
/// subscribing the same receiver twice means it is invoked twice per dispatch.
/// That is documented behavior, not a bug.
pub struct Signal {
    topic: Topic,
    processor: Option<Arc<dyn SignalProcessor>>,
    subscribers: RwLock<Vec<Subscription>>,
}

impl Signal {
    pub fn new(topic: Topic, processor: Option<Arc<dyn SignalProcessor>>) -> Self {
        Self {
            topic,
            processor,
            subscribers: RwLock::new(Vec::new()),
        }
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Append a strong, unowned receiver. Returns the subscription handle.
    pub async fn subscribe(&self, receiver: Arc<dyn SignalReceiver>) -> SubscriptionId {
        self.subscribe_with(receiver, None, true).await
    }

    /// Append a receiver with explicit ownership.
    ///
    /// A weak (`strong = false`) subscription is dropped silently when its
    /// owner is purged. A strong one survives the purge; weak is never
    /// promoted to strong.
    pub async fn subscribe_with(
        &self,
        receiver: Arc<dyn SignalReceiver>,
        owner: Option<OwnerId>,
        strong: bool,
    ) -> SubscriptionId {
        let id = SubscriptionId::new();
        let mut subscribers = self.subscribers.write().await;
        debug!("📝 Subscribed {} to {}", receiver.name(), self.topic);
        subscribers.push(Subscription {
            id,
            receiver,
            owner,
            strong,
        });
        id
    }

    /// Remove the first subscription matching `id`.
    ///
    /// Returns `false` when no match exists; that is a no-op, not an error.
    pub async fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write().await;
        match subscribers.iter().position(|s| s.id == id) {
            Some(index) => {
                subscribers.remove(index);
                true
            }
            None => false,
        }
    }

    /// Drop every weak subscription belonging to `owner`.
    ///
    /// Returns the number of subscriptions removed. Strong subscriptions of
    /// the same owner are kept.
    pub async fn purge_owner(&self, owner: &OwnerId) -> usize {
        let mut subscribers = self.subscribers.write().await;
        let before = subscribers.len();
        subscribers.retain(|s| s.strong || s.owner.as_ref() != Some(owner));
        before - subscribers.len()
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Fail-fast dispatch: the first receiver error halts delivery and
    /// propagates to the caller. Processor errors always propagate.
    pub async fn dispatch(&self, payload: Value) -> Result<DispatchOutcome, SignalError> {
        self.dispatch_inner(payload, false).await
    }

    /// Fault-isolated ("robust") dispatch: a failing receiver is logged and
    /// skipped, the remaining receivers still run, and the dispatch completes
    /// successfully. Processor errors still propagate — fault isolation covers
    /// subscribers, not the processing step.
    pub async fn dispatch_robust(&self, payload: Value) -> Result<DispatchOutcome, SignalError> {
        self.dispatch_inner(payload, true).await
    }

    async fn dispatch_inner(
        &self,
        payload: Value,
        robust: bool,
    ) -> Result<DispatchOutcome, SignalError> {
        let payload = match &self.processor {
            Some(processor) => match processor.process(payload).await? {
                Glue::Continue(structured) => structured,
                Glue::Stop => {
                    debug!("Propagation stopped by processor on {}", self.topic);
                    return Ok(DispatchOutcome::Stopped);
                }
            },
            None => payload,
        };

        // Snapshot so a receiver can subscribe/unsubscribe mid-dispatch
        // without deadlocking on the list lock.
        let receivers: Vec<Arc<dyn SignalReceiver>> = {
            let subscribers = self.subscribers.read().await;
            subscribers.iter().map(|s| s.receiver.clone()).collect()
        };

        debug!("📤 Dispatching {} to {} receivers", self.topic, receivers.len());

        let mut delivered = 0;
        for receiver in receivers {
            // Sequential, awaited in place: ordering beats concurrency here.
            match receiver.handle(&payload).await {
                Ok(()) => delivered += 1,
                Err(e) if robust => {
                    error!("❌ Receiver {} failed on {}: {}", receiver.name(), self.topic, e);
                }
                Err(e) => {
                    return Err(SignalError::Receiver {
                        receiver: receiver.name().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        Ok(DispatchOutcome::Delivered(delivered))
    }
}

impl std::fmt::Debug for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("topic", &self.topic)
            .field("has_processor", &self.processor.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Mutex;

    fn recording_receiver(
        name: &str,
        log: Arc<Mutex<Vec<String>>>,
    ) -> Arc<dyn SignalReceiver> {
        let tag = name.to_string();
        FnReceiver::new(name, move |_payload| {
            log.lock().unwrap().push(tag.clone());
            Ok(())
        })
    }

    fn failing_receiver(name: &str) -> Arc<dyn SignalReceiver> {
        FnReceiver::new(name, |_payload| {
            Err(SignalError::Receiver {
                receiver: "boom".to_string(),
                message: "intentional".to_string(),
            })
        })
    }

    #[tokio::test]
    async fn dispatch_preserves_subscription_order() {
        let signal = Signal::new(Topic::new("test", "ordering"), None);
        let log = Arc::new(Mutex::new(Vec::new()));

        signal.subscribe(recording_receiver("r1", log.clone())).await;
        signal.subscribe(recording_receiver("r2", log.clone())).await;
        signal.subscribe(recording_receiver("r3", log.clone())).await;

        let outcome = signal.dispatch(json!({})).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Delivered(3));
        assert_eq!(*log.lock().unwrap(), vec!["r1", "r2", "r3"]);
    }

    #[tokio::test]
    async fn duplicate_subscription_is_invoked_twice() {
        let signal = Signal::new(Topic::new("test", "dup"), None);
        let log = Arc::new(Mutex::new(Vec::new()));
        let receiver = recording_receiver("dup", log.clone());

        signal.subscribe(receiver.clone()).await;
        signal.subscribe(receiver).await;

        signal.dispatch(json!({})).await.unwrap();
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn robust_dispatch_isolates_failures() {
        let signal = Signal::new(Topic::new("test", "robust"), None);
        let log = Arc::new(Mutex::new(Vec::new()));

        signal.subscribe(recording_receiver("r1", log.clone())).await;
        signal.subscribe(failing_receiver("r2")).await;
        signal.subscribe(recording_receiver("r3", log.clone())).await;

        let outcome = signal.dispatch_robust(json!({})).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Delivered(2));
        assert_eq!(*log.lock().unwrap(), vec!["r1", "r3"]);
    }

    #[tokio::test]
    async fn fail_fast_dispatch_halts_on_first_error() {
        let signal = Signal::new(Topic::new("test", "failfast"), None);
        let log = Arc::new(Mutex::new(Vec::new()));

        signal.subscribe(recording_receiver("r1", log.clone())).await;
        signal.subscribe(failing_receiver("r2")).await;
        signal.subscribe(recording_receiver("r3", log.clone())).await;

        let err = signal.dispatch(json!({})).await.unwrap_err();
        assert!(matches!(err, SignalError::Receiver { .. }));
        assert_eq!(*log.lock().unwrap(), vec!["r1"]);
    }

    #[tokio::test]
    async fn processor_stop_suppresses_all_delivery() {
        let processor = FnProcessor::sync(|_raw| Ok(Glue::Stop));
        let signal = Signal::new(Topic::new("test", "stopped"), Some(processor));
        let log = Arc::new(Mutex::new(Vec::new()));

        signal.subscribe(recording_receiver("r1", log.clone())).await;

        let outcome = signal.dispatch_robust(json!(["anything"])).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Stopped);
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn processor_transforms_payload_before_delivery() {
        let processor = FnProcessor::sync(|raw| {
            let uid = raw[0].as_str().unwrap_or_default().to_string();
            Ok(Glue::Continue(json!({ "uid": uid })))
        });
        let signal = Signal::new(Topic::new("test", "enriched"), Some(processor));
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = seen.clone();

        signal
            .subscribe(FnReceiver::new("capture", move |payload| {
                *seen_clone.lock().unwrap() = Some(payload.clone());
                Ok(())
            }))
            .await;

        signal.dispatch(json!(["Map42"])).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), Some(json!({"uid": "Map42"})));
    }

    #[tokio::test]
    async fn unsubscribe_removes_first_match_and_tolerates_absence() {
        let signal = Signal::new(Topic::new("test", "unsub"), None);
        let log = Arc::new(Mutex::new(Vec::new()));

        let id = signal.subscribe(recording_receiver("r1", log.clone())).await;
        assert!(signal.unsubscribe(id).await);
        assert!(!signal.unsubscribe(id).await);

        signal.dispatch(json!({})).await.unwrap();
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn purge_owner_drops_weak_but_keeps_strong() {
        let signal = Signal::new(Topic::new("test", "owners"), None);
        let log = Arc::new(Mutex::new(Vec::new()));
        let owner = OwnerId::new("chat_plugin");

        signal
            .subscribe_with(
                recording_receiver("weak", log.clone()),
                Some(owner.clone()),
                false,
            )
            .await;
        signal
            .subscribe_with(
                recording_receiver("strong", log.clone()),
                Some(owner.clone()),
                true,
            )
            .await;

        assert_eq!(signal.purge_owner(&owner).await, 1);
        signal.dispatch(json!({})).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["strong"]);
    }

    #[tokio::test]
    async fn async_and_typed_receivers_share_the_calling_convention() {
        #[derive(Debug, Deserialize)]
        struct MapEnd {
            uid: String,
        }

        let signal = Signal::new(Topic::new("test", "adapters"), None);
        let log = Arc::new(Mutex::new(Vec::new()));

        let async_log = log.clone();
        signal
            .subscribe(AsyncFnReceiver::new("async", move |_payload| {
                let log = async_log.clone();
                async move {
                    log.lock().unwrap().push("async".to_string());
                    Ok(())
                }
            }))
            .await;

        let typed_log = log.clone();
        signal
            .subscribe(TypedReceiver::new("typed", move |event: MapEnd| {
                typed_log.lock().unwrap().push(event.uid);
                Ok(())
            }))
            .await;

        signal.dispatch(json!({"uid": "Map42"})).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["async", "Map42"]);
    }
}
