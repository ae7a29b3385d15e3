//! Transport boundary between the controller and the dedicated server.
//!
//! The concrete RPC client is an external collaborator; this crate only
//! specifies the seam. The controller consumes [`DedicatedClient`] for
//! outbound calls and feeds inbound wire callbacks into the event system
//! itself.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One RPC invocation against the dedicated server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    /// Remote method name (e.g. "SendDisplayManialinkPageToLogin")
    pub method: String,
    /// Positional parameters, JSON-encoded
    pub params: Vec<Value>,
}

impl Call {
    pub fn new(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

/// Errors reported by the transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The addressed recipient is unknown or no longer connected.
    ///
    /// Recipients race with sends; at the UI-push boundary this condition is
    /// swallowed rather than surfaced.
    #[error("recipient gone: {0}")]
    RecipientGone(String),
    /// The dedicated server rejected the call with a fault
    #[error("server fault {code}: {message}")]
    Fault { code: i32, message: String },
    /// The connection to the dedicated server failed
    #[error("connection error: {0}")]
    Connection(String),
}

impl TransportError {
    /// Whether this is the documented disconnected-recipient condition.
    pub fn is_recipient_gone(&self) -> bool {
        matches!(self, TransportError::RecipientGone(_))
    }
}

/// Asynchronous RPC client for the dedicated server.
///
/// `call_batch` submits the whole list as one multicall round trip; a
/// recipient-gone condition anywhere in the batch surfaces as
/// [`TransportError::RecipientGone`] for the batch.
#[async_trait]
pub trait DedicatedClient: Send + Sync {
    async fn call(&self, call: Call) -> Result<Value, TransportError>;

    async fn call_batch(&self, calls: Vec<Call>) -> Result<Vec<Value>, TransportError>;
}
