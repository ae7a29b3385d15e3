//! Error types for signal registration and dispatch.

/// Errors that can occur during signal registry and dispatch operations.
///
/// Registration-time errors (`DuplicateTopic`, `TopicNotFound`) are
/// programming errors and are allowed to fail startup fast. Receiver and
/// processor failures are dispatch-time errors; whether they surface to the
/// caller depends on the dispatch mode. An intentional propagation stop
/// ([`crate::Glue::Stop`]) is expected control flow and is not an error.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// A topic with this key is already registered
    #[error("topic already registered: {0}")]
    DuplicateTopic(String),
    /// No topic with this key is registered
    #[error("topic not found: {0}")]
    TopicNotFound(String),
    /// Payload serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// The processing step attached to a signal failed
    #[error("processor failed for {topic}: {message}")]
    Processor { topic: String, message: String },
    /// A subscribed receiver failed during dispatch
    #[error("receiver {receiver} failed: {message}")]
    Receiver { receiver: String, message: String },
}
