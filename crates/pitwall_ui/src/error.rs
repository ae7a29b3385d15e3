//! Error types for the UI pipeline.

use pitwall_transport::TransportError;

/// Errors surfaced by manialink rendering and delivery.
#[derive(Debug, thiserror::Error)]
pub enum UiError {
    /// Neither a template nor a literal body was set at render time
    #[error("manialink {0} has no template and no body")]
    NoContent(String),
    /// Template rendering failed
    #[error("render error: {0}")]
    Render(String),
    /// The transport rejected an immediate send (recipient-gone is swallowed
    /// before this surfaces)
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// An action receiver failed while the link was in throw mode
    #[error("action {action} failed: {message}")]
    Action { action: String, message: String },
}
