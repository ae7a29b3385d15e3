//! # Pitwall UI Pipeline
//!
//! Outbound display updates for up to hundreds of connected clients. Many
//! small, high-frequency widget refreshes are coalesced per tick into one
//! batched transport call by the [`OutboundQueue`]; [`Manialink`] is the
//! addressable unit of remote UI state that feeds it.
//!
//! Plugins never touch the queue directly — they create and mutate manialinks
//! and the pipeline reads them to render.

pub mod error;
pub mod manialink;
pub mod queue;

pub use error::UiError;
pub use manialink::{ActionReceiver, FnActionReceiver, LinkScope, Manialink, ManialinkTemplate};
pub use queue::OutboundQueue;
