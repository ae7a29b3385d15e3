//! # Pitwall Event System
//!
//! Signal and callback dispatch core for the Pitwall controller. This crate
//! turns raw wire-level dedicated-server callbacks into typed, app-consumable
//! events that plugins subscribe to without knowing about each other or about
//! the wire format.
//!
//! ## Key Components
//!
//! - [`Topic`] - A unique `(namespace, code)` pair identifying one event kind
//! - [`Signal`] - Holds the ordered subscriber list for one topic and performs
//!   best-effort, fault-isolated dispatch
//! - [`SignalRegistry`] - Process-wide directory mapping topics to signals,
//!   plus the wire-name binding table for raw server callbacks
//! - [`Callback`] - Glue wiring one raw topic to one processed topic through a
//!   [`SignalProcessor`]
//!
//! ## Dispatch Guarantees
//!
//! - Within one signal, receivers run sequentially in subscription order
//! - Across different topics there is no ordering guarantee
//! - Delivery is at-most-once, best-effort, in-process only
//! - In robust dispatch a failing receiver is logged and isolated; the other
//!   receivers still run
//!
//! ## Example
//!
//! ```rust
//! use pitwall_event_system::{SignalRegistry, Topic, FnReceiver};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = SignalRegistry::new();
//! let signal = registry.register(Topic::new("maniaplanet", "map_end"), None)?;
//!
//! signal
//!     .subscribe(FnReceiver::new("scoreboard", |payload| {
//!         println!("map ended: {payload}");
//!         Ok(())
//!     }))
//!     .await;
//!
//! signal.dispatch_robust(json!({"map": "Map42"})).await?;
//! # Ok(())
//! # }
//! ```

pub mod callback;
pub mod error;
pub mod registry;
pub mod signal;
pub mod topic;

pub use callback::Callback;
pub use error::SignalError;
pub use registry::{ScopedRegistry, SignalRegistry};
pub use signal::{
    AsyncFnReceiver, DispatchOutcome, FnProcessor, FnReceiver, Glue, OwnerId, Signal,
    SignalProcessor, SignalReceiver, SubscriptionId, TypedReceiver,
};
pub use topic::Topic;
