//! Topic identifiers for event routing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A unique `(namespace, code)` pair identifying one kind of event.
///
/// The string form `"namespace:code"` is the lookup key used by the
/// [`crate::SignalRegistry`]. Conventional namespaces are `raw` for wire-level
/// dedicated-server callbacks and a game namespace (e.g. `maniaplanet`) for
/// the processed domain events plugins subscribe to.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    /// Primary grouping (e.g. "raw", "maniaplanet", "pitwall")
    pub namespace: String,
    /// Event name within the namespace (e.g. "map_end")
    pub code: String,
}

impl Topic {
    /// Create a new topic from its two parts.
    pub fn new(namespace: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            code: code.into(),
        }
    }

    /// The registry lookup key, `"namespace:code"`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.namespace, self.code)
    }

    /// Parse a `"namespace:code"` key back into a topic.
    ///
    /// Returns `None` when the string does not split into exactly two
    /// non-empty parts.
    pub fn parse(key: &str) -> Option<Self> {
        let (namespace, code) = key.split_once(':')?;
        if namespace.is_empty() || code.is_empty() || code.contains(':') {
            return None;
        }
        Some(Self::new(namespace, code))
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.code)
    }
}
