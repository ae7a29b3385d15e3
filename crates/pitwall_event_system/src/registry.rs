//! Process-wide topic directory and wire-event binding table.

use crate::error::SignalError;
use crate::signal::{
    DispatchOutcome, OwnerId, Signal, SignalProcessor, SignalReceiver, SubscriptionId,
};
use crate::topic::Topic;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Directory mapping topic keys to their [`Signal`], plus the binding table
/// that routes wire-level callback names to raw topics.
///
/// One registry instance is constructed by the controller and injected into
/// every component that needs it; there is no ambient process-wide singleton.
pub struct SignalRegistry {
    signals: DashMap<String, Arc<Signal>>,
    raw_bindings: DashMap<String, Topic>,
}

impl SignalRegistry {
    pub fn new() -> Self {
        Self {
            signals: DashMap::new(),
            raw_bindings: DashMap::new(),
        }
    }

    /// Register a new topic.
    ///
    /// Fails with [`SignalError::DuplicateTopic`] when the topic key is
    /// already taken — duplicate registration is a programming error and is
    /// meant to fail startup fast.
    pub fn register(
        &self,
        topic: Topic,
        processor: Option<Arc<dyn SignalProcessor>>,
    ) -> Result<Arc<Signal>, SignalError> {
        let key = topic.key();
        match self.signals.entry(key.clone()) {
            Entry::Occupied(_) => Err(SignalError::DuplicateTopic(key)),
            Entry::Vacant(entry) => {
                let signal = Arc::new(Signal::new(topic, processor));
                entry.insert(signal.clone());
                info!("📝 Registered topic {}", key);
                Ok(signal)
            }
        }
    }

    /// Register the topic if absent, otherwise return the existing signal.
    ///
    /// An existing signal keeps its processor; the one passed here only
    /// applies when the topic was not yet registered.
    pub fn get_or_register(
        &self,
        topic: Topic,
        processor: Option<Arc<dyn SignalProcessor>>,
    ) -> Arc<Signal> {
        match self.signals.entry(topic.key()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let key = topic.key();
                let signal = Arc::new(Signal::new(topic, processor));
                entry.insert(signal.clone());
                info!("📝 Registered topic {}", key);
                signal
            }
        }
    }

    /// Look up a signal by its `"namespace:code"` key.
    pub fn get(&self, key: &str) -> Result<Arc<Signal>, SignalError> {
        self.signals
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| SignalError::TopicNotFound(key.to_string()))
    }

    /// Subscribe a receiver to a topic by key string.
    pub async fn listen(
        &self,
        key: &str,
        receiver: Arc<dyn SignalReceiver>,
    ) -> Result<SubscriptionId, SignalError> {
        Ok(self.get(key)?.subscribe(receiver).await)
    }

    /// Subscribe with explicit ownership, by key string.
    pub async fn listen_with(
        &self,
        key: &str,
        receiver: Arc<dyn SignalReceiver>,
        owner: Option<OwnerId>,
        strong: bool,
    ) -> Result<SubscriptionId, SignalError> {
        Ok(self.get(key)?.subscribe_with(receiver, owner, strong).await)
    }

    /// Remove a subscription from a topic by key string.
    ///
    /// Returns `Ok(false)` when the subscription was not present on that
    /// signal; only an unknown topic is an error.
    pub async fn unlisten(&self, key: &str, id: SubscriptionId) -> Result<bool, SignalError> {
        Ok(self.get(key)?.unsubscribe(id).await)
    }

    /// Drop every weak subscription belonging to `owner`, across all signals.
    pub async fn purge_owner(&self, owner: &OwnerId) -> usize {
        let signals: Vec<Arc<Signal>> = self
            .signals
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        let mut removed = 0;
        for signal in signals {
            removed += signal.purge_owner(owner).await;
        }
        if removed > 0 {
            debug!("Purged {} subscriptions owned by {}", removed, owner.as_str());
        }
        removed
    }

    /// Bind one wire-level callback name to one raw topic.
    ///
    /// The raw signal is registered if absent (without a processor; raw
    /// signals carry none).
    pub fn bind_raw(&self, wire_event_name: impl Into<String>, topic: Topic) -> Arc<Signal> {
        let wire_event_name = wire_event_name.into();
        let signal = self.get_or_register(topic.clone(), None);
        debug!("Bound wire event {} to {}", wire_event_name, topic);
        self.raw_bindings.insert(wire_event_name, topic);
        signal
    }

    /// The raw topic bound to a wire-level callback name, if any.
    pub fn raw_topic(&self, wire_event_name: &str) -> Option<Topic> {
        self.raw_bindings
            .get(wire_event_name)
            .map(|entry| entry.value().clone())
    }

    /// Robust-dispatch a wire-level callback into its bound raw signal.
    ///
    /// The dedicated server emits far more callbacks than any controller
    /// binds; an unknown wire name is logged at debug level and ignored.
    pub async fn dispatch_raw(
        &self,
        wire_event_name: &str,
        payload: Value,
    ) -> Result<DispatchOutcome, SignalError> {
        let Some(topic) = self.raw_topic(wire_event_name) else {
            debug!("No binding for wire event {}", wire_event_name);
            return Ok(DispatchOutcome::Delivered(0));
        };
        self.get(&topic.key())?.dispatch_robust(payload).await
    }

    /// A registration view that defaults the namespace, for plugin init code
    /// that registers and listens by bare event code.
    pub fn scoped(&self, namespace: impl Into<String>) -> ScopedRegistry<'_> {
        ScopedRegistry {
            registry: self,
            namespace: namespace.into(),
        }
    }

    /// All registered topic keys, unordered.
    pub fn topics(&self) -> Vec<String> {
        self.signals.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn topic_count(&self) -> usize {
        self.signals.len()
    }
}

impl Default for SignalRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Namespace-defaulted view over a [`SignalRegistry`].
///
/// Bare codes resolve inside the scope namespace; keys that already contain a
/// `:` pass through unchanged, so scoped code can still reach foreign topics.
pub struct ScopedRegistry<'a> {
    registry: &'a SignalRegistry,
    namespace: String,
}

impl ScopedRegistry<'_> {
    fn resolve(&self, code_or_key: &str) -> Topic {
        Topic::parse(code_or_key)
            .unwrap_or_else(|| Topic::new(self.namespace.clone(), code_or_key))
    }

    pub fn register(
        &self,
        code: &str,
        processor: Option<Arc<dyn SignalProcessor>>,
    ) -> Result<Arc<Signal>, SignalError> {
        self.registry.register(self.resolve(code), processor)
    }

    pub async fn listen(
        &self,
        code_or_key: &str,
        receiver: Arc<dyn SignalReceiver>,
    ) -> Result<SubscriptionId, SignalError> {
        self.registry
            .listen(&self.resolve(code_or_key).key(), receiver)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::FnReceiver;
    use serde_json::json;
    use std::sync::Mutex;

    #[tokio::test]
    async fn duplicate_registration_fails() {
        let registry = SignalRegistry::new();
        registry
            .register(Topic::new("maniaplanet", "map_end"), None)
            .unwrap();

        let err = registry
            .register(Topic::new("maniaplanet", "map_end"), None)
            .unwrap_err();
        assert!(matches!(err, SignalError::DuplicateTopic(key) if key == "maniaplanet:map_end"));
    }

    #[tokio::test]
    async fn get_unknown_topic_fails() {
        let registry = SignalRegistry::new();
        let err = registry.get("maniaplanet:nope").unwrap_err();
        assert!(matches!(err, SignalError::TopicNotFound(_)));
    }

    #[tokio::test]
    async fn listen_and_unlisten_by_key() {
        let registry = SignalRegistry::new();
        let signal = registry
            .register(Topic::new("maniaplanet", "player_chat"), None)
            .unwrap();
        let log = Arc::new(Mutex::new(0usize));
        let log_clone = log.clone();

        let id = registry
            .listen(
                "maniaplanet:player_chat",
                FnReceiver::new("counter", move |_| {
                    *log_clone.lock().unwrap() += 1;
                    Ok(())
                }),
            )
            .await
            .unwrap();

        signal.dispatch(json!({})).await.unwrap();
        assert!(registry.unlisten("maniaplanet:player_chat", id).await.unwrap());
        signal.dispatch(json!({})).await.unwrap();
        assert_eq!(*log.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn scoped_registration_defaults_the_namespace() {
        let registry = SignalRegistry::new();
        let scope = registry.scoped("trackmania");
        scope.register("finish", None).unwrap();

        assert!(registry.get("trackmania:finish").is_ok());

        // Full keys pass through the scope untouched.
        registry
            .register(Topic::new("maniaplanet", "map_end"), None)
            .unwrap();
        let log = Arc::new(Mutex::new(0usize));
        let log_clone = log.clone();
        scope
            .listen(
                "maniaplanet:map_end",
                FnReceiver::new("cross_ns", move |_| {
                    *log_clone.lock().unwrap() += 1;
                    Ok(())
                }),
            )
            .await
            .unwrap();

        registry
            .get("maniaplanet:map_end")
            .unwrap()
            .dispatch(json!({}))
            .await
            .unwrap();
        assert_eq!(*log.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn dispatch_raw_routes_through_the_binding() {
        let registry = SignalRegistry::new();
        let raw = registry.bind_raw("ManiaPlanet.EndMap", Topic::new("raw", "map_end"));
        let log = Arc::new(Mutex::new(0usize));
        let log_clone = log.clone();

        raw.subscribe(FnReceiver::new("counter", move |_| {
            *log_clone.lock().unwrap() += 1;
            Ok(())
        }))
        .await;

        let outcome = registry
            .dispatch_raw("ManiaPlanet.EndMap", json!(["Map42"]))
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Delivered(1));
    }

    #[tokio::test]
    async fn unknown_wire_event_is_ignored() {
        let registry = SignalRegistry::new();
        let outcome = registry
            .dispatch_raw("ManiaPlanet.BillUpdated", json!([]))
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Delivered(0));
    }

    #[tokio::test]
    async fn purge_owner_sweeps_every_signal() {
        let registry = SignalRegistry::new();
        registry.register(Topic::new("a", "one"), None).unwrap();
        registry.register(Topic::new("b", "two"), None).unwrap();
        let owner = OwnerId::new("gone_plugin");

        for key in ["a:one", "b:two"] {
            registry
                .listen_with(
                    key,
                    FnReceiver::new("weak", |_| Ok(())),
                    Some(owner.clone()),
                    false,
                )
                .await
                .unwrap();
        }

        assert_eq!(registry.purge_owner(&owner).await, 2);
        assert_eq!(registry.get("a:one").unwrap().subscriber_count().await, 0);
    }
}
