//! Raw-to-processed glue.
//!
//! A [`Callback`] links one raw wire-level topic to one processed domain
//! topic. An internal glue receiver on the raw signal re-dispatches every raw
//! payload into the processed signal, whose processor transforms or enriches
//! the payload before the processed topic's subscribers see it.
//!
//! One raw event therefore produces at most one processed dispatch. The
//! processor may legitimately produce zero deliveries ([`crate::Glue::Stop`])
//! or route the same raw event into different shapes depending on payload
//! content; that branching belongs in the processor, not in the glue.

use crate::error::SignalError;
use crate::registry::SignalRegistry;
use crate::signal::{Signal, SignalProcessor, SignalReceiver};
use crate::topic::Topic;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Composite wiring a raw topic to a processed topic through a processor.
///
/// Created once at plugin-load time and never mutated afterwards, apart from
/// subscriber add/remove on its two signals.
pub struct Callback {
    raw: Arc<Signal>,
    processed: Arc<Signal>,
}

impl Callback {
    /// Wire `raw_topic` to `processed_topic` through `processor`.
    ///
    /// Both signals are registered if absent; an already-registered processed
    /// signal keeps its existing processor. The glue receiver is subscribed
    /// strong on the raw signal and re-dispatches fault-isolated, so a
    /// faulting subscriber on the processed topic never breaks the raw chain.
    pub async fn register(
        registry: &SignalRegistry,
        raw_topic: Topic,
        processed_topic: Topic,
        processor: Arc<dyn SignalProcessor>,
    ) -> Result<Self, SignalError> {
        let raw = registry.get_or_register(raw_topic, None);
        let processed = registry.get_or_register(processed_topic, Some(processor));

        let glue = Arc::new(GlueReceiver {
            name: format!("glue:{}", processed.topic()),
            processed: processed.clone(),
        });
        raw.subscribe(glue).await;

        Ok(Self { raw, processed })
    }

    pub fn raw(&self) -> &Arc<Signal> {
        &self.raw
    }

    pub fn processed(&self) -> &Arc<Signal> {
        &self.processed
    }
}

struct GlueReceiver {
    name: String,
    processed: Arc<Signal>,
}

#[async_trait]
impl SignalReceiver for GlueReceiver {
    async fn handle(&self, payload: &Value) -> Result<(), SignalError> {
        self.processed
            .dispatch_robust(payload.clone())
            .await
            .map(|_| ())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{DispatchOutcome, FnProcessor, FnReceiver, Glue};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[tokio::test]
    async fn raw_dispatch_reaches_processed_subscribers_enriched() {
        let registry = SignalRegistry::new();

        // The processor resolves the opaque uid into a full map entity, the
        // way the controller's map manager would against its store.
        let maps: HashMap<&str, Value> = HashMap::from([(
            "Map42",
            json!({"uid": "Map42", "name": "Alpine Sprint", "author": "nadeo"}),
        )]);
        let processor = FnProcessor::sync(move |raw| {
            let uid = raw[0].as_str().unwrap_or_default();
            match maps.get(uid) {
                Some(map) => Ok(Glue::Continue(json!({ "map": map }))),
                None => Ok(Glue::Stop),
            }
        });

        let callback = Callback::register(
            &registry,
            Topic::new("raw", "MapEnd"),
            Topic::new("maniaplanet", "map_end"),
            processor,
        )
        .await
        .unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        callback
            .processed()
            .subscribe(FnReceiver::new("scoreboard", move |payload| {
                seen_clone.lock().unwrap().push(payload.clone());
                Ok(())
            }))
            .await;

        callback.raw().dispatch_robust(json!(["Map42"])).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["map"]["name"], "Alpine Sprint");
    }

    #[tokio::test]
    async fn glue_stop_means_zero_processed_deliveries() {
        let registry = SignalRegistry::new();
        let processor = FnProcessor::sync(|_raw| Ok(Glue::Stop));

        let callback = Callback::register(
            &registry,
            Topic::new("raw", "PlayerChat"),
            Topic::new("maniaplanet", "player_chat"),
            processor,
        )
        .await
        .unwrap();

        let count = Arc::new(Mutex::new(0usize));
        let count_clone = count.clone();
        callback
            .processed()
            .subscribe(FnReceiver::new("chat_log", move |_| {
                *count_clone.lock().unwrap() += 1;
                Ok(())
            }))
            .await;

        for payload in [json!([0, "login", "hi"]), json!(null), json!("garbage")] {
            let outcome = callback.raw().dispatch_robust(payload).await.unwrap();
            assert_eq!(outcome, DispatchOutcome::Delivered(1)); // the glue itself
        }
        assert_eq!(*count.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn processor_branches_on_payload_content() {
        let registry = SignalRegistry::new();

        // "end of lap" vs "end of race" style branching lives in the
        // processor: the same raw topic feeds differently shaped events.
        let processor = FnProcessor::sync(|raw| {
            let shape = if raw["is_end_race"].as_bool().unwrap_or(false) {
                json!({"kind": "race", "login": raw["login"]})
            } else {
                json!({"kind": "lap", "login": raw["login"]})
            };
            Ok(Glue::Continue(shape))
        });

        let callback = Callback::register(
            &registry,
            Topic::new("raw", "WayPoint"),
            Topic::new("trackmania", "waypoint"),
            processor,
        )
        .await
        .unwrap();

        let kinds = Arc::new(Mutex::new(Vec::new()));
        let kinds_clone = kinds.clone();
        callback
            .processed()
            .subscribe(FnReceiver::new("timing", move |payload| {
                kinds_clone
                    .lock()
                    .unwrap()
                    .push(payload["kind"].as_str().unwrap_or_default().to_string());
                Ok(())
            }))
            .await;

        callback
            .raw()
            .dispatch_robust(json!({"login": "rider", "is_end_race": false}))
            .await
            .unwrap();
        callback
            .raw()
            .dispatch_robust(json!({"login": "rider", "is_end_race": true}))
            .await
            .unwrap();

        assert_eq!(*kinds.lock().unwrap(), vec!["lap", "race"]);
    }
}
