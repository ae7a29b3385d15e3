//! # Pitwall
//!
//! Controller core sitting between a remote dedicated game server and a set
//! of loosely-coupled plugins. The controller owns one [`SignalRegistry`] and
//! one [`OutboundQueue`], feeds wire-level server callbacks into the raw
//! signal chain, and routes manialink answers back to the link that owns
//! them.
//!
//! ```rust,no_run
//! use pitwall::{Controller, ControllerConfig};
//! use std::sync::Arc;
//!
//! # async fn example(client: Arc<dyn pitwall_transport::DedicatedClient>,
//! #                  maps: Arc<dyn pitwall::MapLookup>) -> anyhow::Result<()> {
//! let config = ControllerConfig::default();
//! pitwall::logging::setup(&config.logging)?;
//!
//! let controller = Controller::new(client, &config);
//! controller.register_default_callbacks(maps).await?;
//! let _flush_loop = controller.start();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod logging;

pub use config::{ControllerConfig, LoggingSettings, UiSettings};

use async_trait::async_trait;
use dashmap::DashMap;
use pitwall_event_system::{
    Callback, DispatchOutcome, FnProcessor, Glue, SignalError, SignalReceiver, SignalRegistry,
    Topic,
};
use pitwall_transport::DedicatedClient;
use pitwall_ui::{Manialink, OutboundQueue};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// Wire-level callback names emitted by the dedicated server.
pub mod wire {
    pub const PLAYER_CHAT: &str = "ManiaPlanet.PlayerChat";
    pub const MANIALINK_ANSWER: &str = "ManiaPlanet.PlayerManialinkPageAnswer";
    pub const END_MAP: &str = "ManiaPlanet.EndMap";
}

/// A resolved map entity, as the processed `maniaplanet:map_end` payload
/// carries it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapInfo {
    pub uid: String,
    pub name: String,
    pub author_login: String,
}

/// Lookup boundary into the map store (the ORM layer is an external
/// collaborator; the controller only consumes this seam).
#[async_trait]
pub trait MapLookup: Send + Sync {
    async fn map_by_uid(&self, uid: &str) -> Option<MapInfo>;
}

/// The controller core: signal registry, outbound UI queue, and the manialink
/// directory for answer routing.
pub struct Controller {
    registry: Arc<SignalRegistry>,
    queue: Arc<OutboundQueue>,
    links: Arc<DashMap<String, Arc<Manialink>>>,
}

impl Controller {
    pub fn new(client: Arc<dyn DedicatedClient>, config: &ControllerConfig) -> Self {
        let queue = Arc::new(OutboundQueue::new(client, config.flush_interval()));
        Self {
            registry: Arc::new(SignalRegistry::new()),
            queue,
            links: Arc::new(DashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<SignalRegistry> {
        &self.registry
    }

    pub fn queue(&self) -> &Arc<OutboundQueue> {
        &self.queue
    }

    /// Spawn the flush loop. It runs until process shutdown.
    pub fn start(&self) -> tokio::task::JoinHandle<()> {
        info!(
            "🚀 Starting UI flush loop (interval {:?})",
            self.queue.flush_interval()
        );
        tokio::spawn(self.queue.clone().run())
    }

    /// Feed one wire-level server callback into the raw signal chain.
    pub async fn handle_wire_event(
        &self,
        wire_event_name: &str,
        payload: Value,
    ) -> Result<DispatchOutcome, SignalError> {
        self.registry.dispatch_raw(wire_event_name, payload).await
    }

    /// Make a manialink reachable for answer routing.
    pub fn add_link(&self, link: Arc<Manialink>) {
        self.links.insert(link.id().to_string(), link);
    }

    /// Detach a manialink from answer routing. The caller is expected to
    /// `hide` it first so clients do not keep a stale last state.
    pub fn remove_link(&self, id: &str) -> Option<Arc<Manialink>> {
        self.links.remove(id).map(|(_, link)| link)
    }

    /// Wire the standard dedicated-server callbacks.
    ///
    /// - `raw:player_chat` → `maniaplanet:player_chat`, dropping
    ///   server-originated chat lines (player uid 0).
    /// - `raw:manialink_answer` → `maniaplanet:manialink_answer`, dropping
    ///   empty answers, with a routing receiver that hands matched answers to
    ///   the owning [`Manialink`].
    /// - `raw:map_end` → `maniaplanet:map_end`, resolving the map uid into a
    ///   [`MapInfo`] through `maps`; unknown uids stop propagation.
    pub async fn register_default_callbacks(
        &self,
        maps: Arc<dyn MapLookup>,
    ) -> Result<(), SignalError> {
        self.registry
            .bind_raw(wire::PLAYER_CHAT, Topic::new("raw", "player_chat"));
        Callback::register(
            &self.registry,
            Topic::new("raw", "player_chat"),
            Topic::new("maniaplanet", "player_chat"),
            FnProcessor::sync(|raw| {
                // (uid, login, text, is_registered_cmd); uid 0 is the server
                if raw.get(0).and_then(Value::as_i64).unwrap_or(0) == 0 {
                    return Ok(Glue::Stop);
                }
                Ok(Glue::Continue(json!({
                    "login": raw.get(1).cloned().unwrap_or(Value::Null),
                    "text": raw.get(2).cloned().unwrap_or(Value::Null),
                })))
            }),
        )
        .await?;

        self.registry
            .bind_raw(wire::MANIALINK_ANSWER, Topic::new("raw", "manialink_answer"));
        let answers = Callback::register(
            &self.registry,
            Topic::new("raw", "manialink_answer"),
            Topic::new("maniaplanet", "manialink_answer"),
            FnProcessor::sync(|raw| {
                // (uid, login, answer, entries); answer "0" means no action
                let action = raw.get(2).and_then(Value::as_str).unwrap_or_default();
                if action.is_empty() || action == "0" {
                    return Ok(Glue::Stop);
                }
                Ok(Glue::Continue(json!({
                    "login": raw.get(1).cloned().unwrap_or(Value::Null),
                    "action": action,
                    "values": raw.get(3).cloned().unwrap_or(json!([])),
                })))
            }),
        )
        .await?;
        answers
            .processed()
            .subscribe(Arc::new(AnswerRouter {
                links: self.links.clone(),
            }))
            .await;

        self.registry
            .bind_raw(wire::END_MAP, Topic::new("raw", "map_end"));
        let maps = maps.clone();
        Callback::register(
            &self.registry,
            Topic::new("raw", "map_end"),
            Topic::new("maniaplanet", "map_end"),
            FnProcessor::new(move |raw: Value| {
                let maps = maps.clone();
                async move {
                    // The server sends either the bare uid or a map struct.
                    let uid = match raw.get(0) {
                        Some(Value::String(uid)) => uid.clone(),
                        Some(other) => other
                            .get("UId")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        None => String::new(),
                    };
                    match maps.map_by_uid(&uid).await {
                        Some(map) => Ok(Glue::Continue(json!({
                            "map": serde_json::to_value(map)?
                        }))),
                        None => {
                            debug!("EndMap for unknown map uid {}, dropping", uid);
                            Ok(Glue::Stop)
                        }
                    }
                }
            }),
        )
        .await?;

        Ok(())
    }
}

/// Routes processed manialink answers to the link whose id prefixes the
/// action name.
struct AnswerRouter {
    links: Arc<DashMap<String, Arc<Manialink>>>,
}

#[async_trait]
impl SignalReceiver for AnswerRouter {
    async fn handle(&self, payload: &Value) -> Result<(), SignalError> {
        let login = payload["login"].as_str().unwrap_or_default();
        let action = payload["action"].as_str().unwrap_or_default();
        let values = &payload["values"];

        let links: Vec<Arc<Manialink>> = self
            .links
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        for link in links {
            match link.handle(login, action, values).await {
                Ok(true) => return Ok(()),
                Ok(false) => continue,
                Err(e) => {
                    return Err(SignalError::Receiver {
                        receiver: format!("manialink:{}", link.id()),
                        message: e.to_string(),
                    })
                }
            }
        }

        debug!("No manialink claims action {}", action);
        Ok(())
    }

    fn name(&self) -> &str {
        "manialink_answer_router"
    }
}
