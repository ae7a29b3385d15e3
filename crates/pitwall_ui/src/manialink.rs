//! Manialink entities: addressable pieces of remote UI state.
//!
//! A manialink is created and exclusively owned by one plugin. The plugin
//! mutates its data; the outbound pipeline only reads it to render. Delivery
//! is either immediate (one batched transport call right away) or relaxed
//! (buffered on the [`OutboundQueue`] for the next flush tick).

use crate::error::UiError;
use crate::queue::OutboundQueue;
use async_trait::async_trait;
use pitwall_transport::Call;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::error;
use uuid::Uuid;

/// Addressing scope of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkScope {
    /// One shared rendering for the whole server
    Global,
    /// Rendered per recipient with that recipient's data merged in
    PerLogin,
}

/// Rendering engine boundary. Concrete template engines are external
/// collaborators; the pipeline only needs a body for a set of variables.
pub trait ManialinkTemplate: Send + Sync {
    fn render(&self, vars: &Map<String, Value>) -> Result<String, UiError>;
}

/// Handler for one manialink action answer.
#[async_trait]
pub trait ActionReceiver: Send + Sync {
    async fn handle(&self, login: &str, values: &Value) -> Result<(), UiError>;

    fn name(&self) -> &str;
}

/// Closure adapter for [`ActionReceiver`].
pub struct FnActionReceiver<F> {
    name: String,
    f: F,
}

impl<F> FnActionReceiver<F>
where
    F: Fn(&str, &Value) -> Result<(), UiError> + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, f: F) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            f,
        })
    }
}

#[async_trait]
impl<F> ActionReceiver for FnActionReceiver<F>
where
    F: Fn(&str, &Value) -> Result<(), UiError> + Send + Sync + 'static,
{
    async fn handle(&self, login: &str, values: &Value) -> Result<(), UiError> {
        (self.f)(login, values)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Default)]
struct LinkState {
    body: Option<String>,
    data: Map<String, Value>,
    per_login_data: HashMap<String, Map<String, Value>>,
    receivers: HashMap<String, Vec<Arc<dyn ActionReceiver>>>,
    fallback: Option<Arc<dyn ActionReceiver>>,
}

/// A renderable, addressable piece of remote UI state.
pub struct Manialink {
    id: String,
    scope: LinkScope,
    template: Option<Arc<dyn ManialinkTemplate>>,
    timeout_secs: u64,
    hide_on_click: bool,
    relaxed_updating: bool,
    throws: bool,
    queue: Arc<OutboundQueue>,
    state: RwLock<LinkState>,
}

impl Manialink {
    pub fn new(queue: Arc<OutboundQueue>, scope: LinkScope) -> Self {
        Self {
            id: format!("pitwall_{}", Uuid::new_v4().simple()),
            scope,
            template: None,
            timeout_secs: 0,
            hide_on_click: false,
            relaxed_updating: false,
            throws: false,
            queue,
            state: RwLock::new(LinkState::default()),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_template(mut self, template: Arc<dyn ManialinkTemplate>) -> Self {
        self.template = Some(template);
        self
    }

    /// Display expiry in seconds, passed through to the transport untouched;
    /// the dedicated server enforces it.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_hide_on_click(mut self) -> Self {
        self.hide_on_click = true;
        self
    }

    /// Buffer updates on the queue instead of sending immediately.
    pub fn relaxed(mut self) -> Self {
        self.relaxed_updating = true;
        self
    }

    /// Propagate action-receiver errors instead of swallowing them.
    pub fn throwing(mut self) -> Self {
        self.throws = true;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn scope(&self) -> LinkScope {
        self.scope
    }

    pub fn is_relaxed(&self) -> bool {
        self.relaxed_updating
    }

    pub async fn set_body(&self, body: impl Into<String>) {
        self.state.write().await.body = Some(body.into());
    }

    pub async fn set_data(&self, data: Map<String, Value>) {
        self.state.write().await.data = data;
    }

    pub async fn set_player_data(&self, login: impl Into<String>, data: Map<String, Value>) {
        self.state
            .write()
            .await
            .per_login_data
            .insert(login.into(), data);
    }

    pub async fn clear_player_data(&self, login: &str) {
        self.state.write().await.per_login_data.remove(login);
    }

    /// The wire action name for `action` on this link: a stable per-link id
    /// prefix keeps answers routable back to the right link instance.
    pub fn action_id(&self, action: &str) -> String {
        format!("{}__{}", self.id, action)
    }

    /// Register a receiver for one action name on this link.
    pub async fn subscribe(&self, action: impl Into<String>, receiver: Arc<dyn ActionReceiver>) {
        self.state
            .write()
            .await
            .receivers
            .entry(action.into())
            .or_default()
            .push(receiver);
    }

    /// Catch-all hook for answers whose action name has no receiver.
    pub async fn set_fallback(&self, receiver: Arc<dyn ActionReceiver>) {
        self.state.write().await.fallback = Some(receiver);
    }

    /// Render and deliver the link to the resolved recipient set.
    ///
    /// Recipients are, in order of precedence: the explicit `players` list,
    /// the per-login data keys, or — for [`LinkScope::Global`] only — the
    /// whole server as one broadcast. Fails with [`UiError::NoContent`] when
    /// neither a template nor a literal body is set.
    pub async fn display(&self, players: Option<&[String]>) -> Result<(), UiError> {
        let calls = self.build_calls(players, false).await?;
        self.deliver(calls).await
    }

    /// Deliver an empty-body update addressed the same way as `display`.
    ///
    /// Always attempts delivery, even if the link was never displayed;
    /// hiding twice is harmless.
    pub async fn hide(&self, players: Option<&[String]>) -> Result<(), UiError> {
        let calls = self.build_calls(players, true).await?;
        self.deliver(calls).await
    }

    /// Route one inbound answer to this link's receivers.
    ///
    /// Returns `Ok(false)` when the action does not carry this link's id
    /// prefix (it belongs to some other link). Matched actions without a
    /// receiver fall through to the catch-all hook. Receiver errors are
    /// swallowed and logged unless the link was built in throw mode.
    pub async fn handle(
        &self,
        login: &str,
        action: &str,
        values: &Value,
    ) -> Result<bool, UiError> {
        let prefix = format!("{}__", self.id);
        let Some(name) = action.strip_prefix(prefix.as_str()) else {
            return Ok(false);
        };

        let (receivers, fallback) = {
            let state = self.state.read().await;
            (
                state.receivers.get(name).cloned().unwrap_or_default(),
                state.fallback.clone(),
            )
        };

        let targets: Vec<Arc<dyn ActionReceiver>> = if receivers.is_empty() {
            fallback.into_iter().collect()
        } else {
            receivers
        };

        for receiver in targets {
            if let Err(e) = receiver.handle(login, values).await {
                if self.throws {
                    return Err(UiError::Action {
                        action: name.to_string(),
                        message: e.to_string(),
                    });
                }
                error!(
                    "❌ Action receiver {} failed on {} for {}: {}",
                    receiver.name(),
                    self.id,
                    login,
                    e
                );
            }
        }
        Ok(true)
    }

    async fn build_calls(
        &self,
        players: Option<&[String]>,
        hide: bool,
    ) -> Result<Vec<Call>, UiError> {
        let state = self.state.read().await;

        let recipients: Option<Vec<String>> = match players {
            Some(players) => Some(players.to_vec()),
            None => {
                if state.per_login_data.is_empty() && self.scope == LinkScope::Global {
                    None // whole-server broadcast
                } else {
                    let mut logins: Vec<String> =
                        state.per_login_data.keys().cloned().collect();
                    logins.sort();
                    Some(logins)
                }
            }
        };

        let (timeout, hide_on_click) = if hide {
            (0, false)
        } else {
            (self.timeout_secs, self.hide_on_click)
        };

        let calls = match recipients {
            None => {
                let body = if hide {
                    String::new()
                } else {
                    self.render(&state.data, &state)?
                };
                vec![Call::new(
                    "SendDisplayManialinkPage",
                    vec![json!(body), json!(timeout), json!(hide_on_click)],
                )]
            }
            Some(logins) => {
                // Global scope renders once; per-login renders per recipient
                // with the recipient's data merged over the shared data.
                let shared = if hide {
                    Some(String::new())
                } else if self.scope == LinkScope::Global {
                    Some(self.render(&state.data, &state)?)
                } else {
                    None
                };

                let mut calls = Vec::with_capacity(logins.len());
                for login in logins {
                    let body = match &shared {
                        Some(body) => body.clone(),
                        None => {
                            let mut vars = state.data.clone();
                            if let Some(extra) = state.per_login_data.get(&login) {
                                for (key, value) in extra {
                                    vars.insert(key.clone(), value.clone());
                                }
                            }
                            self.render(&vars, &state)?
                        }
                    };
                    calls.push(Call::new(
                        "SendDisplayManialinkPageToLogin",
                        vec![json!(login), json!(body), json!(timeout), json!(hide_on_click)],
                    ));
                }
                calls
            }
        };

        Ok(calls)
    }

    fn render(&self, vars: &Map<String, Value>, state: &LinkState) -> Result<String, UiError> {
        if let Some(template) = &self.template {
            return template.render(vars);
        }
        state
            .body
            .clone()
            .ok_or_else(|| UiError::NoContent(self.id.clone()))
    }

    async fn deliver(&self, calls: Vec<Call>) -> Result<(), UiError> {
        if self.relaxed_updating {
            self.queue.push_all(calls).await;
            Ok(())
        } else {
            self.queue.send_now(calls).await?;
            Ok(())
        }
    }
}

impl std::fmt::Debug for Manialink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manialink")
            .field("id", &self.id)
            .field("scope", &self.scope)
            .field("relaxed_updating", &self.relaxed_updating)
            .finish()
    }
}
