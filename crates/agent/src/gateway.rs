//! Policy gateway: the only path from the agent to the oracle.
//!
//! Every call has a bounded token budget and an explicit timeout. When the
//! oracle is slow, down or returns garbage, the gateway substitutes the
//! configured default action or the fallback reply, logs a warning and
//! publishes [`DomainEvent::OracleFallback`]. It never returns an error for
//! a decision or a reply.

use blockmind_config::{BehaviorConfig, ConfigError, OracleConfig};
use blockmind_core::error::OracleError;
use blockmind_core::{
    ActionToken, DomainEvent, EventBus, OracleRequest, PerceptionSnapshot, PolicyOracle,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Largest chat line the environment accepts.
pub const MAX_CHAT_CHARS: usize = 256;

/// Recent short-term events forwarded to a reply prompt.
pub const REPLY_EVENT_WINDOW: usize = 3;

pub const DEFAULT_FALLBACK_REPLY: &str = "Hello! How can I assist you today?";

/// Inputs for [`PolicyGateway::compose_reply`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplyContext {
    /// What just happened, e.g. `Steve said: "hi"`.
    pub situation: String,
    /// Names of currently visible peers.
    pub peers: Vec<String>,
    /// Descriptions of recent short-term events, oldest first.
    pub recent_events: Vec<String>,
}

/// Oracle front-end with fallback semantics.
pub struct PolicyGateway {
    oracle: Arc<dyn PolicyOracle>,
    default_action: ActionToken,
    fallback_reply: String,
    decide_max_tokens: u32,
    reply_max_tokens: u32,
    timeout: Duration,
    event_bus: Option<Arc<EventBus>>,
}

impl PolicyGateway {
    pub fn new(oracle: Arc<dyn PolicyOracle>) -> Self {
        Self {
            oracle,
            default_action: ActionToken::Explore,
            fallback_reply: DEFAULT_FALLBACK_REPLY.into(),
            decide_max_tokens: 20,
            reply_max_tokens: 50,
            timeout: Duration::from_secs(30),
            event_bus: None,
        }
    }

    /// Build a gateway from the `[oracle]` and `[behavior]` sections.
    pub fn from_config(
        oracle: Arc<dyn PolicyOracle>,
        oracle_config: &OracleConfig,
        behavior: &BehaviorConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(oracle)
            .with_default_action(behavior.default_action_token()?)
            .with_fallback_reply(behavior.fallback_reply.clone())
            .with_budgets(oracle_config.decide_max_tokens, oracle_config.reply_max_tokens)
            .with_timeout(Duration::from_secs(oracle_config.timeout_secs)))
    }

    pub fn with_default_action(mut self, token: ActionToken) -> Self {
        self.default_action = token;
        self
    }

    pub fn with_fallback_reply(mut self, reply: impl Into<String>) -> Self {
        self.fallback_reply = reply.into();
        self
    }

    pub fn with_budgets(mut self, decide_max_tokens: u32, reply_max_tokens: u32) -> Self {
        self.decide_max_tokens = decide_max_tokens;
        self.reply_max_tokens = reply_max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn default_action(&self) -> ActionToken {
        self.default_action
    }

    pub fn fallback_reply(&self) -> &str {
        &self.fallback_reply
    }

    pub fn oracle_name(&self) -> &str {
        self.oracle.name()
    }

    /// Map free oracle text to a vocabulary token, or the default.
    pub fn parse_action(&self, text: &str) -> ActionToken {
        ActionToken::find_in(text).unwrap_or(self.default_action)
    }

    /// Ask the oracle which action to take next.
    pub async fn decide_action(&self, agent: &str, snapshot: &PerceptionSnapshot) -> ActionToken {
        let request = OracleRequest::DecideAction {
            snapshot_summary: snapshot.summary(),
            max_response_tokens: self.decide_max_tokens,
        };

        match self.call(request).await {
            Ok(text) => {
                let token = self.parse_action(&text);
                debug!(agent, response = %text.trim(), action = %token, "Oracle decided");
                token
            }
            Err(e) => {
                self.fallback(agent, &e);
                self.default_action
            }
        }
    }

    /// Ask the oracle for a short chat reply.
    pub async fn compose_reply(&self, agent: &str, context: &ReplyContext) -> String {
        let skip = context
            .recent_events
            .len()
            .saturating_sub(REPLY_EVENT_WINDOW);
        let request = OracleRequest::ComposeReply {
            situation: context.situation.clone(),
            peers: context.peers.clone(),
            recent_events: context.recent_events[skip..].to_vec(),
            max_response_tokens: self.reply_max_tokens,
        };

        match self.call(request).await {
            Ok(text) => {
                let reply = clip_chat(&text);
                if reply.is_empty() {
                    self.fallback(agent, &OracleError::Malformed("empty reply".into()));
                    self.fallback_reply.clone()
                } else {
                    reply
                }
            }
            Err(e) => {
                self.fallback(agent, &e);
                self.fallback_reply.clone()
            }
        }
    }

    /// Connectivity probe, run once before any agent starts.
    pub async fn check_available(&self) -> Result<bool, OracleError> {
        match tokio::time::timeout(self.timeout, self.oracle.check_available()).await {
            Ok(result) => result,
            Err(_) => Err(OracleError::Timeout {
                secs: self.timeout.as_secs(),
            }),
        }
    }

    async fn call(&self, request: OracleRequest) -> Result<String, OracleError> {
        match tokio::time::timeout(self.timeout, self.oracle.generate(request)).await {
            Ok(result) => result,
            Err(_) => Err(OracleError::Timeout {
                secs: self.timeout.as_secs(),
            }),
        }
    }

    fn fallback(&self, agent: &str, error: &OracleError) {
        warn!(agent, oracle = self.oracle.name(), error = %error, "Oracle call failed, using fallback");
        if let Some(bus) = &self.event_bus {
            bus.publish(DomainEvent::OracleFallback {
                agent: agent.to_string(),
                reason: error.to_string(),
                timestamp: chrono::Utc::now(),
            });
        }
    }
}

/// Trim and cut a reply to the environment's chat limit.
pub fn clip_chat(text: &str) -> String {
    let clipped: String = text.trim().chars().take(MAX_CHAT_CHARS).collect();
    clipped.trim_end().to_string()
}
