//! Agent identity: who the agent is and where it connects.
//!
//! An [`AgentIdentity`] is fixed once the agent starts. The personality can be
//! tuned by the owner through [`AgentIdentity::with_personality`] before the
//! identity is handed to a supervisor, which takes it by value and shares it
//! immutably from then on.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Four traits in `[0, 1]` that bias the agent's stochastic behavior.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Personality {
    /// Probability of answering chat that does not mention the agent.
    pub chattiness: f64,
    /// Appetite for exploration; surfaced to the oracle as context.
    pub curiosity: f64,
    /// Probability of greeting a peer who joins.
    pub social: f64,
    /// Risk aversion; surfaced to the oracle as context.
    pub caution: f64,
}

impl Personality {
    pub fn new(chattiness: f64, curiosity: f64, social: f64, caution: f64) -> Self {
        Self {
            chattiness: clamp_trait(chattiness),
            curiosity: clamp_trait(curiosity),
            social: clamp_trait(social),
            caution: clamp_trait(caution),
        }
    }

    /// Copy with every trait forced into `[0, 1]`.
    pub fn clamped(self) -> Self {
        Self::new(self.chattiness, self.curiosity, self.social, self.caution)
    }
}

impl Default for Personality {
    fn default() -> Self {
        Self {
            chattiness: 0.3,
            curiosity: 0.8,
            social: 0.6,
            caution: 0.4,
        }
    }
}

fn clamp_trait(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

/// Host and port of the remote world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new("localhost", 25565)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// The agent's name, endpoint and personality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentIdentity {
    pub name: String,
    pub endpoint: Endpoint,
    pub personality: Personality,
}

impl AgentIdentity {
    pub fn new(name: impl Into<String>, endpoint: Endpoint) -> Self {
        Self {
            name: name.into(),
            endpoint,
            personality: Personality::default(),
        }
    }

    /// Tune the personality. Only possible while the identity is still owned,
    /// i.e. before it is given to a running agent.
    pub fn with_personality(mut self, personality: Personality) -> Self {
        self.personality = personality.clamped();
        self
    }

    /// Whether `message` addresses this agent by name or `@handle`.
    pub fn is_mentioned_in(&self, message: &str) -> bool {
        let name = self.name.to_lowercase();
        if name.is_empty() {
            return false;
        }
        // Covers "@name" as well, since the handle contains the name.
        message.to_lowercase().contains(&name)
    }
}
