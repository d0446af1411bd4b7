//! Domain event system: observable milestones of each agent.
//!
//! Supervisors publish events when a phase changes or a cycle ends.
//! The CLI and tests subscribe without coupling to the loop internals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::action::ActionToken;

/// Lifecycle phase of one agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentPhase {
    /// Connected, waiting for the spawn event.
    Connecting,
    Idle,
    Thinking,
    Acting,
    Disconnected,
    Reconnecting,
    Shutdown,
}

impl AgentPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentPhase::Connecting => "connecting",
            AgentPhase::Idle => "idle",
            AgentPhase::Thinking => "thinking",
            AgentPhase::Acting => "acting",
            AgentPhase::Disconnected => "disconnected",
            AgentPhase::Reconnecting => "reconnecting",
            AgentPhase::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for AgentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// An agent moved between lifecycle phases
    PhaseChanged {
        agent: String,
        from: AgentPhase,
        to: AgentPhase,
        timestamp: DateTime<Utc>,
    },

    /// A decision cycle dispatched an action
    CycleCompleted {
        agent: String,
        action: ActionToken,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A timer tick or cycle was skipped
    CycleSkipped {
        agent: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// The oracle failed and a fallback was substituted
    OracleFallback {
        agent: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A chat reply or greeting was sent
    ChatSent {
        agent: String,
        peer: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
