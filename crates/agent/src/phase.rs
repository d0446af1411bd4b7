//! Observable lifecycle phase of one agent.

use blockmind_core::{AgentPhase, DomainEvent, EventBus};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Holds the current phase and announces every transition.
///
/// Each transition is published on the [`EventBus`] and sent to `watch`
/// subscribers.
pub struct PhaseTracker {
    agent: String,
    tx: watch::Sender<AgentPhase>,
    events: Arc<EventBus>,
}

impl PhaseTracker {
    pub fn new(agent: impl Into<String>, events: Arc<EventBus>) -> Self {
        let (tx, _) = watch::channel(AgentPhase::Connecting);
        Self {
            agent: agent.into(),
            tx,
            events,
        }
    }

    pub fn current(&self) -> AgentPhase {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<AgentPhase> {
        self.tx.subscribe()
    }

    /// Move to `to`. A no-op when already there.
    pub fn set(&self, to: AgentPhase) {
        let from = self.tx.send_replace(to);
        if from == to {
            return;
        }
        debug!(agent = %self.agent, from = %from, to = %to, "Phase changed");
        self.events.publish(DomainEvent::PhaseChanged {
            agent: self.agent.clone(),
            from,
            to,
            timestamp: chrono::Utc::now(),
        });
    }
}
