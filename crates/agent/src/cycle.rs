//! One perceive → decide → act → remember cycle.
//!
//! The cycle itself has no re-entrancy protection; the supervisor runs at
//! most one at a time.

use blockmind_core::error::EnvironmentError;
use blockmind_core::{
    AgentIdentity, AgentPhase, DomainEvent, EnvironmentSession, EventBus, ShortTermKind,
};
use blockmind_memory::TieredMemory;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::dispatcher::{ActionContext, ActionDispatcher, DispatchOutcome};
use crate::gateway::PolicyGateway;
use crate::perception::build_snapshot;
use crate::phase::PhaseTracker;

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleResult {
    Completed(DispatchOutcome),
    /// Nothing was asked or written.
    Skipped { reason: String },
}

pub struct DecisionCycle {
    identity: Arc<AgentIdentity>,
    memory: Arc<TieredMemory>,
    gateway: Arc<PolicyGateway>,
    dispatcher: Arc<ActionDispatcher>,
    phase: Arc<PhaseTracker>,
    events: Arc<EventBus>,
}

impl DecisionCycle {
    pub fn new(
        identity: Arc<AgentIdentity>,
        memory: Arc<TieredMemory>,
        gateway: Arc<PolicyGateway>,
        dispatcher: Arc<ActionDispatcher>,
        phase: Arc<PhaseTracker>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            identity,
            memory,
            gateway,
            dispatcher,
            phase,
            events,
        }
    }

    pub async fn run(&self, session: &dyn EnvironmentSession) -> CycleResult {
        let agent = self.identity.name.as_str();
        let started = Instant::now();
        self.phase.set(AgentPhase::Thinking);

        let snapshot = match build_snapshot(session, agent).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                match &e {
                    EnvironmentError::NotReady(_) => debug!(agent, reason = %e, "Not ready, skipping cycle"),
                    _ => warn!(agent, error = %e, "Perception failed, skipping cycle"),
                }
                return self.skip(e.to_string());
            }
        };

        let token = self.gateway.decide_action(agent, &snapshot).await;
        self.phase.set(AgentPhase::Acting);

        let ctx = ActionContext {
            agent,
            session,
            snapshot: &snapshot,
        };
        let outcome = self.dispatcher.dispatch(token, &ctx).await;

        self.memory
            .record_experience(token, &snapshot, &outcome.description, outcome.success);
        if let Some(location) = &outcome.location {
            self.memory.record_location(
                location.position,
                &location.biome,
                location.notable_blocks.clone(),
            );
        }
        self.memory.add_event(
            ShortTermKind::Decision,
            json!({ "action": token.as_str(), "success": outcome.success }),
        );

        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            agent,
            action = %token,
            handled_by = %outcome.handled_by,
            success = outcome.success,
            duration_ms,
            result = %outcome.description,
            "Cycle complete"
        );
        self.phase.set(AgentPhase::Idle);
        self.events.publish(DomainEvent::CycleCompleted {
            agent: agent.to_string(),
            action: token,
            success: outcome.success,
            duration_ms,
            timestamp: chrono::Utc::now(),
        });

        CycleResult::Completed(outcome)
    }

    fn skip(&self, reason: String) -> CycleResult {
        self.phase.set(AgentPhase::Idle);
        self.events.publish(DomainEvent::CycleSkipped {
            agent: self.identity.name.clone(),
            reason: reason.clone(),
            timestamp: chrono::Utc::now(),
        });
        CycleResult::Skipped { reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::standard_dispatcher;
    use crate::test_helpers::{MockSession, ScriptedOracle};
    use blockmind_core::{ActionToken, Endpoint};
    use blockmind_memory::InMemoryStore;

    struct Fixture {
        cycle: DecisionCycle,
        oracle: Arc<ScriptedOracle>,
        memory: Arc<TieredMemory>,
        store: InMemoryStore,
        phase: Arc<PhaseTracker>,
    }

    fn fixture(responses: Vec<&str>) -> Fixture {
        let identity = Arc::new(AgentIdentity::new("AI_Explorer", Endpoint::default()));
        let store = InMemoryStore::new();
        let memory = Arc::new(TieredMemory::new("AI_Explorer", Arc::new(store.clone())));
        let oracle = Arc::new(ScriptedOracle::new(responses));
        let bus = Arc::new(EventBus::new(64));
        let phase = Arc::new(PhaseTracker::new("AI_Explorer", bus.clone()));
        let cycle = DecisionCycle::new(
            identity,
            memory.clone(),
            Arc::new(PolicyGateway::new(oracle.clone())),
            Arc::new(standard_dispatcher()),
            phase.clone(),
            bus,
        );
        Fixture {
            cycle,
            oracle,
            memory,
            store,
            phase,
        }
    }

    #[tokio::test]
    async fn not_ready_skips_without_oracle_or_writes() {
        let f = fixture(vec!["explore"]);
        let session = MockSession::unspawned();

        let result = f.cycle.run(&session).await;
        assert!(matches!(result, CycleResult::Skipped { .. }));
        assert_eq!(f.oracle.call_count(), 0);
        assert_eq!(f.phase.current(), AgentPhase::Idle);

        f.memory.flush().await;
        assert!(f.store.is_empty().await);
        assert_eq!(f.memory.short_term_len(), 0);
    }

    #[tokio::test]
    async fn completed_cycle_writes_one_experience() {
        let f = fixture(vec!["Action: eat"]);
        let session = MockSession::spawned();

        let result = f.cycle.run(&session).await;
        let CycleResult::Completed(outcome) = result else {
            panic!("expected a completed cycle");
        };
        assert_eq!(outcome.token, ActionToken::Eat);
        assert!(outcome.success);

        f.memory.flush().await;
        let rows = f.memory.query_outcomes(ActionToken::Eat, 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].success);
        assert_eq!(
            f.memory.recent_events(1)[0].kind,
            ShortTermKind::Decision
        );
        assert_eq!(f.phase.current(), AgentPhase::Idle);
    }

    #[tokio::test]
    async fn failed_action_is_recorded_as_failure() {
        let f = fixture(vec!["craft"]);
        let session = MockSession::spawned();

        let CycleResult::Completed(outcome) = f.cycle.run(&session).await else {
            panic!("expected a completed cycle");
        };
        assert!(!outcome.success);

        f.memory.flush().await;
        assert_eq!(f.store.len().await, 1);
        let successes = f.memory.query_outcomes(ActionToken::Craft, 10).await.unwrap();
        assert!(successes.is_empty());
    }

    #[tokio::test]
    async fn explore_also_records_location() {
        let f = fixture(vec!["explore the hills"]);
        let session = MockSession::spawned();

        f.cycle.run(&session).await;
        f.memory.flush().await;
        let locations = f.memory.query_locations(10).await.unwrap();
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].biome, "unknown");
        assert_eq!(f.store.len().await, 2);
    }
}
