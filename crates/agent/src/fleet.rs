//! A fleet of agents sharing one oracle, driver and long-term store.

use blockmind_core::{AgentIdentity, Error, EventBus, Result};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::supervisor::{AgentHandle, AgentRuntime, AgentSupervisor, LoopTiming};

/// What to launch and how.
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    pub agents: Vec<AgentIdentity>,
    /// Pause between consecutive agent starts.
    pub stagger: Duration,
    pub timing: LoopTiming,
}

pub struct Fleet {
    agents: Vec<AgentHandle>,
    runtime: AgentRuntime,
}

impl Fleet {
    /// Probe the oracle once, then start each agent in turn.
    ///
    /// An unavailable oracle aborts the launch before anything connects.
    /// An agent whose first connection fails is reported and skipped; the
    /// launch fails only when no agent could start.
    pub async fn launch(plan: LaunchPlan, runtime: AgentRuntime) -> Result<Self> {
        match runtime.gateway.check_available().await {
            Ok(true) => info!(oracle = runtime.gateway.oracle_name(), "Oracle available"),
            Ok(false) => {
                error!(oracle = runtime.gateway.oracle_name(), "Oracle reports unavailable");
                return Err(Error::Startup("policy oracle is not available".into()));
            }
            Err(e) => {
                error!(oracle = runtime.gateway.oracle_name(), error = %e, "Oracle probe failed");
                return Err(Error::Startup(format!("policy oracle probe failed: {e}")));
            }
        }

        let requested = plan.agents.len();
        let mut agents = Vec::with_capacity(requested);
        let mut failures = Vec::new();

        for (i, identity) in plan.agents.into_iter().enumerate() {
            if i > 0 && !plan.stagger.is_zero() {
                tokio::time::sleep(plan.stagger).await;
            }
            let name = identity.name.clone();
            match AgentSupervisor::start(identity, runtime.clone(), plan.timing.clone()).await {
                Ok(handle) => agents.push(handle),
                Err(e) => {
                    warn!(agent = %name, error = %e, "Agent did not start");
                    failures.push(e.to_string());
                }
            }
        }

        if agents.is_empty() && requested > 0 {
            return Err(Error::Startup(format!(
                "no agent could start: {}",
                failures.join("; ")
            )));
        }

        info!(started = agents.len(), requested, "Fleet launched");
        Ok(Self { agents, runtime })
    }

    pub fn agents(&self) -> &[AgentHandle] {
        &self.agents
    }

    pub fn agent(&self, name: &str) -> Option<&AgentHandle> {
        self.agents.iter().find(|a| a.name() == name)
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.runtime.events
    }

    /// Stop every agent, wait for their memory to drain, then close the store.
    pub async fn shutdown(self) {
        info!(agents = self.agents.len(), "Stopping fleet");
        join_all(self.agents.into_iter().map(AgentHandle::stop)).await;

        if let Err(e) = self.runtime.store.close().await {
            warn!(store = self.runtime.store.name(), error = %e, "Store close failed");
        }
        info!("Fleet stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::PolicyGateway;
    use crate::handlers::standard_dispatcher;
    use crate::test_helpers::{FailingOracle, MockDriver, ScriptedOracle};
    use blockmind_core::{AgentPhase, Endpoint, PolicyOracle};
    use blockmind_memory::InMemoryStore;

    fn runtime(
        driver: Arc<MockDriver>,
        oracle: Arc<dyn PolicyOracle>,
        store: InMemoryStore,
    ) -> AgentRuntime {
        AgentRuntime {
            driver,
            gateway: Arc::new(PolicyGateway::new(oracle)),
            dispatcher: Arc::new(standard_dispatcher()),
            store: Arc::new(store),
            events: Arc::new(EventBus::default()),
        }
    }

    fn plan(names: &[&str]) -> LaunchPlan {
        LaunchPlan {
            agents: names
                .iter()
                .map(|n| AgentIdentity::new(*n, Endpoint::default()))
                .collect(),
            stagger: Duration::from_secs(3),
            timing: LoopTiming::default(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn oracle_probe_failure_aborts_launch() {
        let driver = Arc::new(MockDriver::new());
        let result = Fleet::launch(
            plan(&["AI_Explorer"]),
            runtime(driver.clone(), Arc::new(FailingOracle), InMemoryStore::new()),
        )
        .await;
        assert!(matches!(result, Err(Error::Startup(_))));
        assert_eq!(driver.connect_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn agents_start_staggered_and_stop_together() {
        let driver = Arc::new(MockDriver::new());
        let store = InMemoryStore::new();
        let started = tokio::time::Instant::now();
        let fleet = Fleet::launch(
            plan(&["AI_Explorer", "AI_Friend"]),
            runtime(
                driver.clone(),
                Arc::new(ScriptedOracle::new(vec!["eat"])),
                store.clone(),
            ),
        )
        .await
        .unwrap();

        assert_eq!(started.elapsed(), Duration::from_secs(3));
        assert_eq!(fleet.agents().len(), 2);
        assert!(fleet.agent("AI_Friend").is_some());

        tokio::time::sleep(Duration::from_secs(20)).await;
        let watchers: Vec<_> = fleet.agents().iter().map(|a| a.watch_phase()).collect();
        fleet.shutdown().await;

        for phase in watchers {
            assert_eq!(*phase.borrow(), AgentPhase::Shutdown);
        }
        assert!(store.is_closed());
        assert!(!store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn launch_fails_only_when_nobody_starts() {
        let driver = Arc::new(MockDriver::failing(1));
        let fleet = Fleet::launch(
            plan(&["AI_Explorer", "AI_Friend"]),
            runtime(
                driver.clone(),
                Arc::new(ScriptedOracle::new(vec!["eat"])),
                InMemoryStore::new(),
            ),
        )
        .await
        .unwrap();
        assert_eq!(fleet.agents().len(), 1);
        assert_eq!(fleet.agents()[0].name(), "AI_Friend");
        fleet.shutdown().await;

        let driver = Arc::new(MockDriver::failing(2));
        let result = Fleet::launch(
            plan(&["AI_Explorer", "AI_Friend"]),
            runtime(
                driver,
                Arc::new(ScriptedOracle::new(vec!["eat"])),
                InMemoryStore::new(),
            ),
        )
        .await;
        assert!(matches!(result, Err(Error::Startup(_))));
    }
}
