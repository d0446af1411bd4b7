//! Per-agent lifecycle supervisor.
//!
//! One supervisor task owns an agent's connection, its jittered decision
//! timer and its event reactor:
//!
//! ```text
//!  connect ──▶ Connecting ──spawned──▶ Idle ──tick──▶ Thinking ──▶ Acting ──▶ Idle
//!                                        │
//!                        kicked/disconnected
//!                                        ▼
//!                 Disconnected ──▶ Reconnecting ──(delay, connect)──▶ Idle
//!
//!  stop ──▶ Shutdown   (timer cancelled, in-flight work finishes, memory drained)
//! ```
//!
//! The timer is re-armed only when a cycle finishes, so the idle gap between
//! cycles always falls inside the think window. Only the first connection
//! is fatal. After that every failure is logged and recovered.

use blockmind_config::BehaviorConfig;
use blockmind_core::{
    AgentIdentity, AgentPhase, Connection, DomainEvent, EnvironmentDriver, EnvironmentEvent,
    EnvironmentSession, Error, EventBus, LongTermStore, Result, ShortTermKind,
};
use blockmind_memory::TieredMemory;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cycle::DecisionCycle;
use crate::dispatcher::ActionDispatcher;
use crate::gateway::PolicyGateway;
use crate::phase::PhaseTracker;
use crate::reactor::{EventReactor, ReactorSettings};
use crate::scheduler::JitterTicker;

/// Collaborators shared by every agent of a fleet.
#[derive(Clone)]
pub struct AgentRuntime {
    pub driver: Arc<dyn EnvironmentDriver>,
    pub gateway: Arc<PolicyGateway>,
    pub dispatcher: Arc<ActionDispatcher>,
    pub store: Arc<dyn LongTermStore>,
    pub events: Arc<EventBus>,
}

/// Timer windows and delays for one agent.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopTiming {
    pub think_min: Duration,
    pub think_max: Duration,
    /// Pause between `Spawned` and the first tick.
    pub spawn_settle: Duration,
    pub reconnect_delay: Duration,
    pub reactor: ReactorSettings,
}

impl Default for LoopTiming {
    fn default() -> Self {
        Self {
            think_min: Duration::from_secs(3),
            think_max: Duration::from_secs(8),
            spawn_settle: Duration::from_secs(2),
            reconnect_delay: Duration::from_secs(5),
            reactor: ReactorSettings::default(),
        }
    }
}

impl LoopTiming {
    pub fn from_config(behavior: &BehaviorConfig) -> Self {
        Self {
            think_min: Duration::from_millis(behavior.think_min_ms),
            think_max: Duration::from_millis(behavior.think_max_ms),
            spawn_settle: Duration::from_millis(behavior.spawn_settle_ms),
            reconnect_delay: Duration::from_millis(behavior.reconnect_delay_ms),
            reactor: ReactorSettings::from_config(behavior),
        }
    }
}

/// Owner-side handle of a running agent.
pub struct AgentHandle {
    identity: Arc<AgentIdentity>,
    shutdown: watch::Sender<bool>,
    phase: watch::Receiver<AgentPhase>,
    memory: Arc<TieredMemory>,
    task: JoinHandle<()>,
}

impl AgentHandle {
    pub fn name(&self) -> &str {
        &self.identity.name
    }

    pub fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    pub fn phase(&self) -> AgentPhase {
        *self.phase.borrow()
    }

    /// A receiver that observes every phase change.
    pub fn watch_phase(&self) -> watch::Receiver<AgentPhase> {
        self.phase.clone()
    }

    pub fn memory(&self) -> &Arc<TieredMemory> {
        &self.memory
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Ask the agent to stop without waiting.
    pub fn request_stop(&self) {
        self.shutdown.send_replace(true);
    }

    /// Stop the agent and wait until it reached [`AgentPhase::Shutdown`].
    pub async fn stop(self) {
        self.request_stop();
        if let Err(e) = self.task.await {
            warn!(agent = %self.identity.name, error = %e, "Agent task ended abnormally");
        }
    }
}

enum SessionEnd {
    Stopped,
    Lost,
}

/// Reports the end of a cycle task when dropped, including on unwind.
struct CycleDone(mpsc::UnboundedSender<()>);

impl Drop for CycleDone {
    fn drop(&mut self) {
        let _ = self.0.send(());
    }
}

pub struct AgentSupervisor {
    identity: Arc<AgentIdentity>,
    runtime: AgentRuntime,
    timing: LoopTiming,
    memory: Arc<TieredMemory>,
    phase: Arc<PhaseTracker>,
    cycle: Arc<DecisionCycle>,
}

impl AgentSupervisor {
    /// Connect and launch the agent.
    ///
    /// Fails with [`Error::Startup`] when the first connection cannot be
    /// established; the loop is never entered in that case.
    pub async fn start(
        identity: AgentIdentity,
        runtime: AgentRuntime,
        timing: LoopTiming,
    ) -> Result<AgentHandle> {
        let identity = Arc::new(identity);
        info!(
            agent = %identity.name,
            endpoint = %identity.endpoint,
            driver = runtime.driver.name(),
            "Connecting"
        );

        let connection = runtime
            .driver
            .connect(&identity.endpoint, &identity)
            .await
            .map_err(|e| {
                error!(agent = %identity.name, error = %e, "Initial connection failed");
                Error::Startup(format!(
                    "{} could not connect to {}: {e}",
                    identity.name, identity.endpoint
                ))
            })?;

        let memory = Arc::new(TieredMemory::new(
            identity.name.clone(),
            runtime.store.clone(),
        ));
        let phase = Arc::new(PhaseTracker::new(
            identity.name.clone(),
            runtime.events.clone(),
        ));
        let cycle = Arc::new(DecisionCycle::new(
            identity.clone(),
            memory.clone(),
            runtime.gateway.clone(),
            runtime.dispatcher.clone(),
            phase.clone(),
            runtime.events.clone(),
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let phase_rx = phase.subscribe();
        let supervisor = Self {
            identity: identity.clone(),
            runtime,
            timing,
            memory: memory.clone(),
            phase,
            cycle,
        };
        let task = tokio::spawn(supervisor.run(connection, shutdown_rx));

        Ok(AgentHandle {
            identity,
            shutdown: shutdown_tx,
            phase: phase_rx,
            memory,
            task,
        })
    }

    async fn run(self, mut connection: Connection, mut shutdown: watch::Receiver<bool>) {
        loop {
            match self.run_session(connection, &mut shutdown).await {
                SessionEnd::Stopped => break,
                SessionEnd::Lost => match self.reconnect(&mut shutdown).await {
                    Some(next) => connection = next,
                    None => break,
                },
            }
        }

        self.memory.close().await;
        self.phase.set(AgentPhase::Shutdown);
        info!(agent = %self.identity.name, "Agent stopped");
    }

    /// Drive one connection until it is lost or a stop is requested.
    async fn run_session(
        &self,
        connection: Connection,
        shutdown: &mut watch::Receiver<bool>,
    ) -> SessionEnd {
        let agent = self.identity.name.as_str();
        let Connection {
            session,
            events: mut session_events,
        } = connection;

        let mut ticker = JitterTicker::new(self.timing.think_min, self.timing.think_max);
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let mut cycle_task: Option<JoinHandle<()>> = None;
        let mut reactor = EventReactor::new(
            self.identity.clone(),
            self.memory.clone(),
            self.runtime.gateway.clone(),
            self.runtime.events.clone(),
            self.timing.reactor.clone(),
        );

        loop {
            tokio::select! {
                biased;

                () = stop_requested(shutdown) => {
                    ticker.disarm();
                    if let Some(task) = cycle_task.take()
                        && let Err(e) = task.await
                    {
                        warn!(agent, error = %e, "In-flight cycle ended abnormally");
                    }
                    reactor.drain().await;
                    if let Err(e) = session.disconnect().await {
                        warn!(agent, error = %e, "Disconnect failed");
                    }
                    return SessionEnd::Stopped;
                }

                event = session_events.recv() => match event {
                    Some(EnvironmentEvent::Spawned) => {
                        info!(agent, "Spawned");
                        self.memory.add_event(ShortTermKind::Spawn, serde_json::Value::Null);
                        self.phase.set(AgentPhase::Idle);
                        ticker.arm_after(self.timing.spawn_settle);
                    }
                    Some(EnvironmentEvent::Kicked { reason }) => {
                        warn!(agent, reason = %reason, "Kicked");
                        self.memory.add_event(ShortTermKind::Kicked, json!({ "reason": reason }));
                        break;
                    }
                    Some(EnvironmentEvent::Disconnected) | None => {
                        warn!(agent, "Disconnected");
                        self.memory
                            .add_event(ShortTermKind::Disconnected, serde_json::Value::Null);
                        break;
                    }
                    Some(other) => reactor.handle(other, &session),
                },

                Some(()) = done_rx.recv() => {
                    if let Some(task) = cycle_task.take()
                        && let Err(e) = task.await
                    {
                        error!(agent, error = %e, "Cycle task ended abnormally");
                    }
                    self.phase.set(AgentPhase::Idle);
                    let delay = ticker.arm();
                    debug!(agent, delay_ms = delay.as_millis() as u64, "Next tick armed");
                }

                () = ticker.wait() => {
                    if cycle_task.is_some() {
                        debug!(agent, "Previous cycle still running, tick skipped");
                        self.runtime.events.publish(DomainEvent::CycleSkipped {
                            agent: agent.to_string(),
                            reason: "previous cycle still in flight".into(),
                            timestamp: chrono::Utc::now(),
                        });
                    } else {
                        cycle_task = Some(self.spawn_cycle(session.clone(), done_tx.clone()));
                    }
                }
            }
        }

        // Session lost: nothing from it survives.
        ticker.disarm();
        if let Some(task) = cycle_task.take() {
            task.abort();
            let _ = task.await;
        }
        reactor.abort_all();
        self.phase.set(AgentPhase::Disconnected);
        SessionEnd::Lost
    }

    fn spawn_cycle(
        &self,
        session: Arc<dyn EnvironmentSession>,
        done: mpsc::UnboundedSender<()>,
    ) -> JoinHandle<()> {
        let cycle = self.cycle.clone();
        tokio::spawn(async move {
            let _done = CycleDone(done);
            cycle.run(session.as_ref()).await;
        })
    }

    /// Wait the reconnect delay and connect again, until it works or a stop
    /// is requested.
    async fn reconnect(&self, shutdown: &mut watch::Receiver<bool>) -> Option<Connection> {
        let agent = self.identity.name.as_str();
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            self.phase.set(AgentPhase::Reconnecting);
            info!(
                agent,
                attempt,
                delay_ms = self.timing.reconnect_delay.as_millis() as u64,
                "Reconnecting"
            );

            tokio::select! {
                biased;
                () = stop_requested(shutdown) => return None,
                () = tokio::time::sleep(self.timing.reconnect_delay) => {}
            }

            match self
                .runtime
                .driver
                .connect(&self.identity.endpoint, &self.identity)
                .await
            {
                Ok(connection) => {
                    info!(agent, attempt, "Reconnected");
                    return Some(connection);
                }
                Err(e) => warn!(agent, attempt, error = %e, "Reconnect failed"),
            }
        }
    }
}

/// Resolves once a stop was requested or the owner handle is gone.
async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
