//! Shared test helpers: scripted oracles and an in-process mock driver.

#![allow(dead_code)]

use async_trait::async_trait;
use blockmind_core::error::{EnvironmentError, OracleError};
use blockmind_core::{
    AgentIdentity, Connection, Endpoint, EnvironmentDriver, EnvironmentEvent, EnvironmentSession,
    ItemStack, OracleRequest, PerceptionSnapshot, PlayerState, PolicyOracle, Position,
    TimeOfDay, Weather, WorldState,
};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// A spawned, healthy, fed snapshot at the origin with nobody around.
pub fn snapshot() -> PerceptionSnapshot {
    PerceptionSnapshot {
        health: 20.0,
        food: 20.0,
        position: Position::new(0.0, 64.0, 0.0),
        time_of_day: TimeOfDay::Day,
        weather: Weather::Clear,
        nearby: vec![],
        inventory: vec![],
        biome: None,
        notable_blocks: vec![],
        taken_at: chrono::Utc::now(),
    }
}

// --- Oracles ---

/// An oracle that answers from a script.
///
/// Responses are consumed in order; once the script runs out the last one
/// repeats. Tracks how many calls overlap.
pub struct ScriptedOracle {
    script: Mutex<Vec<String>>,
    requests: Mutex<Vec<OracleRequest>>,
    started_at: Mutex<Vec<tokio::time::Instant>>,
    delay: Option<Duration>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ScriptedOracle {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            script: Mutex::new(responses.into_iter().rev().map(String::from).collect()),
            requests: Mutex::new(Vec::new()),
            started_at: Mutex::new(Vec::new()),
            delay: None,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<OracleRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn decide_calls(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| matches!(r, OracleRequest::DecideAction { .. }))
            .count()
    }

    /// When each call started, in call order.
    pub fn started_at(&self) -> Vec<tokio::time::Instant> {
        self.started_at.lock().unwrap().clone()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PolicyOracle for ScriptedOracle {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: OracleRequest) -> Result<String, OracleError> {
        self.requests.lock().unwrap().push(request);
        self.started_at
            .lock()
            .unwrap()
            .push(tokio::time::Instant::now());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        let mut script = self.script.lock().unwrap();
        let response = if script.len() > 1 {
            script.pop().unwrap()
        } else {
            script.last().cloned().unwrap_or_else(|| "explore".into())
        };
        Ok(response)
    }
}

/// An oracle that is never reachable.
pub struct FailingOracle;

#[async_trait]
impl PolicyOracle for FailingOracle {
    fn name(&self) -> &str {
        "failing"
    }

    async fn generate(&self, _request: OracleRequest) -> Result<String, OracleError> {
        Err(OracleError::Unreachable("connection refused".into()))
    }

    async fn check_available(&self) -> Result<bool, OracleError> {
        Err(OracleError::Unreachable("connection refused".into()))
    }
}

// --- Environment ---

/// A session with a settable state that records every primitive call.
pub struct MockSession {
    state: Mutex<WorldState>,
    calls: Mutex<Vec<String>>,
}

impl MockSession {
    pub fn with_state(state: WorldState) -> Self {
        Self {
            state: Mutex::new(state),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Spawned at the origin.
    pub fn spawned() -> Self {
        Self::with_state(WorldState {
            position: Some(Position::new(0.0, 64.0, 0.0)),
            inventory: vec![ItemStack::new("bread", 1)],
            ..WorldState::default()
        })
    }

    /// Connected but without a position yet.
    pub fn unspawned() -> Self {
        Self::with_state(WorldState::default())
    }

    pub fn set_players(&self, players: Vec<(&str, Position)>) {
        self.state.lock().unwrap().players = players
            .into_iter()
            .map(|(name, pos)| PlayerState {
                name: name.into(),
                position: Some(pos),
            })
            .collect();
    }

    pub fn set_position(&self, position: Option<Position>) {
        self.state.lock().unwrap().position = position;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Lines passed to `send_chat`, in order.
    pub fn chats(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| c.strip_prefix("chat:").map(String::from))
            .collect()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl EnvironmentSession for MockSession {
    async fn current_state(&self) -> Result<WorldState, EnvironmentError> {
        Ok(self.state.lock().unwrap().clone())
    }

    async fn move_toward(&self, x: f64, z: f64) -> Result<(), EnvironmentError> {
        self.record(format!("move:{x:.0},{z:.0}"));
        let mut state = self.state.lock().unwrap();
        if let Some(pos) = state.position {
            state.position = Some(Position::new(x, pos.y, z));
        }
        Ok(())
    }

    async fn follow_entity(&self, peer: &str, distance: f64) -> Result<(), EnvironmentError> {
        self.record(format!("follow:{peer}:{distance}"));
        Ok(())
    }

    async fn send_chat(&self, text: &str) -> Result<(), EnvironmentError> {
        self.record(format!("chat:{text}"));
        Ok(())
    }

    async fn equip_and_consume(&self, item: &str) -> Result<(), EnvironmentError> {
        self.record(format!("eat:{item}"));
        Ok(())
    }

    async fn craft(&self, recipe: &str, count: u32) -> Result<(), EnvironmentError> {
        self.record(format!("craft:{recipe}:{count}"));
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), EnvironmentError> {
        self.record("disconnect".into());
        Ok(())
    }
}

/// A driver handing out [`MockSession`]s, with test access to each
/// connection's event sender.
pub struct MockDriver {
    connects: AtomicU32,
    failures_left: AtomicU32,
    spawn_on_connect: bool,
    links: Mutex<Vec<(Arc<MockSession>, mpsc::Sender<EnvironmentEvent>)>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            connects: AtomicU32::new(0),
            failures_left: AtomicU32::new(0),
            spawn_on_connect: true,
            links: Mutex::new(Vec::new()),
        }
    }

    /// Fail the next `n` connects.
    pub fn failing(n: u32) -> Self {
        let driver = Self::new();
        driver.fail_next(n);
        driver
    }

    pub fn fail_next(&self, n: u32) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Do not emit `Spawned` automatically.
    pub fn without_spawn(mut self) -> Self {
        self.spawn_on_connect = false;
        self
    }

    pub fn connect_count(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    /// Session of the most recent successful connect.
    pub fn latest_session(&self) -> Arc<MockSession> {
        self.links.lock().unwrap().last().unwrap().0.clone()
    }

    /// Raise an event on the most recent connection.
    pub async fn emit(&self, event: EnvironmentEvent) {
        let sender = self.links.lock().unwrap().last().unwrap().1.clone();
        sender.send(event).await.unwrap();
    }
}

#[async_trait]
impl EnvironmentDriver for MockDriver {
    fn name(&self) -> &str {
        "mock"
    }

    async fn connect(
        &self,
        endpoint: &Endpoint,
        _identity: &AgentIdentity,
    ) -> Result<Connection, EnvironmentError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(EnvironmentError::ConnectFailed {
                endpoint: endpoint.to_string(),
                reason: "refused".into(),
            });
        }

        let session = Arc::new(MockSession::spawned());
        let (tx, rx) = mpsc::channel(32);
        if self.spawn_on_connect {
            tx.try_send(EnvironmentEvent::Spawned).unwrap();
        }
        self.links.lock().unwrap().push((session.clone(), tx));
        Ok(Connection {
            session,
            events: rx,
        })
    }
}
