//! Environment driver traits: the abstraction over the remote world.
//!
//! A driver opens sessions; a session exposes read access to the world state,
//! a handful of opaque action primitives, and a stream of events. The agent
//! core never implements physics, pathfinding or recipes itself.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::EnvironmentError;
use crate::identity::{AgentIdentity, Endpoint};

/// A point in the world.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// A stack of items in the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub name: String,
    pub count: u32,
}

impl ItemStack {
    pub fn new(name: impl Into<String>, count: u32) -> Self {
        Self {
            name: name.into(),
            count,
        }
    }
}

/// Another player known to the session. `position` is `None` when the
/// player is connected but outside render distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub name: String,
    pub position: Option<Position>,
}

/// Raw driver-side state, as reported by [`EnvironmentSession::current_state`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    /// `None` until the agent's entity has spawned.
    pub position: Option<Position>,
    pub health: f32,
    pub food: f32,
    /// World clock in ticks, `0..24000`.
    pub time_ticks: u32,
    pub is_raining: bool,
    pub is_thundering: bool,
    pub players: Vec<PlayerState>,
    pub inventory: Vec<ItemStack>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biome: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notable_blocks: Vec<String>,
}

impl Default for WorldState {
    fn default() -> Self {
        Self {
            position: None,
            health: 20.0,
            food: 20.0,
            time_ticks: 6000,
            is_raining: false,
            is_thundering: false,
            players: vec![],
            inventory: vec![],
            biome: None,
            notable_blocks: vec![],
        }
    }
}

/// Events raised by a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EnvironmentEvent {
    Spawned,
    ChatReceived { from: String, text: String },
    PeerJoined { peer: String },
    PeerLeft { peer: String },
    HealthChanged { health: f32 },
    Kicked { reason: String },
    Disconnected,
}

/// A live connection: the session handle plus its event stream.
///
/// The stream ending is treated the same as an explicit
/// [`EnvironmentEvent::Disconnected`].
pub struct Connection {
    pub session: Arc<dyn EnvironmentSession>,
    pub events: mpsc::Receiver<EnvironmentEvent>,
}

/// Opens sessions against a world.
#[async_trait]
pub trait EnvironmentDriver: Send + Sync {
    /// The driver name (e.g., "sim").
    fn name(&self) -> &str;

    /// Establish a brand-new session for `identity`.
    async fn connect(
        &self,
        endpoint: &Endpoint,
        identity: &AgentIdentity,
    ) -> std::result::Result<Connection, EnvironmentError>;
}

/// Primitives exposed by one connected session.
#[async_trait]
pub trait EnvironmentSession: Send + Sync {
    /// Read the current world state. Must not mutate anything.
    async fn current_state(&self) -> std::result::Result<WorldState, EnvironmentError>;

    /// Walk toward the given XZ coordinates.
    async fn move_toward(&self, x: f64, z: f64) -> std::result::Result<(), EnvironmentError>;

    /// Follow another player, keeping roughly `distance` blocks away.
    async fn follow_entity(
        &self,
        peer: &str,
        distance: f64,
    ) -> std::result::Result<(), EnvironmentError>;

    /// Say something in public chat.
    async fn send_chat(&self, text: &str) -> std::result::Result<(), EnvironmentError>;

    /// Hold an item and consume it.
    async fn equip_and_consume(&self, item: &str) -> std::result::Result<(), EnvironmentError>;

    /// Craft `count` of a recipe.
    async fn craft(&self, recipe: &str, count: u32) -> std::result::Result<(), EnvironmentError>;

    /// Leave the world.
    async fn disconnect(&self) -> std::result::Result<(), EnvironmentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_euclidean() {
        let a = Position::new(0.0, 64.0, 0.0);
        let b = Position::new(3.0, 64.0, 4.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn default_state_is_unspawned() {
        let state = WorldState::default();
        assert!(state.position.is_none());
        assert_eq!(state.health, 20.0);
    }

    #[test]
    fn event_serialization_is_tagged() {
        let ev = EnvironmentEvent::ChatReceived {
            from: "Steve".into(),
            text: "hi".into(),
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains("\"type\":\"chat_received\""));
        assert!(json.contains("Steve"));
    }
}
