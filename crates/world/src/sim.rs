//! The simulated world, its driver, and per-agent sessions.

use async_trait::async_trait;
use blockmind_core::error::EnvironmentError;
use blockmind_core::{
    AgentIdentity, Connection, Endpoint, EnvironmentDriver, EnvironmentEvent, EnvironmentSession,
    ItemStack, PlayerState, Position, WorldState,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::recipes::{self, RecipeBook};

const EVENT_BUFFER: usize = 64;
const FOOD_PER_ITEM: f32 = 5.0;
const MAX_STAT: f32 = 20.0;
const BIOMES: [&str; 4] = ["plains", "forest", "desert", "taiga"];

/// A chat line as seen by the world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    pub from: String,
    pub text: String,
}

struct AgentBody {
    session_id: u64,
    position: Position,
    health: f32,
    food: f32,
    inventory: Vec<ItemStack>,
    events: mpsc::Sender<EnvironmentEvent>,
}

struct WorldModel {
    spawn_point: Position,
    starting_inventory: Vec<ItemStack>,
    time_ticks: u32,
    is_raining: bool,
    is_thundering: bool,
    agents: HashMap<String, AgentBody>,
    players: HashMap<String, Position>,
    chat_log: Vec<ChatLine>,
    connect_counts: HashMap<String, u32>,
    failing_connects: u32,
    next_session_id: u64,
}

impl WorldModel {
    fn broadcast(&self, except: Option<&str>, event: &EnvironmentEvent) {
        for (name, body) in &self.agents {
            if Some(name.as_str()) == except {
                continue;
            }
            if body.events.try_send(event.clone()).is_err() {
                debug!(agent = %name, "Dropping sim event, session buffer full or closed");
            }
        }
    }

    fn body_for(&mut self, name: &str, session_id: u64) -> Result<&mut AgentBody, EnvironmentError> {
        match self.agents.get_mut(name) {
            Some(body) if body.session_id == session_id => Ok(body),
            _ => Err(EnvironmentError::Disconnected),
        }
    }

    fn position_of(&self, name: &str) -> Option<Position> {
        self.agents
            .get(name)
            .map(|b| b.position)
            .or_else(|| self.players.get(name).copied())
    }

    fn player_list(&self) -> Vec<PlayerState> {
        let mut players: Vec<PlayerState> = self
            .agents
            .iter()
            .map(|(name, body)| PlayerState {
                name: name.clone(),
                position: Some(body.position),
            })
            .chain(self.players.iter().map(|(name, pos)| PlayerState {
                name: name.clone(),
                position: Some(*pos),
            }))
            .collect();
        players.sort_by(|a, b| a.name.cmp(&b.name));
        players
    }
}

/// Biome of the 64x64 region containing `position`.
pub fn biome_at(position: &Position) -> &'static str {
    let rx = (position.x / 64.0).floor() as i64;
    let rz = (position.z / 64.0).floor() as i64;
    BIOMES[(rx + rz).rem_euclid(BIOMES.len() as i64) as usize]
}

fn notable_blocks(biome: &str) -> Vec<String> {
    let blocks: &[&str] = match biome {
        "forest" => &["oak_log", "birch_log"],
        "desert" => &["sand", "cactus"],
        "taiga" => &["spruce_log", "sweet_berry_bush"],
        _ => &["grass_block", "dandelion"],
    };
    blocks.iter().map(|b| b.to_string()).collect()
}

/// A shared, in-process world. Cloning yields another handle to the same world.
#[derive(Clone)]
pub struct SimWorld {
    inner: Arc<Mutex<WorldModel>>,
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl SimWorld {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(WorldModel {
                spawn_point: Position::new(0.0, 64.0, 0.0),
                starting_inventory: Vec::new(),
                time_ticks: 6000,
                is_raining: false,
                is_thundering: false,
                agents: HashMap::new(),
                players: HashMap::new(),
                chat_log: Vec::new(),
                connect_counts: HashMap::new(),
                failing_connects: 0,
                next_session_id: 1,
            })),
        }
    }

    /// A world pre-seeded for the offline demo: some logs and bread.
    pub fn demo() -> Self {
        Self::new().with_starting_inventory(vec![
            ItemStack::new("oak_log", 3),
            ItemStack::new("bread", 4),
        ])
    }

    pub fn with_spawn_point(self, spawn: Position) -> Self {
        self.model().spawn_point = spawn;
        self
    }

    /// Items every agent body starts with.
    pub fn with_starting_inventory(self, items: Vec<ItemStack>) -> Self {
        self.model().starting_inventory = items;
        self
    }

    fn model(&self) -> MutexGuard<'_, WorldModel> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// A driver that opens sessions in this world.
    pub fn driver(&self) -> SimDriver {
        SimDriver {
            world: self.clone(),
        }
    }

    // --- World controls ---

    /// An outside player joins at `position`.
    pub fn add_player(&self, name: &str, position: Position) {
        let mut model = self.model();
        model.players.insert(name.to_string(), position);
        model.broadcast(None, &EnvironmentEvent::PeerJoined { peer: name.into() });
    }

    pub fn remove_player(&self, name: &str) {
        let mut model = self.model();
        if model.players.remove(name).is_some() {
            model.broadcast(None, &EnvironmentEvent::PeerLeft { peer: name.into() });
        }
    }

    pub fn move_player(&self, name: &str, position: Position) {
        if let Some(pos) = self.model().players.get_mut(name) {
            *pos = position;
        }
    }

    /// An outside player says something in public chat.
    pub fn say(&self, from: &str, text: &str) {
        let mut model = self.model();
        model.chat_log.push(ChatLine {
            from: from.into(),
            text: text.into(),
        });
        model.broadcast(
            Some(from),
            &EnvironmentEvent::ChatReceived {
                from: from.into(),
                text: text.into(),
            },
        );
    }

    /// Kick an agent: it receives `Kicked` and its session goes dead.
    pub fn kick(&self, agent: &str, reason: &str) {
        self.end_session(agent, EnvironmentEvent::Kicked {
            reason: reason.into(),
        });
    }

    /// Drop an agent's connection as if the network failed.
    pub fn drop_connection(&self, agent: &str) {
        self.end_session(agent, EnvironmentEvent::Disconnected);
    }

    fn end_session(&self, agent: &str, event: EnvironmentEvent) {
        let mut model = self.model();
        if let Some(body) = model.agents.remove(agent) {
            let _ = body.events.try_send(event);
            model.broadcast(None, &EnvironmentEvent::PeerLeft { peer: agent.into() });
        }
    }

    pub fn set_health(&self, agent: &str, health: f32) {
        let mut model = self.model();
        if let Some(body) = model.agents.get_mut(agent) {
            body.health = health.clamp(0.0, MAX_STAT);
            let _ = body.events.try_send(EnvironmentEvent::HealthChanged {
                health: body.health,
            });
        }
    }

    pub fn set_food(&self, agent: &str, food: f32) {
        if let Some(body) = self.model().agents.get_mut(agent) {
            body.food = food.clamp(0.0, MAX_STAT);
        }
    }

    pub fn give(&self, agent: &str, item: &str, count: u32) {
        if let Some(body) = self.model().agents.get_mut(agent) {
            recipes::add_item(&mut body.inventory, item, count);
        }
    }

    pub fn set_weather(&self, raining: bool, thundering: bool) {
        let mut model = self.model();
        model.is_raining = raining || thundering;
        model.is_thundering = thundering;
    }

    /// Advance the world clock, wrapping at a full day.
    pub fn advance_time(&self, ticks: u32) {
        let mut model = self.model();
        model.time_ticks = (model.time_ticks + ticks) % 24_000;
    }

    /// Make the next `n` connect attempts fail.
    pub fn fail_next_connects(&self, n: u32) {
        self.model().failing_connects = n;
    }

    // --- Inspection ---

    pub fn chat_log(&self) -> Vec<ChatLine> {
        self.model().chat_log.clone()
    }

    pub fn connect_count(&self, agent: &str) -> u32 {
        self.model().connect_counts.get(agent).copied().unwrap_or(0)
    }

    pub fn is_connected(&self, agent: &str) -> bool {
        self.model().agents.contains_key(agent)
    }

    pub fn position_of(&self, agent: &str) -> Option<Position> {
        self.model().position_of(agent)
    }

    pub fn inventory_of(&self, agent: &str) -> Vec<ItemStack> {
        self.model()
            .agents
            .get(agent)
            .map(|b| b.inventory.clone())
            .unwrap_or_default()
    }

    pub fn food_of(&self, agent: &str) -> Option<f32> {
        self.model().agents.get(agent).map(|b| b.food)
    }

    pub fn player_names(&self) -> Vec<String> {
        self.model().players.keys().cloned().collect()
    }

    fn open_session(&self, identity: &AgentIdentity) -> Result<Connection, EnvironmentError> {
        let mut model = self.model();
        *model
            .connect_counts
            .entry(identity.name.clone())
            .or_insert(0) += 1;

        if model.failing_connects > 0 {
            model.failing_connects -= 1;
            return Err(EnvironmentError::ConnectFailed {
                endpoint: "sim".into(),
                reason: "connection refused".into(),
            });
        }

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let session_id = model.next_session_id;
        model.next_session_id += 1;

        let offset = model.agents.len() as f64 * 2.0;
        let spawn = model.spawn_point;
        let body = AgentBody {
            session_id,
            position: Position::new(spawn.x + offset, spawn.y, spawn.z),
            health: MAX_STAT,
            food: MAX_STAT,
            inventory: model.starting_inventory.clone(),
            events: tx.clone(),
        };

        // A stale body under the same name is replaced; its session goes dead.
        if model.agents.insert(identity.name.clone(), body).is_none() {
            model.broadcast(
                Some(identity.name.as_str()),
                &EnvironmentEvent::PeerJoined {
                    peer: identity.name.clone(),
                },
            );
        }
        let _ = tx.try_send(EnvironmentEvent::Spawned);

        Ok(Connection {
            session: Arc::new(SimSession {
                world: self.clone(),
                name: identity.name.clone(),
                session_id,
            }),
            events: rx,
        })
    }
}

/// Opens [`SimSession`]s in a [`SimWorld`].
#[derive(Clone)]
pub struct SimDriver {
    world: SimWorld,
}

impl SimDriver {
    pub fn world(&self) -> &SimWorld {
        &self.world
    }
}

#[async_trait]
impl EnvironmentDriver for SimDriver {
    fn name(&self) -> &str {
        "sim"
    }

    async fn connect(
        &self,
        endpoint: &Endpoint,
        identity: &AgentIdentity,
    ) -> Result<Connection, EnvironmentError> {
        let connection = self.world.open_session(identity).map_err(|e| match e {
            EnvironmentError::ConnectFailed { reason, .. } => EnvironmentError::ConnectFailed {
                endpoint: endpoint.to_string(),
                reason,
            },
            other => other,
        })?;
        info!(agent = %identity.name, %endpoint, "Sim session opened");
        Ok(connection)
    }
}

/// One agent's view of the simulated world.
pub struct SimSession {
    world: SimWorld,
    name: String,
    session_id: u64,
}

impl SimSession {
    fn primitive_failed(primitive: &str, reason: impl Into<String>) -> EnvironmentError {
        EnvironmentError::PrimitiveFailed {
            primitive: primitive.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl EnvironmentSession for SimSession {
    async fn current_state(&self) -> Result<WorldState, EnvironmentError> {
        let mut model = self.world.model();
        let players = model.player_list();
        let (time_ticks, is_raining, is_thundering) =
            (model.time_ticks, model.is_raining, model.is_thundering);
        let body = model.body_for(&self.name, self.session_id)?;
        let biome = biome_at(&body.position);

        Ok(WorldState {
            position: Some(body.position),
            health: body.health,
            food: body.food,
            time_ticks,
            is_raining,
            is_thundering,
            players,
            inventory: body.inventory.clone(),
            biome: Some(biome.to_string()),
            notable_blocks: notable_blocks(biome),
        })
    }

    async fn move_toward(&self, x: f64, z: f64) -> Result<(), EnvironmentError> {
        let mut model = self.world.model();
        let body = model.body_for(&self.name, self.session_id)?;
        body.position = Position::new(x, body.position.y, z);
        Ok(())
    }

    async fn follow_entity(&self, peer: &str, distance: f64) -> Result<(), EnvironmentError> {
        let mut model = self.world.model();
        let target = model
            .position_of(peer)
            .ok_or_else(|| Self::primitive_failed("follow_entity", format!("'{peer}' not found")))?;
        let body = model.body_for(&self.name, self.session_id)?;

        let gap = body.position.distance_to(&target);
        if gap > distance {
            let t = (gap - distance) / gap;
            let p = body.position;
            body.position = Position::new(
                p.x + (target.x - p.x) * t,
                p.y + (target.y - p.y) * t,
                p.z + (target.z - p.z) * t,
            );
        }
        Ok(())
    }

    async fn send_chat(&self, text: &str) -> Result<(), EnvironmentError> {
        let mut model = self.world.model();
        model.body_for(&self.name, self.session_id)?;
        model.chat_log.push(ChatLine {
            from: self.name.clone(),
            text: text.into(),
        });
        model.broadcast(
            Some(self.name.as_str()),
            &EnvironmentEvent::ChatReceived {
                from: self.name.clone(),
                text: text.into(),
            },
        );
        Ok(())
    }

    async fn equip_and_consume(&self, item: &str) -> Result<(), EnvironmentError> {
        let mut model = self.world.model();
        let body = model.body_for(&self.name, self.session_id)?;
        if recipes::count_matching(&body.inventory, item) == 0 {
            return Err(Self::primitive_failed(
                "equip_and_consume",
                format!("no {item} in inventory"),
            ));
        }
        recipes::remove_matching(&mut body.inventory, item, 1);
        body.food = (body.food + FOOD_PER_ITEM).min(MAX_STAT);
        Ok(())
    }

    async fn craft(&self, recipe: &str, count: u32) -> Result<(), EnvironmentError> {
        let mut model = self.world.model();
        let body = model.body_for(&self.name, self.session_id)?;
        RecipeBook
            .craft(&mut body.inventory, recipe, count)
            .map(|_| ())
            .map_err(|reason| Self::primitive_failed("craft", reason))
    }

    async fn disconnect(&self) -> Result<(), EnvironmentError> {
        let mut model = self.world.model();
        let current = model
            .agents
            .get(&self.name)
            .is_some_and(|b| b.session_id == self.session_id);
        if current {
            model.agents.remove(&self.name);
            model.broadcast(None, &EnvironmentEvent::PeerLeft {
                peer: self.name.clone(),
            });
        }
        Ok(())
    }
}
