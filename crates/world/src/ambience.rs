//! Background life for the offline demo world.
//!
//! An [`Ambience`] walks an outside player around, has them chat now and
//! then, and advances the clock so the agents have something to react to.

use blockmind_core::Position;
use rand::Rng;
use rand::seq::IndexedRandom;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::sim::SimWorld;

const LINES: &[&str] = &[
    "anyone want to go mining?",
    "nice weather today",
    "I found some iron over here",
    "who built that tower?",
    "going to bed soon",
];

/// Ticks the world clock moves per ambience step.
const TICKS_PER_STEP: u32 = 200;

/// A periodic driver of world activity.
pub struct Ambience {
    world: SimWorld,
    player: String,
    interval: Duration,
    chat_chance: f64,
}

impl Ambience {
    pub fn new(world: SimWorld, player: impl Into<String>) -> Self {
        Self {
            world,
            player: player.into(),
            interval: Duration::from_secs(10),
            chat_chance: 0.3,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_chat_chance(mut self, chance: f64) -> Self {
        self.chat_chance = chance.clamp(0.0, 1.0);
        self
    }

    /// One step: wander, maybe chat, advance time.
    pub fn step(&self) {
        let (dx, dz, line) = {
            let mut rng = rand::rng();
            let line = if rng.random_bool(self.chat_chance) {
                LINES.choose(&mut rng).copied()
            } else {
                None
            };
            (
                rng.random_range(-5.0..=5.0),
                rng.random_range(-5.0..=5.0),
                line,
            )
        };

        if let Some(pos) = self.world.position_of(&self.player) {
            self.world
                .move_player(&self.player, Position::new(pos.x + dx, pos.y, pos.z + dz));
        }
        if let Some(line) = line {
            debug!(player = %self.player, line, "Ambient chat");
            self.world.say(&self.player, line);
        }
        self.world.advance_time(TICKS_PER_STEP);
    }

    /// Join the player and step until `shutdown` flips to true.
    pub fn start(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.world
                .add_player(&self.player, Position::new(6.0, 64.0, 6.0));
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(self.interval) => self.step(),
                }
            }
            self.world.remove_player(&self.player);
        })
    }
}
