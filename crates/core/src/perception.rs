//! Perception snapshot: the immutable view of the world used as oracle input.
//!
//! Raw driver numbers are reduced to coarse labels here (time of day, weather)
//! so prompts stay short.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::environment::{ItemStack, Position};

/// Coarse time-of-day classification of the world clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Dawn,
    Day,
    Dusk,
    Night,
}

impl TimeOfDay {
    /// Classify a world clock reading (`0..24000` ticks, 0 = sunrise).
    pub fn from_ticks(ticks: u32) -> Self {
        match ticks % 24_000 {
            0..1_000 => TimeOfDay::Dawn,
            1_000..12_000 => TimeOfDay::Day,
            12_000..13_000 => TimeOfDay::Dusk,
            13_000..23_000 => TimeOfDay::Night,
            _ => TimeOfDay::Dawn,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeOfDay::Dawn => "dawn",
            TimeOfDay::Day => "day",
            TimeOfDay::Dusk => "dusk",
            TimeOfDay::Night => "night",
        }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse weather classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weather {
    Clear,
    Rain,
    Thunder,
}

impl Weather {
    pub fn classify(is_raining: bool, is_thundering: bool) -> Self {
        match (is_raining, is_thundering) {
            (_, true) => Weather::Thunder,
            (true, false) => Weather::Rain,
            (false, false) => Weather::Clear,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Weather::Clear => "clear",
            Weather::Rain => "rain",
            Weather::Thunder => "thunder",
        }
    }
}

impl fmt::Display for Weather {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A visible peer and how far away it is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyPeer {
    pub name: String,
    pub distance: f64,
}

/// Immutable summary of the agent's world state for one decision cycle.
///
/// Built fresh every cycle; nothing mutates it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerceptionSnapshot {
    pub health: f32,
    pub food: f32,
    pub position: Position,
    pub time_of_day: TimeOfDay,
    pub weather: Weather,
    /// Sorted nearest first.
    pub nearby: Vec<NearbyPeer>,
    pub inventory: Vec<ItemStack>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biome: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notable_blocks: Vec<String>,
    pub taken_at: DateTime<Utc>,
}

impl PerceptionSnapshot {
    /// `"Steve (4.2m), Alex (10.0m)"`, or `"nobody"`.
    pub fn nearby_summary(&self) -> String {
        if self.nearby.is_empty() {
            return "nobody".into();
        }
        self.nearby
            .iter()
            .map(|p| format!("{} ({:.1}m)", p.name, p.distance))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `"3x bread, 1x stick"`, or `"empty"`.
    pub fn inventory_summary(&self) -> String {
        if self.inventory.is_empty() {
            return "empty".into();
        }
        self.inventory
            .iter()
            .map(|i| format!("{}x {}", i.count, i.name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Total count of items whose name contains `fragment`.
    pub fn count_of(&self, fragment: &str) -> u32 {
        self.inventory
            .iter()
            .filter(|i| i.name.contains(fragment))
            .map(|i| i.count)
            .sum()
    }

    /// Compact multi-line description used as the oracle's decision input.
    pub fn summary(&self) -> String {
        format!(
            "HEALTH: {:.0}/20\nFOOD: {:.0}/20\nPOSITION: x={:.0}, y={:.0}, z={:.0}\nINVENTORY: {}\nNEARBY: {}\nTIME: {}\nWEATHER: {}",
            self.health,
            self.food,
            self.position.x,
            self.position.y,
            self.position.z,
            self.inventory_summary(),
            self.nearby_summary(),
            self.time_of_day,
            self.weather,
        )
    }
}
