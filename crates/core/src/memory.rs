//! Memory records and the long-term store trait.
//!
//! Memory is tiered:
//! - **Short-term**: a bounded, volatile buffer of [`ShortTermEvent`]s,
//!   summarized into oracle prompts and lost on restart.
//! - **Long-term**: an append-only log of experiences, interactions and
//!   visited locations behind [`LongTermStore`], durable and keyed by agent
//!   name so several agents can share one store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::action::ActionToken;
use crate::environment::Position;
use crate::error::MemoryError;

/// Tag of a short-term event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortTermKind {
    Spawn,
    PeerJoined,
    PeerLeft,
    ChatReceived,
    LowHealth,
    Decision,
    Kicked,
    Disconnected,
}

impl ShortTermKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShortTermKind::Spawn => "spawn",
            ShortTermKind::PeerJoined => "peer_joined",
            ShortTermKind::PeerLeft => "peer_left",
            ShortTermKind::ChatReceived => "chat_received",
            ShortTermKind::LowHealth => "low_health",
            ShortTermKind::Decision => "decision",
            ShortTermKind::Kicked => "kicked",
            ShortTermKind::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for ShortTermKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed tag plus free-form payload, stamped on arrival.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortTermEvent {
    pub kind: ShortTermKind,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl ShortTermEvent {
    /// Create an event stamped with the current wall-clock time.
    pub fn now(kind: ShortTermKind, payload: serde_json::Value) -> Self {
        Self {
            kind,
            payload,
            timestamp: Utc::now(),
        }
    }

    /// One-line rendering for prompts: `chat_received {"from":"Steve",...}`.
    pub fn describe(&self) -> String {
        if self.payload.is_null() {
            self.kind.to_string()
        } else {
            format!("{} {}", self.kind, self.payload)
        }
    }
}

/// One completed action attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceRecord {
    pub agent_name: String,
    pub timestamp: DateTime<Utc>,
    pub action: ActionToken,
    /// JSON-serialized perception snapshot.
    pub snapshot: String,
    /// JSON-serialized result description.
    pub result: String,
    pub success: bool,
}

/// One chat exchange the agent answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub agent_name: String,
    pub timestamp: DateTime<Utc>,
    pub peer: String,
    pub message: String,
    pub reply: String,
}

/// A visited location worth remembering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub agent_name: String,
    pub timestamp: DateTime<Utc>,
    pub position: Position,
    pub biome: String,
    #[serde(default)]
    pub notable_blocks: Vec<String>,
}

/// The durable, append-only store behind long-term memory.
///
/// Implementations: SQLite, in-memory (for testing), none (no-op).
/// Every query is scoped by `agent` so rows never collide across agents.
#[async_trait]
pub trait LongTermStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory", "none").
    fn name(&self) -> &str;

    async fn append_experience(
        &self,
        record: ExperienceRecord,
    ) -> std::result::Result<(), MemoryError>;

    async fn append_interaction(
        &self,
        record: InteractionRecord,
    ) -> std::result::Result<(), MemoryError>;

    async fn append_location(&self, record: LocationRecord)
    -> std::result::Result<(), MemoryError>;

    /// Most recent *successful* experiences for `action`, newest first.
    async fn successful_experiences(
        &self,
        agent: &str,
        action: ActionToken,
        limit: usize,
    ) -> std::result::Result<Vec<ExperienceRecord>, MemoryError>;

    /// Most recent interactions with `peer`, newest first.
    async fn interactions_with(
        &self,
        agent: &str,
        peer: &str,
        limit: usize,
    ) -> std::result::Result<Vec<InteractionRecord>, MemoryError>;

    /// Most recent visited locations, newest first.
    async fn locations(
        &self,
        agent: &str,
        limit: usize,
    ) -> std::result::Result<Vec<LocationRecord>, MemoryError>;

    /// Release the underlying connection. Default is a no-op.
    async fn close(&self) -> std::result::Result<(), MemoryError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_includes_payload() {
        let ev = ShortTermEvent::now(
            ShortTermKind::ChatReceived,
            serde_json::json!({"from": "Steve", "message": "hi"}),
        );
        let text = ev.describe();
        assert!(text.starts_with("chat_received"));
        assert!(text.contains("Steve"));
    }

    #[test]
    fn describe_without_payload() {
        let ev = ShortTermEvent::now(ShortTermKind::Spawn, serde_json::Value::Null);
        assert_eq!(ev.describe(), "spawn");
    }

    #[test]
    fn experience_serialization() {
        let record = ExperienceRecord {
            agent_name: "AI_Explorer".into(),
            timestamp: Utc::now(),
            action: ActionToken::Craft,
            snapshot: "{}".into(),
            result: "\"crafted wooden_pickaxe\"".into(),
            success: true,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"action\":\"craft\""));
        assert!(json.contains("AI_Explorer"));
    }
}
