//! Policy oracle trait: the abstraction over the text-generation service.
//!
//! The oracle is asked two kinds of question: which action to take next,
//! and what to say in chat. Both return plain text; interpreting that text
//! (and falling back when it is useless) is the gateway's job, not the
//! transport's.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::OracleError;

/// A request to the oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OracleRequest {
    /// Pick the next action given a snapshot summary.
    DecideAction {
        snapshot_summary: String,
        max_response_tokens: u32,
    },
    /// Write a short chat message for a social situation.
    ComposeReply {
        situation: String,
        peers: Vec<String>,
        recent_events: Vec<String>,
        max_response_tokens: u32,
    },
}

impl OracleRequest {
    pub fn max_response_tokens(&self) -> u32 {
        match self {
            OracleRequest::DecideAction {
                max_response_tokens,
                ..
            }
            | OracleRequest::ComposeReply {
                max_response_tokens,
                ..
            } => *max_response_tokens,
        }
    }
}

/// The core PolicyOracle trait.
///
/// Implementations: Ollama over HTTP, scripted mocks for tests.
#[async_trait]
pub trait PolicyOracle: Send + Sync {
    /// A human-readable name for this oracle (e.g., "ollama").
    fn name(&self) -> &str;

    /// Send a request and get the raw text response.
    async fn generate(&self, request: OracleRequest) -> std::result::Result<String, OracleError>;

    /// Connectivity probe, called once before any agent starts.
    async fn check_available(&self) -> std::result::Result<bool, OracleError> {
        Ok(true)
    }
}
