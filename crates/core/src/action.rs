//! The closed action vocabulary.
//!
//! Every decision the agent makes resolves to one of these tokens. Oracle
//! free text is never passed through raw: [`ActionToken::find_in`] scans it
//! for a vocabulary member and callers substitute a configured default when
//! nothing matches.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the actions the agent knows how to attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionToken {
    Explore,
    Mine,
    Build,
    Chat,
    Eat,
    Sleep,
    FollowPlayer,
    Craft,
    Collect,
}

impl ActionToken {
    /// All tokens in parse-priority order.
    ///
    /// `chat` is checked last so that replies merely mentioning chatting do
    /// not shadow a concrete action earlier in the text.
    pub const PRIORITY: [ActionToken; 9] = [
        ActionToken::Explore,
        ActionToken::Mine,
        ActionToken::Build,
        ActionToken::Eat,
        ActionToken::Sleep,
        ActionToken::FollowPlayer,
        ActionToken::Craft,
        ActionToken::Collect,
        ActionToken::Chat,
    ];

    /// The canonical wire name of the token.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionToken::Explore => "explore",
            ActionToken::Mine => "mine",
            ActionToken::Build => "build",
            ActionToken::Chat => "chat",
            ActionToken::Eat => "eat",
            ActionToken::Sleep => "sleep",
            ActionToken::FollowPlayer => "follow_player",
            ActionToken::Craft => "craft",
            ActionToken::Collect => "collect",
        }
    }

    /// Spellings accepted when scanning free text.
    fn spellings(&self) -> &'static [&'static str] {
        match self {
            ActionToken::Explore => &["explore"],
            ActionToken::Mine => &["mine"],
            ActionToken::Build => &["build"],
            ActionToken::Chat => &["chat"],
            ActionToken::Eat => &["eat"],
            ActionToken::Sleep => &["sleep"],
            ActionToken::FollowPlayer => &["follow_player", "follow player"],
            ActionToken::Craft => &["craft"],
            ActionToken::Collect => &["collect"],
        }
    }

    /// Find the first vocabulary member (in [`Self::PRIORITY`] order) that
    /// appears as a case-insensitive substring of `text`.
    pub fn find_in(text: &str) -> Option<ActionToken> {
        let lower = text.to_lowercase();
        Self::PRIORITY
            .into_iter()
            .find(|token| token.spellings().iter().any(|s| lower.contains(s)))
    }
}

impl fmt::Display for ActionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not an exact vocabulary member.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown action token: {0}")]
pub struct UnknownAction(pub String);

impl FromStr for ActionToken {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Self::PRIORITY
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}
