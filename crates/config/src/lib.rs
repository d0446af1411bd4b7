//! Configuration loading, validation, and management for blockmind.
//!
//! Loads configuration from `~/.blockmind/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use blockmind_core::{ActionToken, AgentIdentity, Endpoint, Personality};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// The root configuration structure.
///
/// Maps directly to `~/.blockmind/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Remote world endpoint
    #[serde(default)]
    pub server: ServerConfig,

    /// Policy oracle (text-generation service)
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Long-term memory store
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Loop timing and social behavior
    #[serde(default)]
    pub behavior: BehaviorConfig,

    /// Environment driver selection
    #[serde(default)]
    pub driver: DriverConfig,

    /// Agents to bring up on `start`
    #[serde(default = "default_agents")]
    pub agents: Vec<AgentProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "localhost".into()
}
fn default_port() -> u16 {
    25565
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default = "default_oracle_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Upper bound on any single oracle round-trip
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Response budget for action selection
    #[serde(default = "default_decide_max_tokens")]
    pub decide_max_tokens: u32,

    /// Response budget for chat replies
    #[serde(default = "default_reply_max_tokens")]
    pub reply_max_tokens: u32,
}

fn default_oracle_url() -> String {
    "http://localhost:11434".into()
}
fn default_model() -> String {
    "gemma3:1b".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_top_p() -> f32 {
    0.9
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_decide_max_tokens() -> u32 {
    20
}
fn default_reply_max_tokens() -> u32 {
    50
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: default_oracle_url(),
            model: default_model(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            timeout_secs: default_timeout_secs(),
            decide_max_tokens: default_decide_max_tokens(),
            reply_max_tokens: default_reply_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// "sqlite", "in_memory" or "none"
    #[serde(default = "default_memory_backend")]
    pub backend: String,

    /// SQLite file; defaults to `~/.blockmind/agents.db`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

fn default_memory_backend() -> String {
    "sqlite".into()
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
            path: None,
        }
    }
}

impl MemoryConfig {
    /// The SQLite path to open, falling back to the config directory.
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| AppConfig::config_dir().join("agents.db"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorConfig {
    /// Lower bound of the jittered think interval
    #[serde(default = "default_think_min_ms")]
    pub think_min_ms: u64,

    /// Upper bound of the jittered think interval
    #[serde(default = "default_think_max_ms")]
    pub think_max_ms: u64,

    /// Delay between spawn and the first cycle
    #[serde(default = "default_spawn_settle_ms")]
    pub spawn_settle_ms: u64,

    /// Delay before reconnecting after a disconnect
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    #[serde(default = "default_greet_delay_min_ms")]
    pub greet_delay_min_ms: u64,

    #[serde(default = "default_greet_delay_max_ms")]
    pub greet_delay_max_ms: u64,

    #[serde(default = "default_reply_delay_min_ms")]
    pub reply_delay_min_ms: u64,

    #[serde(default = "default_reply_delay_max_ms")]
    pub reply_delay_max_ms: u64,

    /// Delay between starting consecutive agents
    #[serde(default = "default_launch_stagger_ms")]
    pub launch_stagger_ms: u64,

    /// Health below this records a `low_health` event
    #[serde(default = "default_low_health_threshold")]
    pub low_health_threshold: f32,

    /// Action used when the oracle is down or says nothing usable
    #[serde(default = "default_action")]
    pub default_action: String,

    /// Chat reply used when the oracle is down
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,
}

fn default_think_min_ms() -> u64 {
    3_000
}
fn default_think_max_ms() -> u64 {
    8_000
}
fn default_spawn_settle_ms() -> u64 {
    2_000
}
fn default_reconnect_delay_ms() -> u64 {
    5_000
}
fn default_greet_delay_min_ms() -> u64 {
    1_000
}
fn default_greet_delay_max_ms() -> u64 {
    4_000
}
fn default_reply_delay_min_ms() -> u64 {
    1_000
}
fn default_reply_delay_max_ms() -> u64 {
    3_000
}
fn default_launch_stagger_ms() -> u64 {
    3_000
}
fn default_low_health_threshold() -> f32 {
    10.0
}
fn default_action() -> String {
    "explore".into()
}
fn default_fallback_reply() -> String {
    "Hello! How can I assist you today?".into()
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            think_min_ms: default_think_min_ms(),
            think_max_ms: default_think_max_ms(),
            spawn_settle_ms: default_spawn_settle_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            greet_delay_min_ms: default_greet_delay_min_ms(),
            greet_delay_max_ms: default_greet_delay_max_ms(),
            reply_delay_min_ms: default_reply_delay_min_ms(),
            reply_delay_max_ms: default_reply_delay_max_ms(),
            launch_stagger_ms: default_launch_stagger_ms(),
            low_health_threshold: default_low_health_threshold(),
            default_action: default_action(),
            fallback_reply: default_fallback_reply(),
        }
    }
}

impl BehaviorConfig {
    /// The configured default action as a token.
    pub fn default_action_token(&self) -> Result<ActionToken, ConfigError> {
        self.default_action.parse().map_err(|e| {
            ConfigError::ValidationError(format!("behavior.default_action: {e}"))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Which environment driver to use ("sim")
    #[serde(default = "default_driver_kind")]
    pub kind: String,
}

fn default_driver_kind() -> String {
    "sim".into()
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            kind: default_driver_kind(),
        }
    }
}

/// Per-trait overrides on top of [`Personality::default`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonalityOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chattiness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curiosity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caution: Option<f64>,
}

impl PersonalityOverrides {
    pub fn apply(&self, base: Personality) -> Personality {
        Personality::new(
            self.chattiness.unwrap_or(base.chattiness),
            self.curiosity.unwrap_or(base.curiosity),
            self.social.unwrap_or(base.social),
            self.caution.unwrap_or(base.caution),
        )
    }

    fn values(&self) -> [(&'static str, Option<f64>); 4] {
        [
            ("chattiness", self.chattiness),
            ("curiosity", self.curiosity),
            ("social", self.social),
            ("caution", self.caution),
        ]
    }
}

/// One agent to start: a name plus personality overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub name: String,

    #[serde(default)]
    pub personality: PersonalityOverrides,
}

impl AgentProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            personality: PersonalityOverrides::default(),
        }
    }

    /// Build the identity this profile describes.
    pub fn to_identity(&self, endpoint: Endpoint) -> AgentIdentity {
        AgentIdentity::new(self.name.clone(), endpoint)
            .with_personality(self.personality.apply(Personality::default()))
    }
}

/// Parses `NAME[:trait=value,trait=value...]`, e.g. `AI_Miner:social=0.2,caution=0.9`.
impl FromStr for AgentProfile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, traits) = match s.split_once(':') {
            Some((name, traits)) => (name.trim(), traits),
            None => (s.trim(), ""),
        };
        if name.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "agent spec '{s}' has no name"
            )));
        }

        let mut profile = AgentProfile::new(name);
        for pair in traits.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                ConfigError::ValidationError(format!("expected trait=value, got '{pair}'"))
            })?;
            let value: f64 = value.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("trait '{key}' has non-numeric value"))
            })?;
            let slot = match key.trim() {
                "chattiness" => &mut profile.personality.chattiness,
                "curiosity" => &mut profile.personality.curiosity,
                "social" => &mut profile.personality.social,
                "caution" => &mut profile.personality.caution,
                other => {
                    return Err(ConfigError::ValidationError(format!(
                        "unknown personality trait '{other}'"
                    )));
                }
            };
            *slot = Some(value);
        }
        Ok(profile)
    }
}

fn default_agents() -> Vec<AgentProfile> {
    vec![
        AgentProfile {
            name: "AI_Explorer".into(),
            personality: PersonalityOverrides {
                curiosity: Some(0.9),
                social: Some(0.7),
                ..Default::default()
            },
        },
        AgentProfile {
            name: "AI_Friend".into(),
            personality: PersonalityOverrides {
                chattiness: Some(0.8),
                social: Some(0.9),
                ..Default::default()
            },
        },
    ]
}

impl AppConfig {
    /// Load configuration from the default path (~/.blockmind/config.toml).
    ///
    /// Environment variables override file values:
    /// - `BLOCKMIND_ORACLE_URL`, `BLOCKMIND_MODEL`
    /// - `BLOCKMIND_HOST`, `BLOCKMIND_PORT`
    /// - `BLOCKMIND_DB`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_from(&config_path)
    }

    /// Load configuration from a specific file path, then apply env overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        } else {
            tracing::info!("No config file found at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(url) = std::env::var("BLOCKMIND_ORACLE_URL") {
            self.oracle.base_url = url;
        }
        if let Ok(model) = std::env::var("BLOCKMIND_MODEL") {
            self.oracle.model = model;
        }
        if let Ok(host) = std::env::var("BLOCKMIND_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("BLOCKMIND_PORT") {
            self.server.port = port.parse().map_err(|_| {
                ConfigError::ValidationError(format!("BLOCKMIND_PORT '{port}' is not a port"))
            })?;
        }
        if let Ok(db) = std::env::var("BLOCKMIND_DB") {
            self.memory.path = Some(db);
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".blockmind")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.oracle.temperature) {
            return Err(ConfigError::ValidationError(
                "oracle.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.oracle.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "oracle.timeout_secs must be > 0".into(),
            ));
        }

        let b = &self.behavior;
        for (label, min, max) in [
            ("think", b.think_min_ms, b.think_max_ms),
            ("greet_delay", b.greet_delay_min_ms, b.greet_delay_max_ms),
            ("reply_delay", b.reply_delay_min_ms, b.reply_delay_max_ms),
        ] {
            if min > max {
                return Err(ConfigError::ValidationError(format!(
                    "behavior.{label}: min ({min}) exceeds max ({max})"
                )));
            }
        }
        b.default_action_token()?;

        if !matches!(self.memory.backend.as_str(), "sqlite" | "in_memory" | "none") {
            return Err(ConfigError::ValidationError(format!(
                "memory.backend '{}' is not one of sqlite, in_memory, none",
                self.memory.backend
            )));
        }

        let mut seen = HashSet::new();
        for agent in &self.agents {
            if agent.name.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "agent names must not be empty".into(),
                ));
            }
            if !seen.insert(agent.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate agent name '{}'",
                    agent.name
                )));
            }
            for (trait_name, value) in agent.personality.values() {
                if let Some(v) = value
                    && !(0.0..=1.0).contains(&v)
                {
                    return Err(ConfigError::ValidationError(format!(
                        "agent '{}': {trait_name} must be within [0, 1]",
                        agent.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            oracle: OracleConfig::default(),
            memory: MemoryConfig::default(),
            behavior: BehaviorConfig::default(),
            driver: DriverConfig::default(),
            agents: default_agents(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 25565);
        assert_eq!(config.oracle.model, "gemma3:1b");
        assert_eq!(config.behavior.default_action, "explore");
        assert_eq!(config.agents.len(), 2);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.oracle.base_url, config.oracle.base_url);
        assert_eq!(parsed.agents, config.agents);
    }

    #[test]
    fn default_roster_personalities() {
        let config = AppConfig::default();
        let friend = config.agents[1].to_identity(config.server.endpoint());
        assert_eq!(friend.name, "AI_Friend");
        assert!((friend.personality.chattiness - 0.8).abs() < f64::EPSILON);
        assert!((friend.personality.social - 0.9).abs() < f64::EPSILON);
        // Untouched traits keep the base values
        assert!((friend.personality.caution - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn invalid_think_window_rejected() {
        let mut config = AppConfig::default();
        config.behavior.think_min_ms = 9_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_default_action_rejected() {
        let mut config = AppConfig::default();
        config.behavior.default_action = "fight".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn mine_is_an_accepted_default_action() {
        let mut config = AppConfig::default();
        config.behavior.default_action = "mine".into();
        assert_eq!(
            config.behavior.default_action_token().unwrap(),
            ActionToken::Mine
        );
    }

    #[test]
    fn duplicate_agent_names_rejected() {
        let mut config = AppConfig::default();
        config.agents = vec![AgentProfile::new("Bob"), AgentProfile::new("Bob")];
        assert!(config.validate().is_err());
    }

    #[test]
    fn out_of_range_trait_rejected() {
        let mut config = AppConfig::default();
        config.agents[0].personality.social = Some(1.5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.behavior.think_max_ms, 8_000);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[behavior]
default_action = "mine"
think_min_ms = 100
think_max_ms = 200

[[agents]]
name = "AI_Miner"
personality = { caution = 0.9 }
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.behavior.default_action, "mine");
        assert_eq!(config.behavior.think_max_ms, 200);
        assert_eq!(config.agents.len(), 1);
        assert_eq!(config.agents[0].personality.caution, Some(0.9));
    }

    #[test]
    fn parse_error_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[behavior\nbroken").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn agent_spec_parsing() {
        let profile: AgentProfile = "AI_Miner:social=0.2, caution=0.9".parse().unwrap();
        assert_eq!(profile.name, "AI_Miner");
        assert_eq!(profile.personality.social, Some(0.2));
        assert_eq!(profile.personality.caution, Some(0.9));
        assert_eq!(profile.personality.chattiness, None);

        let bare: AgentProfile = "Solo".parse().unwrap();
        assert_eq!(bare, AgentProfile::new("Solo"));
    }

    #[test]
    fn agent_spec_errors() {
        assert!(":social=0.2".parse::<AgentProfile>().is_err());
        assert!("Bob:bravery=1".parse::<AgentProfile>().is_err());
        assert!("Bob:social".parse::<AgentProfile>().is_err());
        assert!("Bob:social=lots".parse::<AgentProfile>().is_err());
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gemma3:1b"));
        assert!(toml_str.contains("AI_Explorer"));
    }
}
