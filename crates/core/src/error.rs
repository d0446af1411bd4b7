//! Error types for the blockmind domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each collaborator boundary has its own error enum; only the startup
//! conditions are ever treated as fatal by the agent supervisor.

use thiserror::Error;

/// The top-level error type for all blockmind operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Environment errors ---
    #[error("Environment error: {0}")]
    Environment(#[from] EnvironmentError),

    // --- Oracle errors ---
    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    // --- Action errors ---
    #[error("Action error: {0}")]
    Action(#[from] ActionError),

    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Startup preconditions (fatal) ---
    #[error("Startup failed: {0}")]
    Startup(String),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum EnvironmentError {
    /// The agent has no entity in the world yet (not spawned).
    #[error("Agent not ready: {0}")]
    NotReady(String),

    #[error("Connection to {endpoint} failed: {reason}")]
    ConnectFailed { endpoint: String, reason: String },

    #[error("Session disconnected")]
    Disconnected,

    #[error("Primitive '{primitive}' failed: {reason}")]
    PrimitiveFailed { primitive: String, reason: String },
}

#[derive(Debug, Clone, Error)]
pub enum OracleError {
    #[error("Oracle unreachable: {0}")]
    Unreachable(String),

    #[error("Oracle timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Oracle API error: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Malformed oracle response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Error)]
pub enum ActionError {
    /// The capability is registered as a placeholder; the dispatcher reroutes.
    #[error("Capability '{0}' is not supported")]
    Unsupported(String),

    #[error("Missing prerequisite: {0}")]
    MissingPrerequisite(String),

    /// The handler panicked; the dispatcher caught the unwind.
    #[error("Handler panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Environment(#[from] EnvironmentError),
}

#[derive(Debug, Clone, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Memory is closed")]
    Closed,
}
