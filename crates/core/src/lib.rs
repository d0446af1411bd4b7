//! # blockmind Core
//!
//! Domain types, collaborator traits, and error definitions for the blockmind
//! agent runtime. This crate has **no framework dependencies** beyond serde,
//! tokio's sync primitives and tracing. It defines the model every other
//! crate implements against.
//!
//! ## Collaborators
//!
//! The agent core talks to three external systems, each defined as a trait here:
//! - [`EnvironmentDriver`] / [`EnvironmentSession`]: the simulated world
//! - [`PolicyOracle`]: the text-generation service that picks actions
//! - [`LongTermStore`]: the durable experience/interaction/location log
//!
//! Implementations live in their own crates, which keeps the decision loop
//! testable against in-process mocks.

pub mod action;
pub mod environment;
pub mod error;
pub mod event;
pub mod identity;
pub mod memory;
pub mod oracle;
pub mod perception;

// Re-export key types at crate root for ergonomics
pub use action::ActionToken;
pub use environment::{
    Connection, EnvironmentDriver, EnvironmentEvent, EnvironmentSession, ItemStack, PlayerState,
    Position, WorldState,
};
pub use error::{Error, Result};
pub use event::{AgentPhase, DomainEvent, EventBus};
pub use identity::{AgentIdentity, Endpoint, Personality};
pub use memory::{
    ExperienceRecord, InteractionRecord, LocationRecord, LongTermStore, ShortTermEvent,
    ShortTermKind,
};
pub use oracle::{OracleRequest, PolicyOracle};
pub use perception::{NearbyPeer, PerceptionSnapshot, TimeOfDay, Weather};
