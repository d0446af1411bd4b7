//! Simulated world for blockmind.
//!
//! [`SimWorld`] is a small in-process world that implements the
//! `EnvironmentDriver` / `EnvironmentSession` traits. It tracks agent bodies,
//! outside players, inventories, weather and time, and fans chat and
//! join/leave events out to every connected session. It backs the CLI's
//! offline mode and the integration tests; real remote-world bindings
//! implement the same traits elsewhere.

pub mod ambience;
pub mod recipes;
pub mod sim;

pub use ambience::Ambience;
pub use recipes::{Recipe, RecipeBook};
pub use sim::{ChatLine, SimDriver, SimSession, SimWorld};
