//! The per-agent decision loop of blockmind.
//!
//! Each agent runs a **Perceive → Decide → Act → Remember** cycle:
//!
//! 1. **Perceive**: build an immutable [`PerceptionSnapshot`](blockmind_core::PerceptionSnapshot)
//!    from the environment session
//! 2. **Decide**: ask the policy oracle through the [`PolicyGateway`], which
//!    always yields a vocabulary token
//! 3. **Act**: route the token through the [`ActionDispatcher`] to a
//!    capability handler
//! 4. **Remember**: append one experience record and a short-term event
//!
//! Cycles are triggered by a jittered timer owned by the [`AgentSupervisor`],
//! which also reconnects after a disconnect and shuts the agent down cleanly.
//! The [`EventReactor`] answers chat and greets peers alongside the loop.

pub mod cycle;
pub mod dispatcher;
pub mod fleet;
pub mod gateway;
pub mod handlers;
pub mod perception;
pub mod phase;
pub mod reactor;
pub mod scheduler;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use cycle::{CycleResult, DecisionCycle};
pub use dispatcher::{
    ActionContext, ActionDispatcher, ActionHandler, ActionReport, DispatchOutcome, VisitedLocation,
};
pub use fleet::{Fleet, LaunchPlan};
pub use gateway::{PolicyGateway, ReplyContext};
pub use handlers::standard_dispatcher;
pub use perception::build_snapshot;
pub use phase::PhaseTracker;
pub use reactor::{EventReactor, ReactorSettings, should_respond};
pub use scheduler::JitterTicker;
pub use supervisor::{AgentHandle, AgentRuntime, AgentSupervisor, LoopTiming};
