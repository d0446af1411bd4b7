//! Action dispatcher: routes a decided token to its capability handler.
//!
//! The dispatcher always produces a [`DispatchOutcome`]. Tokens with no
//! handler, and handlers that report [`ActionError::Unsupported`], are
//! rerouted to the default handler. Any other handler error, including a
//! panic, becomes a failed outcome instead of propagating.

use async_trait::async_trait;
use blockmind_core::error::ActionError;
use blockmind_core::{ActionToken, EnvironmentSession, PerceptionSnapshot, Position};
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything a handler may look at while performing its action.
pub struct ActionContext<'a> {
    pub agent: &'a str,
    pub session: &'a dyn EnvironmentSession,
    pub snapshot: &'a PerceptionSnapshot,
}

/// A place the agent reached, worth remembering.
#[derive(Debug, Clone, PartialEq)]
pub struct VisitedLocation {
    pub position: Position,
    pub biome: String,
    pub notable_blocks: Vec<String>,
}

/// What a handler reports on success.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionReport {
    pub description: String,
    pub location: Option<VisitedLocation>,
}

impl ActionReport {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            location: None,
        }
    }

    pub fn with_location(mut self, location: VisitedLocation) -> Self {
        self.location = Some(location);
        self
    }
}

/// The classified result of one dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    /// The token the oracle decided on.
    pub token: ActionToken,
    /// The token of the handler that actually ran.
    pub handled_by: ActionToken,
    pub description: String,
    pub success: bool,
    pub location: Option<VisitedLocation>,
}

/// A capability the agent can perform in the world.
///
/// Multi-step handlers (craft, for example) keep their sub-steps internal;
/// only the final report or error is seen by the dispatcher.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// The token this handler answers to.
    fn action(&self) -> ActionToken;

    async fn perform(&self, ctx: &ActionContext<'_>) -> Result<ActionReport, ActionError>;
}

/// Token → handler registry with a default route.
pub struct ActionDispatcher {
    handlers: HashMap<ActionToken, Arc<dyn ActionHandler>>,
    default: Arc<dyn ActionHandler>,
}

impl ActionDispatcher {
    /// Create a dispatcher whose fallback route is `default`.
    ///
    /// The default handler is also registered under its own token.
    pub fn new(default: Arc<dyn ActionHandler>) -> Self {
        let mut handlers: HashMap<ActionToken, Arc<dyn ActionHandler>> = HashMap::new();
        handlers.insert(default.action(), default.clone());
        Self { handlers, default }
    }

    /// Register a handler. Replaces any existing handler for the same token.
    pub fn register(&mut self, handler: Arc<dyn ActionHandler>) {
        self.handlers.insert(handler.action(), handler);
    }

    pub fn with_handler(mut self, handler: Arc<dyn ActionHandler>) -> Self {
        self.register(handler);
        self
    }

    pub fn has_handler(&self, token: ActionToken) -> bool {
        self.handlers.contains_key(&token)
    }

    pub fn default_action(&self) -> ActionToken {
        self.default.action()
    }

    /// Registered tokens, in vocabulary priority order.
    pub fn actions(&self) -> Vec<ActionToken> {
        ActionToken::PRIORITY
            .into_iter()
            .filter(|t| self.handlers.contains_key(t))
            .collect()
    }

    /// Perform `token`, never failing.
    pub async fn dispatch(&self, token: ActionToken, ctx: &ActionContext<'_>) -> DispatchOutcome {
        let handler = match self.handlers.get(&token) {
            Some(h) => h.clone(),
            None => {
                debug!(agent = ctx.agent, action = %token, "No handler registered, using default");
                self.default.clone()
            }
        };

        let mut result = perform_caught(handler.as_ref(), ctx).await;
        let mut handled_by = handler.action();

        if let Err(ActionError::Unsupported(ref capability)) = result
            && handled_by != self.default.action()
        {
            debug!(agent = ctx.agent, capability = %capability, "Capability unsupported, using default");
            handled_by = self.default.action();
            result = perform_caught(self.default.as_ref(), ctx).await;
        }

        match result {
            Ok(report) => DispatchOutcome {
                token,
                handled_by,
                description: report.description,
                success: true,
                location: report.location,
            },
            Err(e) => {
                warn!(agent = ctx.agent, action = %token, error = %e, "Action failed");
                DispatchOutcome {
                    token,
                    handled_by,
                    description: e.to_string(),
                    success: false,
                    location: None,
                }
            }
        }
    }
}

/// Run a handler, turning a panic into [`ActionError::Panicked`].
async fn perform_caught(
    handler: &dyn ActionHandler,
    ctx: &ActionContext<'_>,
) -> Result<ActionReport, ActionError> {
    match AssertUnwindSafe(handler.perform(ctx)).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(ActionError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{MockSession, snapshot};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Counting {
        token: ActionToken,
        calls: AtomicU32,
        fail_with: Option<ActionError>,
    }

    impl Counting {
        fn ok(token: ActionToken) -> Arc<Self> {
            Arc::new(Self {
                token,
                calls: AtomicU32::new(0),
                fail_with: None,
            })
        }

        fn failing(token: ActionToken, error: ActionError) -> Arc<Self> {
            Arc::new(Self {
                token,
                calls: AtomicU32::new(0),
                fail_with: Some(error),
            })
        }
    }

    #[async_trait]
    impl ActionHandler for Counting {
        fn action(&self) -> ActionToken {
            self.token
        }

        async fn perform(&self, _ctx: &ActionContext<'_>) -> Result<ActionReport, ActionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.fail_with {
                Some(e) => Err(e.clone()),
                None => Ok(ActionReport::new(format!("did {}", self.token))),
            }
        }
    }

    #[tokio::test]
    async fn unregistered_token_uses_default() {
        let explore = Counting::ok(ActionToken::Explore);
        let dispatcher = ActionDispatcher::new(explore.clone());
        let session = MockSession::spawned();
        let snap = snapshot();
        let ctx = ActionContext {
            agent: "AI_Friend",
            session: &session,
            snapshot: &snap,
        };

        let outcome = dispatcher.dispatch(ActionToken::Sleep, &ctx).await;
        assert!(outcome.success);
        assert_eq!(outcome.token, ActionToken::Sleep);
        assert_eq!(outcome.handled_by, ActionToken::Explore);
        assert_eq!(explore.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unsupported_reroutes_to_default() {
        let explore = Counting::ok(ActionToken::Explore);
        let mine = Counting::failing(
            ActionToken::Mine,
            ActionError::Unsupported("mine".into()),
        );
        let dispatcher = ActionDispatcher::new(explore.clone()).with_handler(mine.clone());
        let session = MockSession::spawned();
        let snap = snapshot();
        let ctx = ActionContext {
            agent: "AI_Friend",
            session: &session,
            snapshot: &snap,
        };

        let outcome = dispatcher.dispatch(ActionToken::Mine, &ctx).await;
        assert!(outcome.success);
        assert_eq!(outcome.handled_by, ActionToken::Explore);
        assert_eq!(mine.calls.load(Ordering::SeqCst), 1);
        assert_eq!(explore.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn handler_failure_is_contained() {
        let craft = Counting::failing(
            ActionToken::Craft,
            ActionError::MissingPrerequisite("no logs".into()),
        );
        let dispatcher =
            ActionDispatcher::new(Counting::ok(ActionToken::Explore)).with_handler(craft);
        let session = MockSession::spawned();
        let snap = snapshot();
        let ctx = ActionContext {
            agent: "AI_Friend",
            session: &session,
            snapshot: &snap,
        };

        let outcome = dispatcher.dispatch(ActionToken::Craft, &ctx).await;
        assert!(!outcome.success);
        assert_eq!(outcome.handled_by, ActionToken::Craft);
        assert!(outcome.description.contains("no logs"));
    }

    struct Exploding;

    #[async_trait]
    impl ActionHandler for Exploding {
        fn action(&self) -> ActionToken {
            ActionToken::Eat
        }

        async fn perform(&self, _ctx: &ActionContext<'_>) -> Result<ActionReport, ActionError> {
            panic!("bread was a lie");
        }
    }

    #[tokio::test]
    async fn handler_panic_becomes_failed_outcome() {
        let dispatcher = ActionDispatcher::new(Counting::ok(ActionToken::Explore))
            .with_handler(Arc::new(Exploding));
        let session = MockSession::spawned();
        let snap = snapshot();
        let ctx = ActionContext {
            agent: "AI_Friend",
            session: &session,
            snapshot: &snap,
        };

        let outcome = dispatcher.dispatch(ActionToken::Eat, &ctx).await;
        assert!(!outcome.success);
        assert_eq!(outcome.handled_by, ActionToken::Eat);
        assert!(outcome.description.contains("bread was a lie"));
    }

    #[test]
    fn registry_lists_actions_in_priority_order() {
        let dispatcher = ActionDispatcher::new(Counting::ok(ActionToken::Explore))
            .with_handler(Counting::ok(ActionToken::Chat))
            .with_handler(Counting::ok(ActionToken::Eat));
        assert_eq!(
            dispatcher.actions(),
            vec![ActionToken::Explore, ActionToken::Eat, ActionToken::Chat]
        );
        assert!(!dispatcher.has_handler(ActionToken::Mine));
        assert_eq!(dispatcher.default_action(), ActionToken::Explore);
    }
}
