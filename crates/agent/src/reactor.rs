//! Event reactor: social and bookkeeping reactions to session events.
//!
//! Reactions run as their own tasks next to the decision loop. Both write
//! to the same [`TieredMemory`], whose short-term buffer is behind a mutex,
//! so appends from either side are ordered by arrival.

use blockmind_config::BehaviorConfig;
use blockmind_core::{
    AgentIdentity, DomainEvent, EnvironmentEvent, EnvironmentSession, EventBus, ShortTermKind,
};
use blockmind_memory::TieredMemory;
use rand::Rng;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::gateway::{PolicyGateway, REPLY_EVENT_WINDOW, ReplyContext};
use crate::scheduler::jitter;

/// Delays and thresholds used by the reactor.
#[derive(Debug, Clone, PartialEq)]
pub struct ReactorSettings {
    pub greet_delay: (Duration, Duration),
    pub reply_delay: (Duration, Duration),
    pub low_health_threshold: f32,
}

impl Default for ReactorSettings {
    fn default() -> Self {
        Self {
            greet_delay: (Duration::from_millis(1000), Duration::from_millis(4000)),
            reply_delay: (Duration::from_millis(1000), Duration::from_millis(3000)),
            low_health_threshold: 10.0,
        }
    }
}

impl ReactorSettings {
    pub fn from_config(behavior: &BehaviorConfig) -> Self {
        Self {
            greet_delay: (
                Duration::from_millis(behavior.greet_delay_min_ms),
                Duration::from_millis(behavior.greet_delay_max_ms),
            ),
            reply_delay: (
                Duration::from_millis(behavior.reply_delay_min_ms),
                Duration::from_millis(behavior.reply_delay_max_ms),
            ),
            low_health_threshold: behavior.low_health_threshold,
        }
    }
}

/// Whether to answer `text`: always when mentioned, otherwise when `roll`
/// (uniform in `[0, 1)`) lands under the chattiness trait.
pub fn should_respond(identity: &AgentIdentity, text: &str, roll: f64) -> bool {
    identity.is_mentioned_in(text) || roll < identity.personality.chattiness
}

pub fn greeting_for(peer: &str) -> String {
    format!("Hello {peer}! 👋")
}

pub struct EventReactor {
    identity: Arc<AgentIdentity>,
    memory: Arc<TieredMemory>,
    gateway: Arc<PolicyGateway>,
    events: Arc<EventBus>,
    settings: ReactorSettings,
    tasks: JoinSet<()>,
}

impl EventReactor {
    pub fn new(
        identity: Arc<AgentIdentity>,
        memory: Arc<TieredMemory>,
        gateway: Arc<PolicyGateway>,
        events: Arc<EventBus>,
        settings: ReactorSettings,
    ) -> Self {
        Self {
            identity,
            memory,
            gateway,
            events,
            settings,
            tasks: JoinSet::new(),
        }
    }

    /// Reactions still running.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// React to one session event.
    ///
    /// Lifecycle events (`Spawned`, `Kicked`, `Disconnected`) belong to the
    /// supervisor and are ignored here.
    pub fn handle(&mut self, event: EnvironmentEvent, session: &Arc<dyn EnvironmentSession>) {
        self.reap();
        match event {
            EnvironmentEvent::PeerJoined { peer } => self.on_peer_joined(peer, session),
            EnvironmentEvent::PeerLeft { peer } => {
                self.memory
                    .add_event(ShortTermKind::PeerLeft, json!({ "peer": peer }));
            }
            EnvironmentEvent::ChatReceived { from, text } => self.on_chat(from, text, session),
            EnvironmentEvent::HealthChanged { health } => {
                if health < self.settings.low_health_threshold {
                    debug!(agent = %self.identity.name, health, "Low health");
                    self.memory
                        .add_event(ShortTermKind::LowHealth, json!({ "health": health }));
                }
            }
            EnvironmentEvent::Spawned
            | EnvironmentEvent::Kicked { .. }
            | EnvironmentEvent::Disconnected => {}
        }
    }

    fn on_peer_joined(&mut self, peer: String, session: &Arc<dyn EnvironmentSession>) {
        if peer == self.identity.name {
            return;
        }
        self.memory
            .add_event(ShortTermKind::PeerJoined, json!({ "peer": peer }));

        // public fields: a hand-built personality may be out of range
        let social = self.identity.personality.clamped().social;
        let greet = rand::rng().random_bool(social);
        if !greet {
            return;
        }

        let delay = jitter(self.settings.greet_delay.0, self.settings.greet_delay.1);
        let agent = self.identity.name.clone();
        let session = session.clone();
        let events = self.events.clone();
        self.tasks.spawn(async move {
            tokio::time::sleep(delay).await;
            match session.send_chat(&greeting_for(&peer)).await {
                Ok(()) => {
                    info!(agent = %agent, peer = %peer, "Greeted");
                    events.publish(DomainEvent::ChatSent {
                        agent,
                        peer,
                        timestamp: chrono::Utc::now(),
                    });
                }
                Err(e) => warn!(agent = %agent, peer = %peer, error = %e, "Greeting failed"),
            }
        });
    }

    fn on_chat(&mut self, from: String, text: String, session: &Arc<dyn EnvironmentSession>) {
        if from == self.identity.name {
            return;
        }
        self.memory.add_event(
            ShortTermKind::ChatReceived,
            json!({ "from": from, "text": text }),
        );

        let roll: f64 = rand::rng().random();
        if !should_respond(&self.identity, &text, roll) {
            debug!(agent = %self.identity.name, from = %from, "Not answering");
            return;
        }

        let delay = jitter(self.settings.reply_delay.0, self.settings.reply_delay.1);
        let agent = self.identity.name.clone();
        let session = session.clone();
        let memory = self.memory.clone();
        let gateway = self.gateway.clone();
        let events = self.events.clone();
        self.tasks.spawn(async move {
            let peers = match session.current_state().await {
                Ok(state) => state
                    .players
                    .into_iter()
                    .map(|p| p.name)
                    .filter(|name| *name != agent)
                    .collect(),
                Err(_) => Vec::new(),
            };
            let context = ReplyContext {
                situation: format!("{from} said: \"{text}\""),
                peers,
                recent_events: memory
                    .recent_events(REPLY_EVENT_WINDOW)
                    .iter()
                    .map(|e| e.describe())
                    .collect(),
            };

            let reply = gateway.compose_reply(&agent, &context).await;
            tokio::time::sleep(delay).await;

            match session.send_chat(&reply).await {
                Ok(()) => {
                    memory.record_interaction(&from, &text, &reply);
                    events.publish(DomainEvent::ChatSent {
                        agent,
                        peer: from,
                        timestamp: chrono::Utc::now(),
                    });
                }
                Err(e) => warn!(agent = %agent, peer = %from, error = %e, "Reply not sent"),
            }
        });
    }

    /// Drop finished reactions.
    fn reap(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            if let Err(e) = result
                && e.is_panic()
            {
                warn!(agent = %self.identity.name, error = %e, "Reaction panicked");
            }
        }
    }

    /// Wait for every running reaction to finish.
    pub async fn drain(&mut self) {
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result
                && e.is_panic()
            {
                warn!(agent = %self.identity.name, error = %e, "Reaction panicked");
            }
        }
    }

    /// Abandon every running reaction.
    pub fn abort_all(&mut self) {
        self.tasks.abort_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FailingOracle, MockSession, ScriptedOracle};
    use blockmind_core::{Endpoint, Personality, Position};
    use blockmind_memory::InMemoryStore;

    fn identity(personality: Personality) -> Arc<AgentIdentity> {
        Arc::new(AgentIdentity::new("AI_Friend", Endpoint::default()).with_personality(personality))
    }

    fn reactor(
        identity: Arc<AgentIdentity>,
        gateway: PolicyGateway,
    ) -> (EventReactor, Arc<TieredMemory>, Arc<EventBus>) {
        let memory = Arc::new(TieredMemory::new(
            identity.name.clone(),
            Arc::new(InMemoryStore::new()),
        ));
        let bus = Arc::new(EventBus::new(64));
        let reactor = EventReactor::new(
            identity,
            memory.clone(),
            Arc::new(gateway),
            bus.clone(),
            ReactorSettings::default(),
        );
        (reactor, memory, bus)
    }

    #[test]
    fn mention_short_circuits_chattiness() {
        let quiet = AgentIdentity::new("AI_Friend", Endpoint::default())
            .with_personality(Personality::new(0.0, 0.5, 0.5, 0.5));
        assert!(should_respond(&quiet, "hey AI_Friend, nice base", 0.99));
        assert!(should_respond(&quiet, "@ai_friend come here", 0.99));
        assert!(!should_respond(&quiet, "hello everyone", 0.0));
    }

    #[test]
    fn chattiness_is_a_threshold() {
        let chatty = AgentIdentity::new("AI_Friend", Endpoint::default())
            .with_personality(Personality::new(0.8, 0.5, 0.5, 0.5));
        assert!(should_respond(&chatty, "hello everyone", 0.79));
        assert!(!should_respond(&chatty, "hello everyone", 0.8));
    }

    #[tokio::test(start_paused = true)]
    async fn mention_gets_reply_and_interaction() {
        let oracle = Arc::new(ScriptedOracle::new(vec!["Thanks Steve!"]));
        let (mut reactor, memory, bus) = reactor(
            identity(Personality::new(0.0, 0.5, 0.0, 0.5)),
            PolicyGateway::new(oracle.clone()),
        );
        let mut rx = bus.subscribe();
        let mock = Arc::new(MockSession::spawned());
        mock.set_players(vec![("Steve", Position::new(2.0, 64.0, 0.0))]);
        let session: Arc<dyn EnvironmentSession> = mock.clone();

        reactor.handle(
            EnvironmentEvent::ChatReceived {
                from: "Steve".into(),
                text: "hey AI_Friend, nice base".into(),
            },
            &session,
        );
        reactor.drain().await;

        assert_eq!(mock.chats(), vec!["Thanks Steve!".to_string()]);
        assert_eq!(memory.recent_events(1)[0].kind, ShortTermKind::ChatReceived);

        memory.flush().await;
        let interactions = memory.query_interactions("Steve", 10).await.unwrap();
        assert_eq!(interactions.len(), 1);
        assert_eq!(interactions[0].message, "hey AI_Friend, nice base");
        assert_eq!(interactions[0].reply, "Thanks Steve!");

        match oracle.requests().pop() {
            Some(blockmind_core::OracleRequest::ComposeReply { peers, .. }) => {
                assert_eq!(peers, vec!["Steve".to_string()]);
            }
            other => panic!("unexpected request: {other:?}"),
        }
        assert!(matches!(
            rx.recv().await.unwrap().as_ref(),
            DomainEvent::ChatSent { peer, .. } if peer == "Steve"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn oracle_down_still_replies_with_fallback() {
        let (mut reactor, _memory, _bus) = reactor(
            identity(Personality::new(1.0, 0.5, 0.0, 0.5)),
            PolicyGateway::new(Arc::new(FailingOracle)).with_fallback_reply("hi!"),
        );
        let mock = Arc::new(MockSession::spawned());
        let session: Arc<dyn EnvironmentSession> = mock.clone();

        reactor.handle(
            EnvironmentEvent::ChatReceived {
                from: "Steve".into(),
                text: "anyone around?".into(),
            },
            &session,
        );
        reactor.drain().await;
        assert_eq!(mock.chats(), vec!["hi!".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn own_messages_are_ignored() {
        let oracle = Arc::new(ScriptedOracle::new(vec!["echo"]));
        let (mut reactor, memory, _bus) = reactor(
            identity(Personality::new(1.0, 0.5, 0.0, 0.5)),
            PolicyGateway::new(oracle.clone()),
        );
        let session: Arc<dyn EnvironmentSession> = Arc::new(MockSession::spawned());

        reactor.handle(
            EnvironmentEvent::ChatReceived {
                from: "AI_Friend".into(),
                text: "AI_Friend here".into(),
            },
            &session,
        );
        reactor.drain().await;
        assert_eq!(oracle.call_count(), 0);
        assert_eq!(memory.short_term_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn social_agent_greets_after_delay() {
        let (mut reactor, memory, _bus) = reactor(
            identity(Personality::new(0.0, 0.5, 1.0, 0.5)),
            PolicyGateway::new(Arc::new(FailingOracle)),
        );
        let mock = Arc::new(MockSession::spawned());
        let session: Arc<dyn EnvironmentSession> = mock.clone();

        reactor.handle(EnvironmentEvent::PeerJoined { peer: "Alex".into() }, &session);
        assert!(mock.chats().is_empty());
        assert_eq!(reactor.pending(), 1);

        reactor.drain().await;
        assert_eq!(mock.chats(), vec![greeting_for("Alex")]);
        assert_eq!(memory.recent_events(1)[0].kind, ShortTermKind::PeerJoined);
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_range_social_trait_still_greets() {
        let mut raw = AgentIdentity::new("AI_Friend", Endpoint::default());
        raw.personality.social = 1.5;
        let (mut reactor, _memory, _bus) = reactor(
            Arc::new(raw),
            PolicyGateway::new(Arc::new(FailingOracle)),
        );
        let mock = Arc::new(MockSession::spawned());
        let session: Arc<dyn EnvironmentSession> = mock.clone();

        reactor.handle(EnvironmentEvent::PeerJoined { peer: "Alex".into() }, &session);
        reactor.drain().await;
        assert_eq!(mock.chats(), vec![greeting_for("Alex")]);
    }

    #[tokio::test(start_paused = true)]
    async fn unsocial_agent_only_remembers() {
        let (mut reactor, memory, _bus) = reactor(
            identity(Personality::new(0.0, 0.5, 0.0, 0.5)),
            PolicyGateway::new(Arc::new(FailingOracle)),
        );
        let mock = Arc::new(MockSession::spawned());
        let session: Arc<dyn EnvironmentSession> = mock.clone();

        reactor.handle(EnvironmentEvent::PeerJoined { peer: "Alex".into() }, &session);
        reactor.handle(EnvironmentEvent::PeerLeft { peer: "Alex".into() }, &session);
        reactor.drain().await;

        assert!(mock.chats().is_empty());
        let kinds: Vec<ShortTermKind> = memory.recent_events(5).iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![ShortTermKind::PeerJoined, ShortTermKind::PeerLeft]);
    }

    #[tokio::test]
    async fn low_health_recorded_below_threshold_only() {
        let (mut reactor, memory, _bus) = reactor(
            identity(Personality::default()),
            PolicyGateway::new(Arc::new(FailingOracle)),
        );
        let session: Arc<dyn EnvironmentSession> = Arc::new(MockSession::spawned());

        reactor.handle(EnvironmentEvent::HealthChanged { health: 15.0 }, &session);
        assert_eq!(memory.short_term_len(), 0);
        reactor.handle(EnvironmentEvent::HealthChanged { health: 4.0 }, &session);
        assert_eq!(memory.recent_events(1)[0].kind, ShortTermKind::LowHealth);
    }
}
