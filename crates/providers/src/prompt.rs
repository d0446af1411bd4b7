//! Prompt rendering for the two oracle request kinds.

use blockmind_core::{ActionToken, OracleRequest};

/// Render the text prompt sent to a completion endpoint.
pub fn render(request: &OracleRequest) -> String {
    match request {
        OracleRequest::DecideAction {
            snapshot_summary, ..
        } => decide_action(snapshot_summary),
        OracleRequest::ComposeReply {
            situation,
            peers,
            recent_events,
            ..
        } => compose_reply(situation, peers, recent_events),
    }
}

fn decide_action(snapshot_summary: &str) -> String {
    let mut prompt = String::from("You are a smart Minecraft player. Current status:\n");
    prompt.push_str(snapshot_summary);
    prompt.push_str("\n\nSelect one of the following actions and type the name of the action:\n");
    for token in ActionToken::PRIORITY {
        prompt.push_str("- ");
        prompt.push_str(token.as_str());
        prompt.push('\n');
    }
    prompt.push_str("\nAction:");
    prompt
}

fn compose_reply(situation: &str, peers: &[String], recent_events: &[String]) -> String {
    let peers = if peers.is_empty() {
        "none".to_string()
    } else {
        peers.join(", ")
    };
    let events = if recent_events.is_empty() {
        "none".to_string()
    } else {
        recent_events.join("; ")
    };

    format!(
        "You are a friendly Minecraft player. What would you say in this situation?\n\n\
         SITUATION: {situation}\n\
         OTHER PLAYERS: {peers}\n\
         RECENT EVENTS: {events}\n\n\
         Write a short and friendly message (maximum 2 sentences):"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decide_prompt_lists_every_action() {
        let prompt = render(&OracleRequest::DecideAction {
            snapshot_summary: "HEALTH: 20/20\nPOSITION: x=1, y=64, z=-3".into(),
            max_response_tokens: 20,
        });
        assert!(prompt.contains("POSITION: x=1, y=64, z=-3"));
        for token in ActionToken::PRIORITY {
            assert!(prompt.contains(&format!("- {token}")));
        }
        assert!(!prompt.contains("fight"));
        assert!(prompt.trim_end().ends_with("Action:"));
    }

    #[test]
    fn reply_prompt_includes_context() {
        let prompt = render(&OracleRequest::ComposeReply {
            situation: "Steve said: hi".into(),
            peers: vec!["Steve".into(), "Alex".into()],
            recent_events: vec!["peer_joined".into()],
            max_response_tokens: 50,
        });
        assert!(prompt.contains("SITUATION: Steve said: hi"));
        assert!(prompt.contains("OTHER PLAYERS: Steve, Alex"));
        assert!(prompt.contains("RECENT EVENTS: peer_joined"));
        assert!(prompt.contains("maximum 2 sentences"));
    }

    #[test]
    fn reply_prompt_without_peers() {
        let prompt = render(&OracleRequest::ComposeReply {
            situation: "alone".into(),
            peers: vec![],
            recent_events: vec![],
            max_response_tokens: 50,
        });
        assert!(prompt.contains("OTHER PLAYERS: none"));
        assert!(prompt.contains("RECENT EVENTS: none"));
    }
}
