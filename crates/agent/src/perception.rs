//! Perception snapshot builder.
//!
//! Reads the session's current state and reduces it to a [`PerceptionSnapshot`].
//! Only [`EnvironmentSession::current_state`] is called, so building a
//! snapshot never changes the world.

use blockmind_core::error::EnvironmentError;
use blockmind_core::{
    EnvironmentSession, NearbyPeer, PerceptionSnapshot, TimeOfDay, Weather, WorldState,
};
use chrono::Utc;

/// Query the session and build a snapshot for `self_name`.
///
/// Fails with [`EnvironmentError::NotReady`] while the agent has no position.
pub async fn build_snapshot(
    session: &dyn EnvironmentSession,
    self_name: &str,
) -> Result<PerceptionSnapshot, EnvironmentError> {
    let state = session.current_state().await?;
    snapshot_from_state(state, self_name)
}

/// Pure conversion from a raw [`WorldState`].
pub fn snapshot_from_state(
    state: WorldState,
    self_name: &str,
) -> Result<PerceptionSnapshot, EnvironmentError> {
    let position = state
        .position
        .ok_or_else(|| EnvironmentError::NotReady(format!("{self_name} has not spawned")))?;

    let mut nearby: Vec<NearbyPeer> = state
        .players
        .iter()
        .filter(|p| p.name != self_name)
        .filter_map(|p| {
            p.position.map(|pos| NearbyPeer {
                name: p.name.clone(),
                distance: position.distance_to(&pos),
            })
        })
        .collect();
    nearby.sort_by(|a, b| a.distance.total_cmp(&b.distance));

    Ok(PerceptionSnapshot {
        health: state.health,
        food: state.food,
        position,
        time_of_day: TimeOfDay::from_ticks(state.time_ticks),
        weather: Weather::classify(state.is_raining, state.is_thundering),
        nearby,
        inventory: state.inventory,
        biome: state.biome,
        notable_blocks: state.notable_blocks,
        taken_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockmind_core::{ItemStack, PlayerState, Position};

    fn state_at(position: Option<Position>) -> WorldState {
        WorldState {
            position,
            time_ticks: 18_000,
            is_raining: true,
            players: vec![
                PlayerState {
                    name: "AI_Friend".into(),
                    position,
                },
                PlayerState {
                    name: "Alex".into(),
                    position: Some(Position::new(10.0, 64.0, 0.0)),
                },
                PlayerState {
                    name: "Steve".into(),
                    position: Some(Position::new(3.0, 64.0, 4.0)),
                },
                PlayerState {
                    name: "Far".into(),
                    position: None,
                },
            ],
            inventory: vec![ItemStack::new("bread", 2)],
            ..WorldState::default()
        }
    }

    #[test]
    fn not_spawned_is_not_ready() {
        let err = snapshot_from_state(state_at(None), "AI_Friend").unwrap_err();
        assert!(matches!(err, EnvironmentError::NotReady(_)));
    }

    #[test]
    fn peers_sorted_and_self_excluded() {
        let snap =
            snapshot_from_state(state_at(Some(Position::new(0.0, 64.0, 0.0))), "AI_Friend")
                .unwrap();
        let names: Vec<&str> = snap.nearby.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Steve", "Alex"]);
        assert!((snap.nearby[0].distance - 5.0).abs() < 1e-9);
    }

    #[test]
    fn labels_are_coarse() {
        let snap =
            snapshot_from_state(state_at(Some(Position::new(0.0, 64.0, 0.0))), "AI_Friend")
                .unwrap();
        assert_eq!(snap.time_of_day, TimeOfDay::Night);
        assert_eq!(snap.weather, Weather::Rain);
        assert_eq!(snap.count_of("bread"), 2);
    }
}
