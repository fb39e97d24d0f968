//! Derived view fields of a settled agent state.

use outlast_types::{AgentStateAggregate, StatusEffect, TimeOfDay, WorldSnapshot};

use crate::config::SettlementConfig;

/// Status effects for `state` in a world at `time_of_day`, in display order.
pub fn status_effects(
    state: &AgentStateAggregate,
    config: &SettlementConfig,
    time_of_day: TimeOfDay,
) -> Vec<StatusEffect> {
    let vitals = state.vitals;
    let mut effects = Vec::with_capacity(4);
    if vitals.hunger <= 0 {
        effects.push(StatusEffect::Starving);
    }
    if vitals.energy <= config.exhausted_energy_threshold {
        effects.push(StatusEffect::Exhausted);
    }
    if vitals.hp <= config.critical_hp_threshold {
        effects.push(StatusEffect::Critical);
    }
    if time_of_day == TimeOfDay::Night {
        effects.push(StatusEffect::InDark);
    }
    effects
}

/// Refresh the derived fields of `state` against `snapshot`.
///
/// The zone comes from the visible tile under the agent and is cleared when
/// that tile is out of view.
pub fn enrich_state(
    state: &mut AgentStateAggregate,
    config: &SettlementConfig,
    snapshot: &WorldSnapshot,
) {
    state.recompute_inventory_used();
    state.status_effects = status_effects(state, config, snapshot.time_of_day);
    state.current_zone = snapshot.tile_at(state.position).map(|tile| tile.zone);
}

#[cfg(test)]
mod tests {
    use outlast_types::{Position, Tile, Vitals, Zone};

    use super::*;

    fn with_vitals(hp: i32, hunger: i32, energy: i32) -> AgentStateAggregate {
        AgentStateAggregate {
            vitals: Vitals { hp, hunger, energy },
            ..AgentStateAggregate::fresh("agent-1")
        }
    }

    fn effects(state: &AgentStateAggregate, time_of_day: TimeOfDay) -> Vec<StatusEffect> {
        status_effects(state, &SettlementConfig::default(), time_of_day)
    }

    #[test]
    fn healthy_agent_by_day_has_no_effects() {
        assert!(effects(&with_vitals(100, 80, 60), TimeOfDay::Day).is_empty());
    }

    #[test]
    fn starving_at_zero_hunger_only() {
        assert_eq!(effects(&with_vitals(100, 0, 60), TimeOfDay::Day), vec![StatusEffect::Starving]);
        assert_eq!(effects(&with_vitals(100, -4, 60), TimeOfDay::Day), vec![StatusEffect::Starving]);
        assert!(effects(&with_vitals(100, 1, 60), TimeOfDay::Day).is_empty());
    }

    #[test]
    fn exhausted_at_threshold() {
        assert_eq!(effects(&with_vitals(100, 80, 20), TimeOfDay::Day), vec![StatusEffect::Exhausted]);
        assert!(effects(&with_vitals(100, 80, 21), TimeOfDay::Day).is_empty());
    }

    #[test]
    fn critical_at_threshold() {
        assert_eq!(effects(&with_vitals(20, 80, 60), TimeOfDay::Day), vec![StatusEffect::Critical]);
        assert!(effects(&with_vitals(21, 80, 60), TimeOfDay::Day).is_empty());
    }

    #[test]
    fn night_adds_in_dark_last() {
        assert_eq!(
            effects(&with_vitals(10, 0, 5), TimeOfDay::Night),
            vec![
                StatusEffect::Starving,
                StatusEffect::Exhausted,
                StatusEffect::Critical,
                StatusEffect::InDark,
            ]
        );
    }

    #[test]
    fn zone_follows_tile_under_agent() {
        let snapshot = WorldSnapshot {
            visible_tiles: vec![
                Tile::grass(0, 0),
                Tile {
                    zone: Zone::Forest,
                    ..Tile::grass(1, 0)
                },
            ],
            ..WorldSnapshot::default()
        };
        let config = SettlementConfig::default();

        let mut state = AgentStateAggregate::fresh("agent-1");
        state.position = Position::new(1, 0);
        enrich_state(&mut state, &config, &snapshot);
        assert_eq!(state.current_zone, Some(Zone::Forest));

        state.position = Position::new(7, 7);
        enrich_state(&mut state, &config, &snapshot);
        assert_eq!(state.current_zone, None);
    }
}
