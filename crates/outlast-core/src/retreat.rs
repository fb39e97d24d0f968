//! Retreat direction and threat reporting.

use serde_json::json;

use outlast_agents::threat;
use outlast_types::{ActionIntent, ActionType, DomainEvent, EventType, Position, Tile};

/// Fill in the retreat step when a threat is visible.
///
/// The agent steps away from the highest-threat visible tile. With no
/// threat in view, or no passable escape, the intent is left as given and
/// an intent without a direction stays in place.
pub fn resolve_retreat_intent(mut intent: ActionIntent, pos: Position, tiles: &[Tile]) -> ActionIntent {
    if intent.action_type != ActionType::Retreat {
        return intent;
    }
    let Some(target) = threat::highest_threat_tile(pos, tiles) else {
        return intent;
    };
    if let Some((dx, dy)) = threat::best_retreat_step(pos, target.pos(), tiles) {
        intent.params.dx = dx;
        intent.params.dy = dy;
    }
    intent
}

/// Record the strongest visible threat on every `game_over` event.
pub fn attach_last_known_threat(events: &mut [DomainEvent], tiles: &[Tile]) {
    let Some(tile) = threat::strongest_visible_threat(tiles) else {
        return;
    };
    let report = json!({
        "id": format!("thr_{}_{}", tile.x, tile.y),
        "type": "wild",
        "pos": {"x": tile.x, "y": tile.y},
        "danger_score": tile.base_threat.saturating_mul(25).min(100),
    });
    for evt in events.iter_mut().filter(|e| e.event_type == EventType::GameOver) {
        evt.set("last_known_threat", report.clone());
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn threat_at(x: i32, y: i32, base_threat: i32) -> Tile {
        Tile {
            base_threat,
            ..Tile::grass(x, y)
        }
    }

    #[test]
    fn retreat_steps_away_from_threat() {
        let tiles = vec![
            Tile::grass(0, 0),
            threat_at(1, 0, 2),
            Tile::grass(-1, 0),
            Tile::grass(0, 1),
        ];
        let intent = resolve_retreat_intent(ActionIntent::bare(ActionType::Retreat), Position::new(0, 0), &tiles);
        assert_eq!((intent.params.dx, intent.params.dy), (-1, 0));
    }

    #[test]
    fn retreat_without_threat_stays_put() {
        let tiles = vec![Tile::grass(0, 0), Tile::grass(1, 0)];
        let intent = resolve_retreat_intent(ActionIntent::bare(ActionType::Retreat), Position::new(0, 0), &tiles);
        assert_eq!((intent.params.dx, intent.params.dy), (0, 0));
    }

    #[test]
    fn threat_report_attaches_to_game_over_only() {
        let mut events = vec![
            DomainEvent::new(EventType::ActionSettled, Utc::now(), json!({})),
            DomainEvent::new(EventType::GameOver, Utc::now(), json!({"last_known_threat": null})),
        ];
        attach_last_known_threat(&mut events, &[threat_at(2, 3, 5)]);
        assert!(!events.first().is_some_and(|e| e.payload.contains_key("last_known_threat")));
        let report = events.last().and_then(|e| e.payload.get("last_known_threat")).cloned();
        assert_eq!(
            report,
            Some(json!({"id": "thr_2_3", "type": "wild", "pos": {"x": 2, "y": 3}, "danger_score": 100}))
        );
    }
}
