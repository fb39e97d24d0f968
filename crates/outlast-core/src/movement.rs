//! Move intent resolution.
//!
//! A move either names a single-step direction (`dx`, `dy`) or a target
//! `pos`. Targets are accepted only when a four-directional path of visible
//! passable tiles connects them to the agent. The agent's own tile counts as
//! passable even when the snapshot omits it.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use outlast_types::{ActionIntent, ActionType, Position, Tile};

use crate::error::ActionError;

const NEIGHBORS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Turn a move intent into a concrete `(dx, dy)` delta, validating it
/// against the visible tiles. Other intents pass through unchanged.
pub fn resolve_move_intent(
    origin: Position,
    mut intent: ActionIntent,
    tiles: &[Tile],
) -> Result<ActionIntent, ActionError> {
    if intent.action_type != ActionType::Move {
        return Ok(intent);
    }
    if let Some(target) = intent.params.pos {
        if target == origin {
            return Err(invalid(target, None));
        }
        let (dx, dy) = resolve_move_to_position(origin, target, tiles)?;
        intent.params.dx = dx;
        intent.params.dy = dy;
        return Ok(intent);
    }

    let (dx, dy) = (intent.params.dx, intent.params.dy);
    let target = origin.offset(dx, dy);
    if dx.unsigned_abs() > 1 || dy.unsigned_abs() > 1 {
        return Err(invalid(target, None));
    }
    match tiles.iter().find(|t| t.pos() == target) {
        Some(tile) if tile.passable => Ok(intent),
        Some(_) => Err(invalid(target, Some(target))),
        None => Err(invalid(target, None)),
    }
}

/// Delta from `origin` to `target` when a passable path exists.
fn resolve_move_to_position(
    origin: Position,
    target: Position,
    tiles: &[Tile],
) -> Result<(i32, i32), ActionError> {
    let mut passable: BTreeMap<Position, bool> =
        tiles.iter().map(|t| (t.pos(), t.passable)).collect();
    match passable.get(&target) {
        None => return Err(invalid(target, None)),
        Some(false) => return Err(invalid(target, Some(target))),
        Some(true) => {}
    }
    passable.entry(origin).or_insert(true);

    match search(origin, target, &passable) {
        Search::Reached => Ok((
            target.x.saturating_sub(origin.x),
            target.y.saturating_sub(origin.y),
        )),
        Search::Blocked(blocking) => Err(invalid(target, blocking)),
    }
}

enum Search {
    Reached,
    /// The closest impassable visible tile touching the explored region.
    Blocked(Option<Position>),
}

/// Breadth-first search over passable tiles.
fn search(origin: Position, target: Position, passable: &BTreeMap<Position, bool>) -> Search {
    let mut visited = BTreeSet::from([origin]);
    let mut queue = VecDeque::from([origin]);
    let mut walls = BTreeSet::new();

    while let Some(cur) = queue.pop_front() {
        for (dx, dy) in NEIGHBORS {
            let next = cur.offset(dx, dy);
            if visited.contains(&next) {
                continue;
            }
            match passable.get(&next) {
                Some(true) => {
                    if next == target {
                        return Search::Reached;
                    }
                    visited.insert(next);
                    queue.push_back(next);
                }
                Some(false) => {
                    walls.insert(next);
                }
                None => {}
            }
        }
    }

    Search::Blocked(
        walls
            .into_iter()
            .min_by_key(|wall| (wall.manhattan(target), *wall)),
    )
}

const fn invalid(target: Position, blocking: Option<Position>) -> ActionError {
    ActionError::InvalidPosition {
        target_pos: Some(target),
        blocking_tile_pos: blocking,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn row(blocked: &[i32]) -> Vec<Tile> {
        (0..=2)
            .map(|x| Tile {
                passable: !blocked.contains(&x),
                ..Tile::grass(x, 0)
            })
            .collect()
    }

    fn move_to(x: i32, y: i32) -> ActionIntent {
        let mut intent = ActionIntent::bare(ActionType::Move);
        intent.params.pos = Some(Position::new(x, y));
        intent
    }

    fn step(dx: i32, dy: i32) -> ActionIntent {
        let mut intent = ActionIntent::bare(ActionType::Move);
        intent.params.dx = dx;
        intent.params.dy = dy;
        intent
    }

    #[test]
    fn move_to_reachable_position_sets_delta() {
        let resolved = resolve_move_intent(Position::new(0, 0), move_to(2, 0), &row(&[])).unwrap();
        assert_eq!((resolved.params.dx, resolved.params.dy), (2, 0));
    }

    #[test]
    fn blocked_path_reports_blocking_tile() {
        let err = resolve_move_intent(Position::new(0, 0), move_to(2, 0), &row(&[1])).unwrap_err();
        assert_eq!(
            err,
            ActionError::InvalidPosition {
                target_pos: Some(Position::new(2, 0)),
                blocking_tile_pos: Some(Position::new(1, 0)),
            }
        );
    }

    #[test]
    fn impassable_target_is_its_own_blocker() {
        let err = resolve_move_intent(Position::new(0, 0), move_to(2, 0), &row(&[2])).unwrap_err();
        assert_eq!(
            err,
            ActionError::InvalidPosition {
                target_pos: Some(Position::new(2, 0)),
                blocking_tile_pos: Some(Position::new(2, 0)),
            }
        );
    }

    #[test]
    fn invisible_target_is_invalid() {
        let err = resolve_move_intent(Position::new(0, 0), move_to(5, 5), &row(&[])).unwrap_err();
        assert_eq!(err.code(), "action_invalid_position");
    }

    #[test]
    fn moving_onto_self_is_invalid() {
        assert!(resolve_move_intent(Position::new(1, 0), move_to(1, 0), &row(&[])).is_err());
    }

    #[test]
    fn origin_need_not_be_visible() {
        let tiles = vec![Tile::grass(1, 0)];
        let resolved = resolve_move_intent(Position::new(0, 0), move_to(1, 0), &tiles).unwrap();
        assert_eq!(resolved.params.dx, 1);
    }

    #[test]
    fn single_step_checks_destination_tile() {
        assert!(resolve_move_intent(Position::new(0, 0), step(1, 0), &row(&[])).is_ok());
        let err = resolve_move_intent(Position::new(0, 0), step(1, 0), &row(&[1])).unwrap_err();
        assert!(matches!(
            err,
            ActionError::InvalidPosition {
                blocking_tile_pos: Some(_),
                ..
            }
        ));
        assert!(resolve_move_intent(Position::new(0, 0), step(2, 0), &row(&[])).is_err());
    }

    #[test]
    fn non_move_intents_pass_through() {
        let intent = ActionIntent::bare(ActionType::Gather);
        let resolved = resolve_move_intent(Position::new(0, 0), intent.clone(), &[]).unwrap();
        assert_eq!(resolved, intent);
    }
}
