//! Threat geometry shared by the retreat resolver and the critical-HP rule.

use std::collections::BTreeMap;

use outlast_types::{Position, Tile};

/// Cardinal steps in candidate order.
const STEPS: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// The visible tile with the highest positive threat, ties broken by
/// smaller Manhattan distance to `pos`. The agent's own tile is skipped.
pub fn highest_threat_tile(pos: Position, tiles: &[Tile]) -> Option<&Tile> {
    let mut best: Option<(&Tile, u32)> = None;
    for tile in tiles {
        if tile.base_threat <= 0 {
            continue;
        }
        let dist = pos.manhattan(tile.pos());
        if dist == 0 {
            continue;
        }
        let better = best.is_none_or(|(current, current_dist)| {
            tile.base_threat > current.base_threat
                || (tile.base_threat == current.base_threat && dist < current_dist)
        });
        if better {
            best = Some((tile, dist));
        }
    }
    best.map(|(tile, _)| tile)
}

/// The first visible tile with the strongest positive threat.
pub fn strongest_visible_threat(tiles: &[Tile]) -> Option<&Tile> {
    tiles
        .iter()
        .filter(|t| t.base_threat > 0)
        .fold(None, |best: Option<&Tile>, tile| match best {
            Some(b) if b.base_threat >= tile.base_threat => Some(b),
            _ => Some(tile),
        })
}

/// The cardinal step from `pos` onto a visible passable tile that maximizes
/// Manhattan distance from `threat`, ties broken by lower destination threat.
pub fn best_retreat_step(pos: Position, threat: Position, tiles: &[Tile]) -> Option<(i32, i32)> {
    let visible: BTreeMap<Position, &Tile> = tiles.iter().map(|t| (t.pos(), t)).collect();
    let mut best: Option<((i32, i32), u32, i32)> = None;
    for (dx, dy) in STEPS {
        let dest = pos.offset(dx, dy);
        let Some(tile) = visible.get(&dest) else {
            continue;
        };
        if !tile.passable {
            continue;
        }
        let dist = dest.manhattan(threat);
        let risk = tile.base_threat;
        let better = best.is_none_or(|(_, best_dist, best_risk)| {
            dist > best_dist || (dist == best_dist && risk < best_risk)
        });
        if better {
            best = Some(((dx, dy), dist, risk));
        }
    }
    best.map(|(step, _, _)| step)
}

/// One step from `from` toward `to` on each axis.
pub const fn step_toward(from: Position, to: Position) -> Position {
    Position::new(
        from.x.saturating_add(signum(to.x.saturating_sub(from.x))),
        from.y.saturating_add(signum(to.y.saturating_sub(from.y))),
    )
}

const fn signum(v: i32) -> i32 {
    if v > 0 {
        1
    } else if v < 0 {
        -1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn threat_tile(x: i32, y: i32, threat: i32) -> Tile {
        Tile {
            base_threat: threat,
            ..Tile::grass(x, y)
        }
    }

    #[test]
    fn highest_threat_prefers_closer_on_tie() {
        let tiles = vec![threat_tile(3, 0, 2), threat_tile(1, 0, 2), threat_tile(0, 0, 9)];
        let best = highest_threat_tile(Position::new(0, 0), &tiles);
        assert_eq!(best.map(Tile::pos), Some(Position::new(1, 0)));
    }

    #[test]
    fn no_threat_tiles_yields_none() {
        let tiles = vec![Tile::grass(1, 0)];
        assert!(highest_threat_tile(Position::new(0, 0), &tiles).is_none());
        assert!(strongest_visible_threat(&tiles).is_none());
    }

    #[test]
    fn retreat_step_moves_away_from_threat() {
        let tiles = vec![
            Tile::grass(0, 0),
            threat_tile(1, 0, 3),
            Tile::grass(-1, 0),
            Tile::grass(0, 1),
            Tile::grass(0, -1),
        ];
        let step = best_retreat_step(Position::new(0, 0), Position::new(1, 0), &tiles);
        assert_eq!(step, Some((-1, 0)));
    }

    #[test]
    fn retreat_step_skips_impassable() {
        let mut blocked = Tile::grass(-1, 0);
        blocked.passable = false;
        let tiles = vec![blocked, Tile::grass(0, 1), threat_tile(1, 0, 3)];
        let step = best_retreat_step(Position::new(0, 0), Position::new(1, 0), &tiles);
        assert_eq!(step, Some((0, 1)));
    }

    #[test]
    fn step_toward_home_moves_both_axes() {
        assert_eq!(
            step_toward(Position::new(3, -2), Position::new(0, 0)),
            Position::new(2, -1)
        );
        assert_eq!(
            step_toward(Position::new(0, 0), Position::new(0, 0)),
            Position::new(0, 0)
        );
    }
}
