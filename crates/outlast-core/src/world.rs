//! A fixed world for the binary and for tests.
//!
//! Real world generation lives outside the engine. [`StaticWorldProvider`]
//! either replays one snapshot verbatim or lays an open grass field around
//! whoever asks, with optional hand-placed tiles on top.

use std::collections::BTreeMap;

use async_trait::async_trait;

use outlast_types::{PortError, Position, Tile, WorldProvider, WorldSnapshot};

/// World provider backed by a fixed template.
#[derive(Debug, Clone)]
pub struct StaticWorldProvider {
    base: WorldSnapshot,
    field_radius: Option<i32>,
    placed: BTreeMap<Position, Tile>,
}

impl StaticWorldProvider {
    /// Serve `snapshot` to every agent, re-centered on the agent.
    pub fn new(snapshot: WorldSnapshot) -> Self {
        Self {
            base: snapshot,
            field_radius: None,
            placed: BTreeMap::new(),
        }
    }

    /// An open grass field of square `radius` around the agent.
    pub fn open_field(radius: i32) -> Self {
        let radius = radius.max(0);
        Self {
            base: WorldSnapshot {
                view_radius: radius,
                ..WorldSnapshot::default()
            },
            field_radius: Some(radius),
            placed: BTreeMap::new(),
        }
    }

    /// Place `tile` at its own position, replacing whatever was there.
    #[must_use]
    pub fn with_tile(mut self, tile: Tile) -> Self {
        self.placed.insert(tile.pos(), tile);
        self
    }

    fn field_tiles(&self, center: Position, radius: i32) -> Vec<Tile> {
        let mut tiles = Vec::new();
        for dy in radius.saturating_neg()..=radius {
            for dx in radius.saturating_neg()..=radius {
                let pos = center.offset(dx, dy);
                let tile = self
                    .placed
                    .get(&pos)
                    .cloned()
                    .unwrap_or_else(|| Tile::grass(pos.x, pos.y));
                tiles.push(tile);
            }
        }
        tiles
    }

    fn template_tiles(&self) -> Vec<Tile> {
        let mut tiles: Vec<Tile> = self
            .base
            .visible_tiles
            .iter()
            .filter(|t| !self.placed.contains_key(&t.pos()))
            .cloned()
            .collect();
        tiles.extend(self.placed.values().cloned());
        tiles
    }
}

/// Resource counts of the tiles carrying one.
fn nearby_resources(tiles: &[Tile]) -> BTreeMap<String, i32> {
    let mut out = BTreeMap::new();
    for resource in tiles.iter().filter_map(|t| t.resource.as_deref()) {
        let count = out.entry(resource.to_owned()).or_insert(0_i32);
        *count = count.saturating_add(1);
    }
    out
}

#[async_trait]
impl WorldProvider for StaticWorldProvider {
    async fn snapshot_for_agent(
        &self,
        _agent_id: &str,
        center: Position,
    ) -> Result<WorldSnapshot, PortError> {
        let mut snapshot = self.base.clone();
        snapshot.center = center;
        match self.field_radius {
            Some(radius) => {
                snapshot.visible_tiles = self.field_tiles(center, radius);
                snapshot.nearby_resource = nearby_resources(&snapshot.visible_tiles);
            }
            None if !self.placed.is_empty() => {
                snapshot.visible_tiles = self.template_tiles();
            }
            None => {}
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_field_centers_on_agent() {
        let world = StaticWorldProvider::open_field(2);
        let snapshot = world
            .snapshot_for_agent("a1", Position::new(10, -4))
            .await
            .unwrap();
        assert_eq!(snapshot.visible_tiles.len(), 25);
        assert_eq!(snapshot.center, Position::new(10, -4));
        assert!(snapshot.tile_at(Position::new(12, -2)).is_some());
        assert!(snapshot.tile_at(Position::new(13, -4)).is_none());
        assert!(snapshot.nearby_resource.is_empty());
    }

    #[tokio::test]
    async fn placed_tiles_override_the_field() {
        let mut tree = Tile::grass(1, 0);
        tree.resource = Some("wood".to_owned());
        let world = StaticWorldProvider::open_field(1).with_tile(tree);
        let snapshot = world.snapshot_for_agent("a1", Position::new(0, 0)).await.unwrap();
        let tile = snapshot.tile_at(Position::new(1, 0)).unwrap();
        assert_eq!(tile.resource.as_deref(), Some("wood"));
        assert_eq!(snapshot.nearby_resource.get("wood"), Some(&1));
    }

    #[tokio::test]
    async fn template_is_served_verbatim() {
        let template = WorldSnapshot {
            world_time_seconds: 600,
            visible_tiles: vec![Tile::grass(0, 0)],
            ..WorldSnapshot::default()
        };
        let world = StaticWorldProvider::new(template.clone());
        let snapshot = world.snapshot_for_agent("a1", Position::new(0, 0)).await.unwrap();
        assert_eq!(snapshot, template);
    }
}
