//! Core entity structs for the Outlast action engine.
//!
//! Covers the authoritative agent state aggregate, the per-call world
//! snapshot, and the storage records the ports exchange with adapters.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{
    ActionType, BedQuality, Biome, DeathCause, ObjectKind, ResultCode, SessionStatus,
    StatusEffect, TileKind, TimeOfDay, Zone,
};
use crate::events::DomainEvent;

// ---------------------------------------------------------------------------
// Agent state
// ---------------------------------------------------------------------------

/// HP, hunger, and energy of an agent.
///
/// Hunger and energy may go negative; the magnitude below zero drives HP
/// drain during settlement. HP at or below zero means death.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Vitals {
    /// Health points.
    pub hp: i32,
    /// Satiation; negative values mean starvation.
    pub hunger: i32,
    /// Stamina; negative values mean exhaustion.
    pub energy: i32,
}

/// Integer grid coordinate.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export, export_to = "bindings/")]
pub struct Position {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl Position {
    /// Construct a position.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Offset this position, saturating at the integer bounds.
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }

    /// Manhattan distance to `other`.
    pub const fn manhattan(self, other: Self) -> u32 {
        self.x
            .abs_diff(other.x)
            .saturating_add(self.y.abs_diff(other.y))
    }

    /// Chebyshev (king-move) distance to `other`.
    pub const fn chebyshev(self, other: Self) -> u32 {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        if dx > dy { dx } else { dy }
    }
}

/// An interruptible action spanning several requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct OngoingAction {
    /// The action in flight (only `rest` today).
    pub action_type: ActionType,
    /// Planned duration in minutes.
    pub minutes: i32,
    /// When the action completes on its own.
    pub end_at: DateTime<Utc>,
}

impl OngoingAction {
    /// When the action started, derived from its end time and duration.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.end_at
            .checked_sub_signed(chrono::Duration::minutes(i64::from(self.minutes)))
            .unwrap_or(self.end_at)
    }
}

/// The authoritative mutable record of one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AgentStateAggregate {
    /// Agent identifier.
    pub agent_id: String,
    /// Current play session.
    pub session_id: String,
    /// HP, hunger, and energy.
    pub vitals: Vitals,
    /// Current position.
    pub position: Position,
    /// Home position used as a fallback retreat target.
    pub home: Position,
    /// Item counts keyed by item type.
    pub inventory: BTreeMap<String, i32>,
    /// Maximum total item count.
    pub inventory_capacity: i32,
    /// Total item count. Always recomputed from `inventory`.
    pub inventory_used: i32,
    /// Interruptible action in flight, if any.
    pub ongoing_action: Option<OngoingAction>,
    /// Whether the agent has died.
    pub dead: bool,
    /// Cause of death, when dead.
    pub death_cause: Option<DeathCause>,
    /// Optimistic concurrency token, incremented by one per settlement.
    pub version: i64,
    /// Time of the last save.
    pub updated_at: Option<DateTime<Utc>>,
    /// Remaining cooldown seconds per action type at the time of the last
    /// settlement. Response view only.
    #[serde(default)]
    pub action_cooldowns: BTreeMap<ActionType, i64>,
    /// Conditions derived at the last settlement. Response view only.
    #[serde(default)]
    pub status_effects: Vec<StatusEffect>,
    /// Zone of the tile under the agent, when that tile was in view.
    #[serde(default)]
    pub current_zone: Option<Zone>,
}

impl Default for AgentStateAggregate {
    fn default() -> Self {
        Self {
            agent_id: String::new(),
            session_id: String::new(),
            vitals: Vitals {
                hp: 100,
                hunger: 80,
                energy: 60,
            },
            position: Position::default(),
            home: Position::default(),
            inventory: BTreeMap::new(),
            inventory_capacity: 30,
            inventory_used: 0,
            ongoing_action: None,
            dead: false,
            death_cause: None,
            version: 1,
            updated_at: None,
            action_cooldowns: BTreeMap::new(),
            status_effects: Vec::new(),
            current_zone: None,
        }
    }
}

impl AgentStateAggregate {
    /// A fresh living agent at the origin with its default session.
    pub fn fresh(agent_id: &str) -> Self {
        Self {
            agent_id: agent_id.to_owned(),
            session_id: session_id_for(agent_id),
            ..Self::default()
        }
    }

    /// Recompute `inventory_used` from the inventory map.
    pub fn recompute_inventory_used(&mut self) {
        self.inventory_used = self
            .inventory
            .values()
            .filter(|count| **count > 0)
            .fold(0_i32, |acc, count| acc.saturating_add(*count));
    }

    /// Count of `item` held, zero when absent.
    pub fn item_count(&self, item: &str) -> i32 {
        self.inventory.get(item).copied().unwrap_or(0)
    }
}

/// Session identifier for an agent.
pub fn session_id_for(agent_id: &str) -> String {
    format!("session-{agent_id}")
}

// ---------------------------------------------------------------------------
// World snapshot
// ---------------------------------------------------------------------------

/// One visible map tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Tile {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
    /// Terrain.
    pub kind: TileKind,
    /// Gameplay zone.
    pub zone: Zone,
    /// Biome.
    pub biome: Biome,
    /// Whether agents can stand on this tile.
    pub passable: bool,
    /// Gatherable resource on this tile, if any.
    pub resource: Option<String>,
    /// Threat score of this tile; positive means dangerous.
    pub base_threat: i32,
}

impl Tile {
    /// A passable, threat-free grass tile.
    pub const fn grass(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            kind: TileKind::Grass,
            zone: Zone::Safe,
            biome: Biome::Plain,
            passable: true,
            resource: None,
            base_threat: 0,
        }
    }

    /// Position of this tile.
    pub const fn pos(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

/// Read-only per-call view of the world around an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct WorldSnapshot {
    /// Current phase.
    pub time_of_day: TimeOfDay,
    /// Ambient threat level.
    pub threat_level: i32,
    /// Visibility penalty applied at night.
    pub visibility_penalty: i32,
    /// Nearby resource amounts keyed by resource type.
    pub nearby_resource: BTreeMap<String, i32>,
    /// Center of the view.
    pub center: Position,
    /// Square view radius around the center.
    pub view_radius: i32,
    /// Tiles the agent can see.
    pub visible_tiles: Vec<Tile>,
    /// World clock in seconds.
    pub world_time_seconds: i64,
    /// Seconds until the next day/night boundary.
    pub next_phase_in_seconds: i64,
    /// Whether the phase changed since the agent's last settlement.
    pub phase_changed: bool,
    /// Phase before the change.
    pub phase_from: Option<TimeOfDay>,
    /// Phase after the change.
    pub phase_to: Option<TimeOfDay>,
}

impl Default for WorldSnapshot {
    fn default() -> Self {
        Self {
            time_of_day: TimeOfDay::Day,
            threat_level: 1,
            visibility_penalty: 0,
            nearby_resource: BTreeMap::new(),
            center: Position::default(),
            view_radius: 5,
            visible_tiles: Vec::new(),
            world_time_seconds: 0,
            next_phase_in_seconds: 0,
            phase_changed: false,
            phase_from: None,
            phase_to: None,
        }
    }
}

impl WorldSnapshot {
    /// The visible tile at `pos`, if any.
    pub fn tile_at(&self, pos: Position) -> Option<&Tile> {
        self.visible_tiles
            .iter()
            .find(|tile| tile.x == pos.x && tile.y == pos.y)
    }
}

// ---------------------------------------------------------------------------
// Storage records
// ---------------------------------------------------------------------------

/// Outcome of one settled action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ActionResult {
    /// State after the action.
    pub updated_state: AgentStateAggregate,
    /// Events produced by the action.
    pub events: Vec<DomainEvent>,
    /// Outcome class.
    pub result_code: ResultCode,
}

/// Write-once record of a completed action, keyed by agent and idempotency key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ActionExecutionRecord {
    /// Agent that acted.
    pub agent_id: String,
    /// Caller-supplied deduplication token.
    pub idempotency_key: String,
    /// Wire name of the intent type.
    pub intent_type: String,
    /// Settled minutes.
    pub dt_minutes: i32,
    /// The full stored result.
    pub result: ActionResult,
    /// World clock before settlement.
    pub world_time_before_seconds: i64,
    /// World clock after settlement.
    pub world_time_after_seconds: i64,
    /// When the record was written.
    pub applied_at: DateTime<Utc>,
}

/// A placed world object owned by an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct WorldObjectRecord {
    /// Object identifier.
    pub object_id: String,
    /// Owning agent.
    pub owner_agent_id: String,
    /// Category.
    pub kind: ObjectKind,
    /// Build name (`bed_good`, `farm_plot`, ...).
    pub object_type: String,
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
    /// Durability.
    pub hp: i32,
    /// Bed quality, for beds.
    pub quality: Option<BedQuality>,
    /// Storage slots, for boxes.
    pub capacity_slots: i32,
    /// Storage slots in use, for boxes.
    pub used_slots: i32,
    /// Kind-specific state as a JSON document.
    pub object_state: String,
}

impl WorldObjectRecord {
    /// Position of this object.
    pub const fn pos(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

/// Per-agent depletion marker for one gather target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AgentResourceNodeRecord {
    /// Agent that depleted the node.
    pub agent_id: String,
    /// Target id in `res_<x>_<y>_<resource>` form.
    pub target_id: String,
    /// Resource type.
    pub resource_type: String,
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
    /// The node is unavailable until this instant.
    pub depleted_until: DateTime<Utc>,
    /// Last write time.
    pub updated_at: DateTime<Utc>,
}

/// Lifecycle marker for one agent life.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AgentSession {
    /// Session identifier.
    pub id: String,
    /// Agent identifier.
    pub agent_id: String,
    /// State version at which the session became active.
    pub start_tick: i64,
    /// When the session ended.
    pub ended_at: Option<DateTime<Utc>>,
    /// Current status.
    pub status: SessionStatus,
    /// Cause of death once closed.
    pub death_cause: Option<DeathCause>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inventory_used_ignores_non_positive_counts() {
        let mut state = AgentStateAggregate::fresh("a1");
        state.inventory.insert("wood".into(), 3);
        state.inventory.insert("stone".into(), 2);
        state.inventory.insert("berry".into(), 0);
        state.inventory_used = 99;
        state.recompute_inventory_used();
        assert_eq!(state.inventory_used, 5);
    }

    #[test]
    fn fresh_state_uses_session_prefix() {
        let state = AgentStateAggregate::fresh("a1");
        assert_eq!(state.session_id, "session-a1");
        assert_eq!(state.version, 1);
    }

    #[test]
    fn ongoing_action_start_is_end_minus_minutes() {
        let end = DateTime::<Utc>::from_timestamp(3_600, 0).unwrap_or_default();
        let ongoing = OngoingAction {
            action_type: ActionType::Rest,
            minutes: 30,
            end_at: end,
        };
        assert_eq!(ongoing.started_at().timestamp(), 1_800);
    }

    #[test]
    fn distances() {
        let a = Position::new(0, 0);
        let b = Position::new(2, -3);
        assert_eq!(a.manhattan(b), 5);
        assert_eq!(a.chebyshev(b), 3);
    }
}
