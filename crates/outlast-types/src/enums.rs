//! Enumeration types for the Outlast action engine.
//!
//! Every enum here crosses a persistence or wire boundary, so each one
//! serializes to a stable `snake_case` (or `SCREAMING_SNAKE_CASE`) string and
//! exposes a matching `as_str` for SQL columns and event payloads.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Error returned when a string does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    /// Which enum was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Every action an agent may request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ActionType {
    /// Collect a visible resource node.
    Gather,
    /// Start an interruptible rest that spans several requests.
    Rest,
    /// Sleep in an owned bed (settled instantly).
    Sleep,
    /// Step to an adjacent tile or walk to a reachable position.
    Move,
    /// Place a world object, consuming materials.
    Build,
    /// Plant a seed in an owned farm plot.
    FarmPlant,
    /// Harvest a ready farm plot.
    FarmHarvest,
    /// Move items from the agent inventory into an owned box.
    ContainerDeposit,
    /// Move items from an owned box into the agent inventory.
    ContainerWithdraw,
    /// Step away from the most dangerous visible tile.
    Retreat,
    /// Turn inputs into outputs using a recipe.
    Craft,
    /// Consume food to recover hunger.
    Eat,
    /// Explicitly end the current ongoing action.
    Terminate,
}

impl ActionType {
    /// All action types in registry order.
    pub const ALL: [Self; 13] = [
        Self::Gather,
        Self::Rest,
        Self::Sleep,
        Self::Move,
        Self::Build,
        Self::FarmPlant,
        Self::FarmHarvest,
        Self::ContainerDeposit,
        Self::ContainerWithdraw,
        Self::Retreat,
        Self::Craft,
        Self::Eat,
        Self::Terminate,
    ];

    /// The wire name of this action type.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gather => "gather",
            Self::Rest => "rest",
            Self::Sleep => "sleep",
            Self::Move => "move",
            Self::Build => "build",
            Self::FarmPlant => "farm_plant",
            Self::FarmHarvest => "farm_harvest",
            Self::ContainerDeposit => "container_deposit",
            Self::ContainerWithdraw => "container_withdraw",
            Self::Retreat => "retreat",
            Self::Craft => "craft",
            Self::Eat => "eat",
            Self::Terminate => "terminate",
        }
    }

    /// Whether an ongoing action of this type may be cut short by `terminate`.
    pub const fn is_interruptible(self) -> bool {
        matches!(self, Self::Rest)
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("action type", s))
    }
}

/// Outcome class of a completed action.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ResultCode {
    /// The agent is alive after the action.
    #[default]
    Ok,
    /// The action killed the agent.
    GameOver,
}

impl ResultCode {
    /// The wire name of this result code.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::GameOver => "game_over",
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResultCode {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(Self::Ok),
            "game_over" => Ok(Self::GameOver),
            other => Err(ParseEnumError::new("result code", other)),
        }
    }
}

/// Why an agent died.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum DeathCause {
    /// No specific cause could be derived.
    #[default]
    Unknown,
    /// Hunger went negative and drained HP to zero.
    Starvation,
    /// Energy went negative and drained HP to zero.
    Exhaustion,
    /// Killed by a hostile presence.
    Threat,
}

impl DeathCause {
    /// Storage name of this cause.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Starvation => "starvation",
            Self::Exhaustion => "exhaustion",
            Self::Threat => "threat",
        }
    }

    /// Upper-case label used inside `game_over` event payloads.
    pub const fn event_label(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Starvation => "STARVATION",
            Self::Exhaustion => "EXHAUSTION",
            Self::Threat => "THREAT",
        }
    }
}

impl FromStr for DeathCause {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" | "" => Ok(Self::Unknown),
            "starvation" => Ok(Self::Starvation),
            "exhaustion" => Ok(Self::Exhaustion),
            "threat" => Ok(Self::Threat),
            other => Err(ParseEnumError::new("death cause", other)),
        }
    }
}

/// Condition derived from an agent's vitals and surroundings.
///
/// Recomputed on every settled state and never stored on its own.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum StatusEffect {
    /// Hunger is at or below zero.
    Starving,
    /// Energy is at or below the exhaustion threshold.
    Exhausted,
    /// HP is at or below the critical threshold.
    Critical,
    /// It is night.
    InDark,
}

impl StatusEffect {
    /// Wire label of this effect.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Starving => "STARVING",
            Self::Exhausted => "EXHAUSTED",
            Self::Critical => "CRITICAL",
            Self::InDark => "IN_DARK",
        }
    }
}

impl fmt::Display for StatusEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Type tag of a [`DomainEvent`](crate::events::DomainEvent).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum EventType {
    /// Elapsed time was settled against the agent state.
    ActionSettled,
    /// The agent died.
    GameOver,
    /// HP fell to or below the critical threshold.
    CriticalHp,
    /// An automatic one-tile retreat was applied.
    ForceRetreat,
    /// A world object was built.
    BuildCompleted,
    /// The world crossed a day/night boundary during the settled window.
    WorldPhaseChanged,
    /// A guaranteed seed was granted after a streak of seedless gathers.
    SeedPityTriggered,
    /// An interruptible rest began.
    RestStarted,
    /// An ongoing action was finalized.
    OngoingActionEnded,
}

impl EventType {
    /// All event types.
    pub const ALL: [Self; 9] = [
        Self::ActionSettled,
        Self::GameOver,
        Self::CriticalHp,
        Self::ForceRetreat,
        Self::BuildCompleted,
        Self::WorldPhaseChanged,
        Self::SeedPityTriggered,
        Self::RestStarted,
        Self::OngoingActionEnded,
    ];

    /// The wire name of this event type.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ActionSettled => "action_settled",
            Self::GameOver => "game_over",
            Self::CriticalHp => "critical_hp",
            Self::ForceRetreat => "force_retreat",
            Self::BuildCompleted => "build_completed",
            Self::WorldPhaseChanged => "world_phase_changed",
            Self::SeedPityTriggered => "seed_pity_triggered",
            Self::RestStarted => "rest_started",
            Self::OngoingActionEnded => "ongoing_action_ended",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("event type", s))
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// Day/night phase reported by the world provider.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum TimeOfDay {
    /// Full visibility.
    #[default]
    Day,
    /// Reduced visibility; gather targets must be close.
    Night,
}

impl TimeOfDay {
    /// The wire name of this phase.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Night => "night",
        }
    }
}

/// Terrain of a tile.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum TileKind {
    /// Open ground.
    #[default]
    Grass,
    /// Wooded tile, usually carrying wood.
    Tree,
    /// Rocky tile, usually carrying stone.
    Rock,
    /// Bare soil.
    Dirt,
    /// Impassable water.
    Water,
}

/// Gameplay zone of a tile.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Zone {
    /// Home area with no threats.
    #[default]
    Safe,
    /// Woodland.
    Forest,
    /// Stone quarry.
    Quarry,
    /// Dangerous outskirts.
    Wild,
}

/// Biome of a tile.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Biome {
    /// Flat grassland.
    #[default]
    Plain,
    /// Dense trees.
    Forest,
    /// High rocky ground.
    Mountain,
    /// Barren land.
    Wasteland,
}

// ---------------------------------------------------------------------------
// World objects
// ---------------------------------------------------------------------------

/// Category of a placed world object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ObjectKind {
    /// Somewhere to sleep.
    Bed,
    /// Item storage.
    Box,
    /// Plot for growing wheat.
    Farm,
    /// Light source.
    Torch,
    /// Stone barrier.
    Wall,
    /// Wooden door.
    Door,
    /// Smelter.
    Furnace,
}

impl ObjectKind {
    /// Storage name of this kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bed => "bed",
            Self::Box => "box",
            Self::Farm => "farm",
            Self::Torch => "torch",
            Self::Wall => "wall",
            Self::Door => "door",
            Self::Furnace => "furnace",
        }
    }
}

impl FromStr for ObjectKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bed" => Ok(Self::Bed),
            "box" => Ok(Self::Box),
            "farm" => Ok(Self::Farm),
            "torch" => Ok(Self::Torch),
            "wall" => Ok(Self::Wall),
            "door" => Ok(Self::Door),
            "furnace" => Ok(Self::Furnace),
            other => Err(ParseEnumError::new("object kind", other)),
        }
    }
}

/// Quality of a bed, which scales sleep recovery.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum BedQuality {
    /// Base recovery.
    #[default]
    Rough,
    /// Recovery multiplied by 3/2.
    Good,
}

impl BedQuality {
    /// Storage name of this quality.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rough => "ROUGH",
            Self::Good => "GOOD",
        }
    }
}

impl FromStr for BedQuality {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ROUGH" | "" => Ok(Self::Rough),
            "GOOD" => Ok(Self::Good),
            _ => Err(ParseEnumError::new("bed quality", s)),
        }
    }
}

/// Lifecycle status of an agent session.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum SessionStatus {
    /// The agent is playing.
    #[default]
    Alive,
    /// The session ended with the agent's death.
    Dead,
}

impl SessionStatus {
    /// Storage name of this status.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Alive => "alive",
            Self::Dead => "dead",
        }
    }
}

impl FromStr for SessionStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "alive" => Ok(Self::Alive),
            "dead" => Ok(Self::Dead),
            other => Err(ParseEnumError::new("session status", other)),
        }
    }
}
