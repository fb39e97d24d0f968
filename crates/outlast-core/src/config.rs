//! Configuration loading and typed config structures for the action engine.
//!
//! The canonical configuration lives in `outlast-config.yaml` at the project
//! root. Every section and field is optional; missing values fall back to the
//! tuning constants the game was balanced against.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use outlast_agents::SettlementConfig;
use outlast_types::ActionType;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine configuration.
///
/// Mirrors the structure of `outlast-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Settlement tuning (per-tick deltas, caps, thresholds).
    #[serde(default)]
    pub settlement: SettlementConfig,

    /// Cooldown and respawn windows.
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Pipeline windows and limits.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Infrastructure connection strings.
    #[serde(default)]
    pub infrastructure: InfrastructureConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Agents seeded on startup.
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

impl EngineConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `DATABASE_URL` overrides `infrastructure.postgres_url` when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.infrastructure.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.infrastructure.apply_env_overrides();
        Ok(config)
    }
}

/// Cooldown and resource respawn windows.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PolicyConfig {
    /// Minimum seconds between two settlements of the same action type.
    /// Types without an entry have no cooldown.
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: BTreeMap<ActionType, i64>,

    /// Minutes until a depleted resource node respawns, by resource.
    #[serde(default = "default_respawn_minutes")]
    pub respawn_minutes: BTreeMap<String, i64>,

    /// Respawn minutes for resources without an entry.
    #[serde(default = "default_respawn_fallback")]
    pub default_respawn_minutes: i64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            cooldown_seconds: default_cooldown_seconds(),
            respawn_minutes: default_respawn_minutes(),
            default_respawn_minutes: default_respawn_fallback(),
        }
    }
}

/// Windows and limits used by the pipeline stages.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PipelineConfig {
    /// Number of recent events loaded for cooldown and heartbeat checks.
    #[serde(default = "default_recent_event_window")]
    pub recent_event_window: usize,

    /// Number of recent events scanned for the seed pity streak.
    #[serde(default = "default_seed_pity_window")]
    pub seed_pity_window: usize,

    /// A seed is granted on this many consecutive seedless gathers.
    #[serde(default = "default_seed_pity_max_fails")]
    pub seed_pity_max_fails: i64,

    /// Settled minutes when no previous settlement is on record.
    #[serde(default = "default_heartbeat_minutes")]
    pub default_heartbeat_minutes: i32,

    /// Lower clamp for settled minutes.
    #[serde(default = "default_min_heartbeat_minutes")]
    pub min_heartbeat_minutes: i32,

    /// Upper clamp for settled minutes.
    #[serde(default = "default_max_heartbeat_minutes")]
    pub max_heartbeat_minutes: i32,

    /// View radius used when the snapshot does not carry one.
    #[serde(default = "default_view_radius")]
    pub default_view_radius: i32,

    /// Manhattan distance within which gather targets are visible at night.
    #[serde(default = "default_night_vision_radius")]
    pub night_vision_radius: i32,

    /// Minutes from planting until a farm plot is ready.
    #[serde(default = "default_farm_grow_minutes")]
    pub farm_grow_minutes: i64,

    /// Inventory capacity used when the stored state carries none.
    #[serde(default = "default_inventory_capacity")]
    pub default_inventory_capacity: i32,

    /// Capacity slots of a newly built box.
    #[serde(default = "default_box_capacity_slots")]
    pub box_capacity_slots: i32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            recent_event_window: default_recent_event_window(),
            seed_pity_window: default_seed_pity_window(),
            seed_pity_max_fails: default_seed_pity_max_fails(),
            default_heartbeat_minutes: default_heartbeat_minutes(),
            min_heartbeat_minutes: default_min_heartbeat_minutes(),
            max_heartbeat_minutes: default_max_heartbeat_minutes(),
            default_view_radius: default_view_radius(),
            night_vision_radius: default_night_vision_radius(),
            farm_grow_minutes: default_farm_grow_minutes(),
            default_inventory_capacity: default_inventory_capacity(),
            box_capacity_slots: default_box_capacity_slots(),
        }
    }
}

/// Infrastructure connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InfrastructureConfig {
    /// `PostgreSQL` connection string. Empty selects the in-memory store.
    #[serde(default)]
    pub postgres_url: String,

    /// Maximum pooled `PostgreSQL` connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl InfrastructureConfig {
    /// Override the database URL with `DATABASE_URL` when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DATABASE_URL") {
            self.postgres_url = val;
        }
    }
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            postgres_url: String::new(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive (trace, debug, info, warn, error).
    /// `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: `pretty` or `json`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Agents created with a fresh state when the engine starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BootstrapConfig {
    /// Agent ids to seed. Existing agents are left untouched.
    #[serde(default)]
    pub agents: Vec<String>,
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_cooldown_seconds() -> BTreeMap<ActionType, i64> {
    BTreeMap::from([
        (ActionType::Build, 300),
        (ActionType::Craft, 300),
        (ActionType::FarmPlant, 180),
        (ActionType::Move, 60),
        (ActionType::Sleep, 300),
    ])
}

fn default_respawn_minutes() -> BTreeMap<String, i64> {
    [("wood", 60), ("stone", 60), ("berry", 30), ("seed", 30)]
        .into_iter()
        .map(|(resource, minutes)| (resource.to_owned(), minutes))
        .collect()
}

const fn default_respawn_fallback() -> i64 {
    60
}

const fn default_recent_event_window() -> usize {
    50
}

const fn default_seed_pity_window() -> usize {
    100
}

const fn default_seed_pity_max_fails() -> i64 {
    8
}

const fn default_heartbeat_minutes() -> i32 {
    30
}

const fn default_min_heartbeat_minutes() -> i32 {
    1
}

const fn default_max_heartbeat_minutes() -> i32 {
    120
}

const fn default_view_radius() -> i32 {
    5
}

const fn default_night_vision_radius() -> i32 {
    3
}

const fn default_farm_grow_minutes() -> i64 {
    60
}

const fn default_inventory_capacity() -> i32 {
    30
}

const fn default_box_capacity_slots() -> i32 {
    60
}

const fn default_max_connections() -> u32 {
    5
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_log_format() -> String {
    "pretty".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert_eq!(config.settlement.standard_tick_minutes, 30);
        assert_eq!(config.policy.cooldown_seconds.get(&ActionType::Move), Some(&60));
        assert_eq!(config.policy.cooldown_seconds.get(&ActionType::Gather), None);
        assert_eq!(config.policy.respawn_minutes.get("berry"), Some(&30));
        assert_eq!(config.pipeline.recent_event_window, 50);
        assert_eq!(config.pipeline.seed_pity_max_fails, 8);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn parse_minimal_yaml() {
        let yaml = "pipeline:\n  night_vision_radius: 2\nbootstrap:\n  agents: [a1]\n";
        let config = EngineConfig::parse(yaml).unwrap();

        assert_eq!(config.pipeline.night_vision_radius, 2);
        assert_eq!(config.bootstrap.agents, vec!["a1".to_owned()]);
        // Everything else uses defaults
        assert_eq!(config.pipeline.max_heartbeat_minutes, 120);
        assert_eq!(config.settlement.hp_drain_cap, 8);
    }

    #[test]
    fn parse_cooldown_table_by_action_name() {
        let yaml = "policy:\n  cooldown_seconds:\n    move: 5\n    gather: 10\n";
        let config = EngineConfig::parse(yaml).unwrap();
        assert_eq!(config.policy.cooldown_seconds.len(), 2);
        assert_eq!(config.policy.cooldown_seconds.get(&ActionType::Gather), Some(&10));
        assert_eq!(config.policy.default_respawn_minutes, 60);
    }

    #[test]
    fn parse_settlement_overrides() {
        let yaml = "settlement:\n  critical_hp_threshold: 25\n  gather_cost:\n    hunger: -3\n    energy: -5\n";
        let config = EngineConfig::parse(yaml).unwrap();
        assert_eq!(config.settlement.critical_hp_threshold, 25);
        assert_eq!(config.settlement.gather_cost.hunger, -3);
        assert_eq!(config.settlement.max_hp, 100);
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("outlast-config.yaml");
        if path.exists() {
            let config = EngineConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
