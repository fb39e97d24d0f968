//! Pure survival domain for the Outlast action engine.
//!
//! This crate contains the settlement logic -- everything that operates on
//! agent state without touching I/O. It sits between `outlast-types` (which
//! defines the data structures) and `outlast-core` (which handles
//! transactions, persistence, and orchestration).
//!
//! # Modules
//!
//! - [`config`] -- Tunable settlement constants ([`SettlementConfig`])
//! - [`error`] -- Error types for settlement ([`SettlementError`])
//! - [`inventory`] -- Item-count map operations with checked arithmetic
//! - [`production`] -- Recipes, build definitions, foods, and tool bonuses
//! - [`scaling`] -- Exact per-tick scaling with half-away-from-zero rounding
//! - [`settlement`] -- The settlement algorithm ([`SettlementService`])
//! - [`sleep`] -- Instant sleep settlement
//! - [`status`] -- Status effects and current zone of a settled state
//! - [`threat`] -- Threat geometry for retreats

pub mod config;
pub mod error;
pub mod inventory;
pub mod production;
pub mod scaling;
pub mod settlement;
pub mod sleep;
pub mod status;
pub mod threat;

// Re-export primary types at crate root for convenience.
pub use config::{ActionCost, Ratio, SettlementConfig};
pub use error::SettlementError;
pub use production::{BuildDef, Recipe, build_def, food_recovery, recipe};
pub use settlement::{
    SettlementResult, SettlementService, decision_params, derive_death_cause, world_time_after,
};
pub use sleep::settle_instant_sleep;
pub use status::{enrich_state, status_effects};
