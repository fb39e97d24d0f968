//! Tuning constants for the settlement algorithm.
//!
//! Every per-action delta is expressed per standard 30-minute tick and
//! scaled linearly by the settled minutes. [`SettlementConfig`] bundles all
//! of them so callers (the engine, tests) can override defaults, and it
//! deserializes from the `settlement` section of `outlast-config.yaml` with
//! every missing key falling back to its default.

use serde::{Deserialize, Serialize};

/// Hunger and energy deltas of one action per standard tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionCost {
    /// Hunger delta per tick (negative drains).
    #[serde(default)]
    pub hunger: i32,
    /// Energy delta per tick (negative drains).
    #[serde(default)]
    pub energy: i32,
}

impl ActionCost {
    /// Construct a cost.
    pub const fn new(hunger: i32, energy: i32) -> Self {
        Self { hunger, energy }
    }
}

/// An integer ratio, used for multipliers such as the good-bed bonus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ratio {
    /// Numerator.
    pub num: i32,
    /// Denominator. Must be positive.
    pub den: i32,
}

impl Ratio {
    /// The identity ratio.
    pub const ONE: Self = Self { num: 1, den: 1 };
}

/// Tunable parameters of the settlement algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    /// Minutes in one standard tick (default: 30).
    pub standard_tick_minutes: i32,

    /// Hunger drained every tick regardless of action (default: 0).
    pub base_hunger_drain: i32,

    /// Maximum HP lost to hunger and exhaustion per tick (default: 8).
    pub hp_drain_cap: i32,

    /// HP lost per tick per point of negative hunger, in thousandths (default: 40).
    pub hunger_drain_per_mille: i32,

    /// HP lost per tick per point of negative energy, in thousandths (default: 30).
    pub energy_drain_per_mille: i32,

    /// HP at or below which a forced retreat kicks in (default: 20).
    pub critical_hp_threshold: i32,

    /// Energy at or below which an agent counts as exhausted (default: 20).
    pub exhausted_energy_threshold: i32,

    /// HP ceiling for recovery (default: 100).
    pub max_hp: i32,

    /// Hunger ceiling for eating (default: 100).
    pub max_hunger: i32,

    /// Move cost (default: -1 hunger, -2 energy).
    pub move_cost: ActionCost,

    /// Smallest energy a move ever costs (default: 1).
    pub min_move_energy_cost: i32,

    /// Gather cost (default: -2 hunger, -6 energy).
    pub gather_cost: ActionCost,

    /// Craft cost (default: -4 energy). Only the energy half is charged.
    pub craft_cost: ActionCost,

    /// Build cost (default: -6 energy). Only the energy half is charged.
    pub build_cost: ActionCost,

    /// Farm plant cost (default: -1 hunger, -4 energy).
    pub farm_plant_cost: ActionCost,

    /// Farm harvest cost (default: -4 energy). Only the energy half is charged.
    pub farm_harvest_cost: ActionCost,

    /// Container transfer cost (default: free).
    pub container_cost: ActionCost,

    /// Retreat cost (default: 0 hunger, -2 energy).
    pub retreat_cost: ActionCost,

    /// Energy recovered per tick of rest (default: 20).
    pub rest_energy_recovery: i32,

    /// Energy recovered by one sleep in a rough bed (default: 35).
    pub sleep_energy_recovery: i32,

    /// HP recovered by one sleep in a rough bed (default: 6).
    pub sleep_hp_recovery: i32,

    /// Multiplier applied to sleep recovery in a good bed (default: 3/2).
    pub good_bed_ratio: Ratio,

    /// Wheat yielded by one harvest (default: 2).
    pub harvest_wheat_yield: i32,

    /// A harvest returns a seed when the unix second is divisible by this (default: 5).
    pub harvest_seed_modulus: i64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            standard_tick_minutes: 30,
            base_hunger_drain: 0,
            hp_drain_cap: 8,
            hunger_drain_per_mille: 40,
            energy_drain_per_mille: 30,
            critical_hp_threshold: 20,
            exhausted_energy_threshold: 20,
            max_hp: 100,
            max_hunger: 100,
            move_cost: ActionCost::new(-1, -2),
            min_move_energy_cost: 1,
            gather_cost: ActionCost::new(-2, -6),
            craft_cost: ActionCost::new(-1, -4),
            build_cost: ActionCost::new(-1, -6),
            farm_plant_cost: ActionCost::new(-1, -4),
            farm_harvest_cost: ActionCost::new(-1, -4),
            container_cost: ActionCost::new(0, 0),
            retreat_cost: ActionCost::new(0, -2),
            rest_energy_recovery: 20,
            sleep_energy_recovery: 35,
            sleep_hp_recovery: 6,
            good_bed_ratio: Ratio { num: 3, den: 2 },
            harvest_wheat_yield: 2,
            harvest_seed_modulus: 5,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = SettlementConfig::default();
        assert_eq!(cfg.standard_tick_minutes, 30);
        assert_eq!(cfg.hp_drain_cap, 8);
        assert_eq!(cfg.critical_hp_threshold, 20);
        assert_eq!(cfg.gather_cost, ActionCost::new(-2, -6));
        assert_eq!(cfg.good_bed_ratio, Ratio { num: 3, den: 2 });
    }

    #[test]
    fn partial_document_keeps_defaults() {
        let cfg: SettlementConfig =
            serde_json::from_str(r#"{"hp_drain_cap": 10, "move_cost": {"energy": -3}}"#).unwrap();
        assert_eq!(cfg.hp_drain_cap, 10);
        assert_eq!(cfg.move_cost, ActionCost::new(0, -3));
        assert_eq!(cfg.max_hp, 100);
    }
}
