//! The settlement algorithm.
//!
//! [`SettlementService::settle`] applies the elapsed-time effects of one
//! action to a copy of the agent state and classifies the outcome:
//!
//! 1. Baseline hunger drain
//! 2. Action-specific vitals, inventory, and position effects
//! 3. HP drain from negative hunger and energy, jointly capped per tick
//! 4. Version bump and `action_settled` event with an explanation of every delta
//! 5. Classification: `game_over`, critical HP with a forced retreat, or ok
//!
//! HP drain depends only on vitals and elapsed minutes. Time of day, threat
//! level, and visibility never change it.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tracing::debug;

use outlast_types::{
    ActionIntent, ActionType, AgentStateAggregate, BedQuality, DeathCause, DomainEvent, EventType,
    IntentParams, Position, ResultCode, WorldSnapshot,
};

use crate::config::{ActionCost, SettlementConfig};
use crate::error::SettlementError;
use crate::inventory::{self, Inventory};
use crate::production;
use crate::scaling::{apply_dual_cap, drain_potential, round_div, scaled};
use crate::status::enrich_state;
use crate::threat;

/// Output of one settlement.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementResult {
    /// State after the action.
    pub updated_state: AgentStateAggregate,
    /// `action_settled` first, then classification events, then action events.
    pub events: Vec<DomainEvent>,
    /// Outcome class.
    pub result_code: ResultCode,
}

// ---------------------------------------------------------------------------
// Change reasons
// ---------------------------------------------------------------------------

/// Ordered log of `{code, delta}` explanations for one vital.
#[derive(Debug, Default)]
pub(crate) struct Reasons(Vec<(&'static str, i32)>);

impl Reasons {
    /// Record a non-zero delta.
    pub(crate) fn push(&mut self, code: &'static str, delta: i32) {
        if delta != 0 {
            self.0.push((code, delta));
        }
    }

    pub(crate) fn to_json(&self) -> Value {
        Value::Array(
            self.0
                .iter()
                .map(|(code, delta)| json!({"code": code, "delta": delta}))
                .collect(),
        )
    }
}

/// Change explanations for HP, hunger, and energy.
#[derive(Debug, Default)]
pub(crate) struct VitalReasons {
    pub(crate) hp: Reasons,
    pub(crate) hunger: Reasons,
    pub(crate) energy: Reasons,
}

fn add_delta(
    target: &mut i32,
    delta: i32,
    code: &'static str,
    reasons: &mut Reasons,
) -> Result<(), SettlementError> {
    if delta == 0 {
        return Ok(());
    }
    *target = target
        .checked_add(delta)
        .ok_or_else(|| SettlementError::overflow(code))?;
    reasons.push(code, delta);
    Ok(())
}

/// Apply an HP delta capped at `max_hp`, recording the amount actually applied.
pub(crate) fn add_hp_delta(
    hp: &mut i32,
    delta: i32,
    max_hp: i32,
    code: &'static str,
    reasons: &mut Reasons,
) -> Result<(), SettlementError> {
    if delta == 0 {
        return Ok(());
    }
    let before = *hp;
    let mut next = before
        .checked_add(delta)
        .ok_or_else(|| SettlementError::overflow(code))?;
    if next > max_hp {
        next = max_hp;
    }
    *hp = next;
    reasons.push(code, next.saturating_sub(before));
    Ok(())
}

// ---------------------------------------------------------------------------
// Payload views
// ---------------------------------------------------------------------------

/// `{hp, hunger, energy, x, y, pos, inventory_used}` view of a state.
pub(crate) fn state_view(state: &AgentStateAggregate) -> Value {
    json!({
        "hp": state.vitals.hp,
        "hunger": state.vitals.hunger,
        "energy": state.vitals.energy,
        "x": state.position.x,
        "y": state.position.y,
        "pos": {"x": state.position.x, "y": state.position.y},
        "inventory_used": inventory::total_items(&state.inventory),
    })
}

fn pos_json(pos: Position) -> Value {
    json!({"x": pos.x, "y": pos.y})
}

/// Non-empty intent parameters, as recorded in `decision.params`.
pub fn decision_params(params: &IntentParams) -> Value {
    let mut out = serde_json::Map::new();
    if let Some(direction) = params.direction.as_deref().filter(|d| !d.is_empty()) {
        out.insert("direction".into(), json!(direction));
    }
    if let Some(target_id) = params.target_id.as_deref().filter(|t| !t.is_empty()) {
        out.insert("target_id".into(), json!(target_id));
    }
    if let Some(recipe_id) = params.recipe_id.filter(|r| *r > 0) {
        out.insert("recipe_id".into(), json!(recipe_id));
    }
    if let Some(object_type) = params.object_type.as_deref().filter(|o| !o.is_empty()) {
        out.insert("object_type".into(), json!(object_type));
    }
    if let Some(pos) = params.pos {
        out.insert("pos".into(), pos_json(pos));
    }
    if let Some(item_type) = params.item_type.as_deref().filter(|i| !i.is_empty()) {
        out.insert("item_type".into(), json!(item_type));
    }
    if params.count > 0 {
        out.insert("count".into(), json!(params.count));
    }
    if params.rest_minutes > 0 {
        out.insert("rest_minutes".into(), json!(params.rest_minutes));
    }
    if let Some(bed_id) = params.bed_id.as_deref().filter(|b| !b.is_empty()) {
        out.insert("bed_id".into(), json!(bed_id));
    }
    if let Some(quality) = params.bed_quality {
        out.insert("bed_quality".into(), json!(quality.as_str()));
    }
    if let Some(farm_id) = params.farm_id.as_deref().filter(|f| !f.is_empty()) {
        out.insert("farm_id".into(), json!(farm_id));
    }
    if let Some(container_id) = params.container_id.as_deref().filter(|c| !c.is_empty()) {
        out.insert("container_id".into(), json!(container_id));
    }
    if !params.items.is_empty() {
        let items: Vec<Value> = params
            .items
            .iter()
            .map(|i| json!({"item_type": i.item_type, "count": i.count}))
            .collect();
        out.insert("items".into(), Value::Array(items));
    }
    if params.dx != 0 || params.dy != 0 {
        out.insert("dx".into(), json!(params.dx));
        out.insert("dy".into(), json!(params.dy));
    }
    Value::Object(out)
}

/// Everything needed to build an `action_settled` payload.
pub(crate) struct SettledPayload<'a> {
    pub(crate) before: &'a AgentStateAggregate,
    pub(crate) after: &'a AgentStateAggregate,
    pub(crate) intent: ActionType,
    pub(crate) params: Value,
    pub(crate) dt_minutes: i32,
    pub(crate) world_time_before: i64,
    pub(crate) hp_loss: i32,
    pub(crate) reasons: &'a VitalReasons,
}

impl SettledPayload<'_> {
    pub(crate) fn into_event(self, now: DateTime<Utc>) -> DomainEvent {
        let world_time_after = world_time_after(self.world_time_before, self.dt_minutes);
        let (b, a) = (&self.before.vitals, &self.after.vitals);
        DomainEvent::new(
            EventType::ActionSettled,
            now,
            json!({
                "world_time_before_seconds": self.world_time_before,
                "world_time_after_seconds": world_time_after,
                "settled_dt_minutes": self.dt_minutes,
                "state_before": state_view(self.before),
                "decision": {
                    "intent": self.intent.as_str(),
                    "params": self.params,
                    "dt_minutes": self.dt_minutes,
                },
                "state_after": state_view(self.after),
                "result": {
                    "hp_loss": self.hp_loss,
                    "inventory_delta": inventory::inventory_delta(
                        &self.before.inventory,
                        &self.after.inventory,
                    ),
                    "vitals_delta": {
                        "hp": a.hp.saturating_sub(b.hp),
                        "hunger": a.hunger.saturating_sub(b.hunger),
                        "energy": a.energy.saturating_sub(b.energy),
                    },
                    "vitals_change_reasons": {
                        "hp": self.reasons.hp.to_json(),
                        "hunger": self.reasons.hunger.to_json(),
                        "energy": self.reasons.energy.to_json(),
                    },
                },
            }),
        )
    }
}

/// World clock after settling `dt_minutes` from `before`.
pub fn world_time_after(before: i64, dt_minutes: i32) -> i64 {
    before.saturating_add(i64::from(dt_minutes).saturating_mul(60))
}

/// `{total_items, top[]}` summary, largest stacks first.
fn inventory_summary(inventory: &Inventory) -> Value {
    let mut stacks: Vec<(&String, i32)> = inventory
        .iter()
        .filter(|(_, qty)| **qty > 0)
        .map(|(item, qty)| (item, *qty))
        .collect();
    stacks.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    let top: Vec<Value> = stacks
        .iter()
        .take(5)
        .map(|(item, qty)| json!({"item_type": item, "count": qty}))
        .collect();
    json!({"total_items": inventory::total_items(inventory), "top": top})
}

fn last_action_view(state: &AgentStateAggregate, world_time: i64) -> Value {
    json!({
        "hp": state.vitals.hp,
        "hunger": state.vitals.hunger,
        "energy": state.vitals.energy,
        "position": pos_json(state.position),
        "inventory_used": inventory::total_items(&state.inventory),
        "world_time_seconds": world_time,
        "inventory_summary": inventory_summary(&state.inventory),
    })
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Deterministic settlement of elapsed time against agent state.
#[derive(Debug, Clone, Default)]
pub struct SettlementService {
    config: SettlementConfig,
}

/// Mutable working set of one settlement.
struct Working<'a> {
    cfg: &'a SettlementConfig,
    dt: i32,
    next: AgentStateAggregate,
    reasons: VitalReasons,
    action_events: Vec<DomainEvent>,
}

impl Working<'_> {
    fn scaled(&self, per_tick: i32) -> Result<i32, SettlementError> {
        scaled(per_tick, self.dt, self.cfg.standard_tick_minutes)
    }

    fn apply_cost(&mut self, cost: ActionCost, code: &'static str) -> Result<(), SettlementError> {
        let energy = self.scaled(cost.energy)?;
        let hunger = self.scaled(cost.hunger)?;
        add_delta(&mut self.next.vitals.energy, energy, code, &mut self.reasons.energy)?;
        add_delta(&mut self.next.vitals.hunger, hunger, code, &mut self.reasons.hunger)
    }

    /// Charge only the energy half of `cost`. Work at a bench or plot
    /// leaves hunger to the base drain.
    fn apply_energy_cost(
        &mut self,
        cost: ActionCost,
        code: &'static str,
    ) -> Result<(), SettlementError> {
        let energy = self.scaled(cost.energy)?;
        add_delta(&mut self.next.vitals.energy, energy, code, &mut self.reasons.energy)
    }

    fn scaled_ratio(&self, per_tick: i32, quality: BedQuality) -> Result<i32, SettlementError> {
        let ratio = match quality {
            BedQuality::Good => self.cfg.good_bed_ratio,
            BedQuality::Rough => crate::config::Ratio::ONE,
        };
        let num = i64::from(per_tick)
            .checked_mul(i64::from(ratio.num))
            .and_then(|v| v.checked_mul(i64::from(self.dt)))
            .ok_or_else(|| SettlementError::overflow("sleep numerator"))?;
        let den = i64::from(ratio.den)
            .checked_mul(i64::from(self.cfg.standard_tick_minutes))
            .ok_or_else(|| SettlementError::overflow("sleep denominator"))?;
        let value = round_div(num, den).ok_or_else(|| SettlementError::overflow("sleep"))?;
        i32::try_from(value).map_err(|_err| SettlementError::overflow("sleep result"))
    }
}

impl SettlementService {
    /// Create a service with the given tuning.
    pub const fn new(config: SettlementConfig) -> Self {
        Self { config }
    }

    /// The tuning in use.
    pub const fn config(&self) -> &SettlementConfig {
        &self.config
    }

    /// Settle `dt_minutes` of `intent` against `state`.
    ///
    /// `state` is never modified; the result carries an updated copy with
    /// its version incremented by one.
    pub fn settle(
        &self,
        state: &AgentStateAggregate,
        intent: &ActionIntent,
        dt_minutes: i32,
        now: DateTime<Utc>,
        snapshot: &WorldSnapshot,
    ) -> Result<SettlementResult, SettlementError> {
        if dt_minutes <= 0 {
            return Err(SettlementError::InvalidDelta {
                minutes: dt_minutes,
            });
        }
        let cfg = &self.config;
        let mut w = Working {
            cfg,
            dt: dt_minutes,
            next: state.clone(),
            reasons: VitalReasons::default(),
            action_events: Vec::new(),
        };
        w.next.updated_at = Some(now);

        let base_drain = w.scaled(cfg.base_hunger_drain)?;
        add_delta(
            &mut w.next.vitals.hunger,
            base_drain.saturating_neg(),
            "BASE_HUNGER_DRAIN",
            &mut w.reasons.hunger,
        )?;

        apply_action(&mut w, intent, now, snapshot)?;

        // HP drain, hunger first then exhaustion within one shared cap.
        let tick = cfg.standard_tick_minutes;
        let hunger_potential =
            drain_potential(w.next.vitals.hunger, cfg.hunger_drain_per_mille, w.dt, tick)?;
        let energy_potential =
            drain_potential(w.next.vitals.energy, cfg.energy_drain_per_mille, w.dt, tick)?;
        let cap = w.scaled(cfg.hp_drain_cap)?;
        let (hunger_applied, energy_applied) =
            apply_dual_cap(hunger_potential, energy_potential, cap);
        let hp_loss = hunger_applied.saturating_add(energy_applied);
        w.reasons
            .hp
            .push("STARVING_HP_DRAIN", hunger_applied.saturating_neg());
        w.reasons
            .hp
            .push("EXHAUSTED_HP_DRAIN", energy_applied.saturating_neg());
        add_hp_delta(
            &mut w.next.vitals.hp,
            hp_loss.saturating_neg(),
            cfg.max_hp,
            "HP_LOSS_APPLIED",
            &mut w.reasons.hp,
        )?;

        w.next.version = w
            .next
            .version
            .checked_add(1)
            .ok_or_else(|| SettlementError::overflow("version"))?;
        w.next.recompute_inventory_used();

        let world_time_before = snapshot.world_time_seconds;
        let settled = SettledPayload {
            before: state,
            after: &w.next,
            intent: intent.action_type,
            params: decision_params(&intent.params),
            dt_minutes,
            world_time_before,
            hp_loss,
            reasons: &w.reasons,
        }
        .into_event(now);

        let mut events = vec![settled];
        let result_code = self.classify(
            state,
            &mut w.next,
            snapshot,
            world_time_before,
            world_time_after(world_time_before, dt_minutes),
            now,
            &mut events,
        );
        events.append(&mut w.action_events);
        enrich_state(&mut w.next, cfg, snapshot);

        debug!(
            agent_id = %state.agent_id,
            intent = %intent.action_type,
            dt_minutes,
            hp_loss,
            result_code = %result_code,
            "settlement computed"
        );

        Ok(SettlementResult {
            updated_state: w.next,
            events,
            result_code,
        })
    }

    /// Append classification events and return the result code.
    #[allow(clippy::too_many_arguments)]
    fn classify(
        &self,
        before: &AgentStateAggregate,
        next: &mut AgentStateAggregate,
        snapshot: &WorldSnapshot,
        world_time_before: i64,
        world_time_after: i64,
        now: DateTime<Utc>,
        events: &mut Vec<DomainEvent>,
    ) -> ResultCode {
        if next.vitals.hp <= 0 {
            let cause = derive_death_cause(next);
            next.dead = true;
            next.death_cause = Some(cause);
            events.push(DomainEvent::new(
                EventType::GameOver,
                now,
                json!({
                    "death_cause": cause.event_label(),
                    "state_before_last_action": last_action_view(before, world_time_before),
                    "state_after_last_action": last_action_view(next, world_time_after),
                    "last_safe_home": pos_json(next.home),
                    "last_known_threat": Value::Null,
                }),
            ));
            return ResultCode::GameOver;
        }

        if next.vitals.hp <= self.config.critical_hp_threshold {
            let from = next.position;
            let (to, reason) =
                match threat::highest_threat_tile(from, &snapshot.visible_tiles) {
                    Some(tile) => {
                        let step =
                            threat::best_retreat_step(from, tile.pos(), &snapshot.visible_tiles);
                        let to = step.map_or(from, |(dx, dy)| from.offset(dx, dy));
                        (to, "threat")
                    }
                    None => (threat::step_toward(from, next.home), "home"),
                };
            next.position = to;
            events.push(DomainEvent::new(
                EventType::CriticalHp,
                now,
                json!({"hp": next.vitals.hp}),
            ));
            events.push(DomainEvent::new(
                EventType::ForceRetreat,
                now,
                json!({"from": pos_json(from), "to": pos_json(to), "reason": reason}),
            ));
        }
        ResultCode::Ok
    }
}

/// Starvation when hunger is negative, else exhaustion when energy is, else unknown.
pub const fn derive_death_cause(state: &AgentStateAggregate) -> DeathCause {
    if state.vitals.hunger < 0 {
        DeathCause::Starvation
    } else if state.vitals.energy < 0 {
        DeathCause::Exhaustion
    } else {
        DeathCause::Unknown
    }
}

const fn unit_step(v: i32) -> i32 {
    if v > 0 {
        1
    } else if v < 0 {
        -1
    } else {
        0
    }
}

#[allow(clippy::too_many_lines)]
fn apply_action(
    w: &mut Working<'_>,
    intent: &ActionIntent,
    now: DateTime<Utc>,
    snapshot: &WorldSnapshot,
) -> Result<(), SettlementError> {
    let cfg = w.cfg;
    let params = &intent.params;
    match intent.action_type {
        ActionType::Gather => {
            w.apply_cost(cfg.gather_cost, "ACTION_GATHER_COST")?;
            // Snapshot resources are applied as handed in; the engine narrows
            // them to the gather target before calling.
            let gains: Vec<(String, i32)> = snapshot
                .nearby_resource
                .iter()
                .filter(|(_, qty)| **qty > 0)
                .map(|(item, qty)| {
                    let inv = &w.next.inventory;
                    let mult = production::gather_multiplier(item, |tool| {
                        inventory::count_of(inv, tool) > 0
                    });
                    (item.clone(), qty.saturating_mul(mult))
                })
                .collect();
            for (item, qty) in gains {
                inventory::add_item(&mut w.next.inventory, &item, qty)?;
            }
        }
        ActionType::Rest => {
            let energy = w.scaled(cfg.rest_energy_recovery)?;
            add_delta(
                &mut w.next.vitals.energy,
                energy,
                "ACTION_REST_RECOVERY",
                &mut w.reasons.energy,
            )?;
        }
        ActionType::Sleep => {
            let quality = params.bed_quality.unwrap_or_default();
            let energy = w.scaled_ratio(cfg.sleep_energy_recovery, quality)?;
            let hp = w.scaled_ratio(cfg.sleep_hp_recovery, quality)?;
            add_delta(
                &mut w.next.vitals.energy,
                energy,
                "ACTION_SLEEP_RECOVERY",
                &mut w.reasons.energy,
            )?;
            add_hp_delta(
                &mut w.next.vitals.hp,
                hp,
                cfg.max_hp,
                "ACTION_SLEEP_RECOVERY",
                &mut w.reasons.hp,
            )?;
        }
        ActionType::Move => {
            let energy_cost = w
                .scaled(cfg.move_cost.energy.saturating_neg())?
                .max(cfg.min_move_energy_cost);
            let hunger = w.scaled(cfg.move_cost.hunger)?;
            add_delta(
                &mut w.next.vitals.energy,
                energy_cost.saturating_neg(),
                "ACTION_MOVE_COST",
                &mut w.reasons.energy,
            )?;
            add_delta(
                &mut w.next.vitals.hunger,
                hunger,
                "ACTION_MOVE_COST",
                &mut w.reasons.hunger,
            )?;
            w.next.position = w.next.position.offset(params.dx, params.dy);
        }
        ActionType::Build => {
            w.apply_energy_cost(cfg.build_cost, "ACTION_BUILD_COST")?;
            let def = params.object_type.as_deref().and_then(production::build_def);
            if let Some(def) = def
                && inventory::consume_all(&mut w.next.inventory, def.cost)
            {
                let at = params.pos.unwrap_or(w.next.position);
                w.action_events.push(DomainEvent::new(
                    EventType::BuildCompleted,
                    now,
                    json!({
                        "kind": def.kind.as_str(),
                        "object_type": def.object_type,
                        "x": at.x,
                        "y": at.y,
                        "hp": 100,
                    }),
                ));
            }
        }
        ActionType::FarmPlant => {
            w.apply_cost(cfg.farm_plant_cost, "ACTION_FARM_COST")?;
            inventory::consume_item(&mut w.next.inventory, "seed", 1);
        }
        ActionType::FarmHarvest => {
            w.apply_energy_cost(cfg.farm_harvest_cost, "ACTION_FARM_HARVEST_COST")?;
            inventory::add_item(&mut w.next.inventory, "wheat", cfg.harvest_wheat_yield)?;
            if cfg.harvest_seed_modulus > 0
                && now.timestamp().rem_euclid(cfg.harvest_seed_modulus) == 0
            {
                inventory::add_item(&mut w.next.inventory, "seed", 1)?;
            }
        }
        ActionType::ContainerDeposit | ActionType::ContainerWithdraw => {
            w.apply_cost(cfg.container_cost, "ACTION_CONTAINER_COST")?;
            for item in params.items.iter().filter(|i| i.count > 0) {
                if intent.action_type == ActionType::ContainerDeposit {
                    inventory::consume_item(&mut w.next.inventory, &item.item_type, item.count);
                } else {
                    inventory::add_item(&mut w.next.inventory, &item.item_type, item.count)?;
                }
            }
        }
        ActionType::Retreat => {
            w.apply_cost(cfg.retreat_cost, "ACTION_RETREAT_COST")?;
            w.next.position = w
                .next
                .position
                .offset(unit_step(params.dx), unit_step(params.dy));
        }
        ActionType::Craft => {
            w.apply_energy_cost(cfg.craft_cost, "ACTION_CRAFT_COST")?;
            if let Some(recipe) = params.recipe_id.and_then(production::recipe)
                && inventory::consume_all(&mut w.next.inventory, recipe.inputs)
            {
                for (item, qty) in recipe.outputs {
                    inventory::add_item(&mut w.next.inventory, item, *qty)?;
                }
            }
        }
        ActionType::Eat => {
            let before = w.next.vitals.hunger;
            let item = params.item_type.as_deref().unwrap_or("berry");
            if let Some(recovery) = production::food_recovery(item) {
                for _ in 0..params.count.max(1) {
                    if !inventory::consume_item(&mut w.next.inventory, item, 1) {
                        break;
                    }
                    let hunger = w.next.vitals.hunger.saturating_add(recovery);
                    w.next.vitals.hunger = hunger.min(cfg.max_hunger);
                }
            }
            w.reasons.hunger.push(
                "ACTION_EAT_RECOVERY",
                w.next.vitals.hunger.saturating_sub(before),
            );
        }
        ActionType::Terminate => {}
    }
    Ok(())
}
