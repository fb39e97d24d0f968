//! Shared precheck and settle-and-plan steps.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tracing::debug;

use outlast_agents::{SettlementResult, inventory, settle_instant_sleep, world_time_after};
use outlast_types::{
    ActionResponse, ActionType, DomainEvent, EventType, ResultCode, UnitOfWork, WorldSnapshot,
};

use crate::config::PipelineConfig;
use crate::context::{ActionContext, ExecuteMode, Services};
use crate::cooldown;
use crate::depletion::ResourceTarget;
use crate::error::ActionError;
use crate::objects::ObjectState;
use crate::response::settlement_summary;
use crate::retreat::attach_last_known_threat;

/// Which optional steps a handler wants from [`settle_and_plan`].
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SettleOptions {
    /// Settle only the targeted resource instead of everything nearby.
    pub(crate) narrow_gather: bool,
    /// Grant a seed after a long seedless gather streak.
    pub(crate) seed_pity: bool,
    /// Record depletion of the gather target.
    pub(crate) gather_depletion: bool,
    /// Mutate the prepared object.
    pub(crate) object_action: bool,
    /// Create objects for `build_completed` events.
    pub(crate) create_built: bool,
}

impl SettleOptions {
    /// Object mutation and build creation only.
    pub(crate) const OBJECTS: Self = Self {
        narrow_gather: false,
        seed_pity: false,
        gather_depletion: false,
        object_action: true,
        create_built: true,
    };
}

/// Dead-agent check, session bootstrap, then cooldown.
pub(crate) async fn standard_precheck(
    svc: &Services<'_>,
    uow: &mut dyn UnitOfWork,
    ac: &mut ActionContext,
) -> Result<(), ActionError> {
    if ac.view.state_working.dead {
        return Err(ActionError::precondition("agent_dead"));
    }
    uow.sessions()
        .ensure_active(
            &ac.input.session_id,
            &ac.input.agent_id,
            ac.view.state_working.version,
        )
        .await?;

    let intent_type = ac.scratch.intent.action_type;
    if let Some(remaining_seconds) = cooldown::remaining_for_action(
        &ac.view.events_before,
        intent_type,
        ac.input.now,
        &svc.config.policy.cooldown_seconds,
    ) {
        return Err(ActionError::CooldownActive {
            intent_type,
            remaining_seconds,
        });
    }
    Ok(())
}

/// Minutes to settle: time since the newest settlement, clamped.
///
/// Falls back to the configured default when nothing was settled yet.
pub(crate) fn heartbeat_minutes(
    events: &[DomainEvent],
    now: DateTime<Utc>,
    pipeline: &PipelineConfig,
) -> i32 {
    let last = events
        .iter()
        .filter(|e| e.event_type == EventType::ActionSettled)
        .map(|e| e.occurred_at)
        .max();
    let Some(last) = last else {
        return pipeline.default_heartbeat_minutes;
    };
    let minutes = now.signed_duration_since(last).num_minutes();
    let clamped = minutes.clamp(
        i64::from(pipeline.min_heartbeat_minutes),
        i64::from(pipeline.max_heartbeat_minutes),
    );
    i32::try_from(clamped).unwrap_or(pipeline.max_heartbeat_minutes)
}

/// The snapshot with `nearby_resource` reduced to one unit of the target.
fn narrow_to_target(snapshot: &WorldSnapshot, target_id: Option<&str>) -> WorldSnapshot {
    let nearby_resource = target_id
        .and_then(ResourceTarget::parse)
        .map(|t| BTreeMap::from([(t.resource, 1)]))
        .unwrap_or_default();
    WorldSnapshot {
        nearby_resource,
        ..snapshot.clone()
    }
}

/// Number of consecutive seedless gathers, newest first.
///
/// The streak ends at a gather that yielded a seed or at one without a
/// recorded result.
pub(crate) fn seedless_gather_streak(events: &[DomainEvent]) -> i64 {
    let mut fails = 0_i64;
    for evt in events.iter().filter(|e| e.is_settled(ActionType::Gather.as_str())) {
        let Some(result) = evt.result() else {
            break;
        };
        if result.get("seed_gained").and_then(Value::as_bool) == Some(true) {
            break;
        }
        fails = fails.saturating_add(1);
    }
    fails
}

fn set_result_field(events: &mut [DomainEvent], key: &str, value: bool) {
    let Some(settled) = events
        .iter_mut()
        .find(|e| e.event_type == EventType::ActionSettled)
    else {
        return;
    };
    let mut result = settled.result().cloned().unwrap_or_default();
    result.insert(key.to_owned(), Value::Bool(value));
    settled.set("result", Value::Object(result));
}

async fn apply_seed_pity(
    svc: &Services<'_>,
    uow: &mut dyn UnitOfWork,
    ac: &ActionContext,
    result: &mut SettlementResult,
) -> Result<(), ActionError> {
    let before = ac.view.state_working.item_count("seed");
    let gained = result.updated_state.item_count("seed") > before;
    set_result_field(&mut result.events, "seed_gained", gained);
    set_result_field(&mut result.events, "seed_pity_triggered", false);
    if gained {
        return Ok(());
    }

    let pipeline = &svc.config.pipeline;
    let fails = match uow
        .events()
        .list_by_agent_id(&ac.input.agent_id, pipeline.seed_pity_window)
        .await
    {
        Ok(events) => seedless_gather_streak(&events),
        Err(err) => {
            debug!(agent_id = %ac.input.agent_id, %err, "seed pity history unavailable");
            0
        }
    };
    if fails < pipeline.seed_pity_max_fails.saturating_sub(1) {
        return Ok(());
    }

    inventory::add_item(&mut result.updated_state.inventory, "seed", 1)?;
    result.updated_state.recompute_inventory_used();
    set_result_field(&mut result.events, "seed_gained", true);
    set_result_field(&mut result.events, "seed_pity_triggered", true);
    let at = result.updated_state.updated_at.unwrap_or(ac.input.now);
    result.events.push(DomainEvent::new(
        EventType::SeedPityTriggered,
        at,
        json!({"agent_id": ac.input.agent_id, "granted": 1}),
    ));
    debug!(agent_id = %ac.input.agent_id, fails, "seed pity granted");
    Ok(())
}

/// Settle the resolved intent and plan every write.
///
/// Sleep settles instantly against the prepared bed. Every other action
/// settles the minutes since the last settlement.
pub(crate) async fn settle_and_plan(
    svc: &Services<'_>,
    uow: &mut dyn UnitOfWork,
    ac: &mut ActionContext,
    opts: SettleOptions,
) -> Result<ExecuteMode, ActionError> {
    let intent = ac.scratch.intent.clone();
    let now = ac.input.now;
    let snapshot = &ac.view.snapshot;

    let (mut result, dt_minutes) = if intent.action_type == ActionType::Sleep {
        let Some(ObjectState::Bed(quality)) = ac.view.prepared.as_ref().map(|p| &p.state) else {
            return Err(ActionError::precondition("bed_required"));
        };
        let result = settle_instant_sleep(
            svc.settlement.config(),
            &ac.view.state_working,
            &intent,
            *quality,
            now,
            snapshot,
        )?;
        (result, 0)
    } else {
        let dt = heartbeat_minutes(&ac.view.events_before, now, &svc.config.pipeline);
        let result = if opts.narrow_gather {
            let narrowed = narrow_to_target(snapshot, intent.params.target_id.as_deref());
            svc.settlement
                .settle(&ac.view.state_working, &intent, dt, now, &narrowed)?
        } else {
            svc.settlement
                .settle(&ac.view.state_working, &intent, dt, now, snapshot)?
        };
        (result, dt)
    };

    result.updated_state.session_id.clone_from(&ac.input.session_id);
    result.updated_state.action_cooldowns = cooldown::remaining_by_action_with_current(
        &ac.view.events_before,
        now,
        intent.action_type,
        &svc.config.policy.cooldown_seconds,
    );
    if snapshot.phase_changed && dt_minutes > 0 {
        result.events.push(DomainEvent::new(
            EventType::WorldPhaseChanged,
            now,
            json!({
                "from": snapshot.phase_from.map(|p| p.as_str()),
                "to": snapshot.phase_to.map(|p| p.as_str()),
            }),
        ));
    }
    if opts.seed_pity && intent.action_type == ActionType::Gather {
        apply_seed_pity(svc, uow, ac, &mut result).await?;
    }
    attach_last_known_threat(&mut result.events, &ac.view.snapshot.visible_tiles);

    let world_before = ac.view.snapshot.world_time_seconds;
    let response = ActionResponse {
        settled_dt_minutes: dt_minutes,
        world_time_before_seconds: world_before,
        world_time_after_seconds: world_time_after(world_before, dt_minutes),
        updated_state: result.updated_state.clone(),
        events: result.events.clone(),
        settlement: settlement_summary(&result.events),
        result_code: result.result_code,
    };

    let plan = &mut ac.plan;
    plan.state_version = ac.view.state_working.version;
    plan.close_session = if result.result_code == ResultCode::GameOver {
        result.updated_state.death_cause
    } else {
        None
    };
    plan.state_to_save = Some(result.updated_state);
    plan.events = result.events;
    plan.result_code = result.result_code;
    plan.should_persist = true;
    plan.apply_gather_depletion = opts.gather_depletion;
    plan.apply_object_action = opts.object_action;
    plan.create_built_objects = opts.create_built;

    ac.scratch.dt_minutes = dt_minutes;
    ac.scratch.response = Some(response);
    Ok(ExecuteMode::Continue)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn settled(intent: &str, at: DateTime<Utc>, result: Option<Value>) -> DomainEvent {
        let mut payload = json!({"decision": {"intent": intent}});
        if let Some(result) = result {
            payload["result"] = result;
        }
        DomainEvent::new(EventType::ActionSettled, at, payload)
    }

    #[test]
    fn heartbeat_defaults_without_history() {
        assert_eq!(heartbeat_minutes(&[], now(), &PipelineConfig::default()), 30);
    }

    #[test]
    fn heartbeat_uses_newest_settlement_and_clamps() {
        let pipeline = PipelineConfig::default();
        let events = vec![
            settled("move", now() - Duration::minutes(400), None),
            settled("move", now() - Duration::seconds(150), None),
        ];
        assert_eq!(heartbeat_minutes(&events, now(), &pipeline), 2);

        let recent = vec![settled("move", now() - Duration::seconds(10), None)];
        assert_eq!(heartbeat_minutes(&recent, now(), &pipeline), 1);

        let old = vec![settled("move", now() - Duration::minutes(400), None)];
        assert_eq!(heartbeat_minutes(&old, now(), &pipeline), 120);
    }

    #[test]
    fn streak_stops_at_seed_or_missing_result() {
        let fail = Some(json!({"seed_gained": false}));
        let events = vec![
            settled("gather", now(), fail.clone()),
            settled("move", now(), None),
            settled("gather", now(), fail.clone()),
            settled("gather", now(), Some(json!({"seed_gained": true}))),
            settled("gather", now(), fail.clone()),
        ];
        assert_eq!(seedless_gather_streak(&events), 2);

        let broken = vec![
            settled("gather", now(), fail.clone()),
            settled("gather", now(), None),
            settled("gather", now(), fail),
        ];
        assert_eq!(seedless_gather_streak(&broken), 1);
    }

    #[test]
    fn narrowing_keeps_one_unit_of_target() {
        let snapshot = WorldSnapshot {
            nearby_resource: BTreeMap::from([("wood".to_owned(), 5), ("stone".to_owned(), 3)]),
            ..WorldSnapshot::default()
        };
        let narrowed = narrow_to_target(&snapshot, Some("res_1_0_wood"));
        assert_eq!(narrowed.nearby_resource, BTreeMap::from([("wood".to_owned(), 1)]));
        assert!(narrow_to_target(&snapshot, Some("bogus")).nearby_resource.is_empty());
    }

    #[test]
    fn result_fields_land_on_settled_event() {
        let mut events = vec![
            DomainEvent::new(EventType::CriticalHp, now(), json!({})),
            settled("gather", now(), Some(json!({"hp_loss": 0}))),
        ];
        set_result_field(&mut events, "seed_gained", true);
        let result = events.last().and_then(DomainEvent::result).unwrap();
        assert_eq!(result.get("seed_gained"), Some(&Value::Bool(true)));
        assert_eq!(result.get("hp_loss"), Some(&json!(0)));
    }
}
