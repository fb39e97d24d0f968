//! Finalizing ongoing actions.
//!
//! Rest is the only ongoing action. It settles when its end time passes or
//! when the agent explicitly terminates it, prorated to the minutes actually
//! rested.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tracing::debug;

use outlast_agents::{SettlementResult, enrich_state};
use outlast_types::{
    ActionIntent, ActionType, AgentStateAggregate, DomainEvent, EventType, ResultCode, UnitOfWork,
    session_id_for,
};

use crate::context::Services;
use crate::error::ActionError;
use crate::response::world_time_window_from_events;

/// The settled remainder of an ongoing action.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizeOutcome {
    /// State after settlement with the ongoing action cleared.
    pub updated_state: AgentStateAggregate,
    /// Settlement events followed by `ongoing_action_ended`.
    pub events: Vec<DomainEvent>,
    /// Outcome of the settlement.
    pub result_code: ResultCode,
    /// Minutes actually settled.
    pub dt_minutes: i32,
    /// World clock before the settled window.
    pub world_time_before: i64,
    /// World clock after the settled window.
    pub world_time_after: i64,
}

/// Whether an ongoing action of `action_type` may be cut short.
pub const fn is_interruptible(action_type: ActionType) -> bool {
    matches!(action_type, ActionType::Rest)
}

/// Minutes of an ongoing action to settle at `now`.
///
/// Elapsed minutes are floored and clamped to the planned length. Once the
/// action is past due at least one minute is settled.
pub fn elapsed_minutes(
    started_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
    planned: i32,
    now: DateTime<Utc>,
) -> i32 {
    let elapsed = now.signed_duration_since(started_at).num_minutes();
    let clamped = elapsed.clamp(0, i64::from(planned.max(0)));
    let minutes = i32::try_from(clamped).unwrap_or(planned);
    if now >= end_at { minutes.max(1) } else { minutes }
}

/// Settle the agent's ongoing action if it is due or `force` is set.
///
/// Returns `None` when there is nothing to finalize yet. Writes the state,
/// the events, and a session close on death through `uow`.
pub async fn finalize_ongoing(
    svc: &Services<'_>,
    uow: &mut dyn UnitOfWork,
    state: &AgentStateAggregate,
    now: DateTime<Utc>,
    force: bool,
) -> Result<Option<FinalizeOutcome>, ActionError> {
    let Some(ongoing) = state.ongoing_action.as_ref() else {
        return Ok(None);
    };
    if force && !is_interruptible(ongoing.action_type) {
        return Err(ActionError::precondition("ongoing_not_interruptible"));
    }
    if now < ongoing.end_at && !force {
        return Ok(None);
    }

    let agent_id = state.agent_id.as_str();
    let dt_minutes = elapsed_minutes(ongoing.started_at(), ongoing.end_at, ongoing.minutes, now);
    let snapshot = svc.world.snapshot_for_agent(agent_id, state.position).await?;

    let mut result = if dt_minutes > 0 {
        svc.settlement.settle(
            state,
            &ActionIntent::bare(ongoing.action_type),
            dt_minutes,
            now,
            &snapshot,
        )?
    } else {
        let mut unchanged = state.clone();
        unchanged.version = unchanged.version.saturating_add(1);
        SettlementResult {
            updated_state: unchanged,
            events: Vec::new(),
            result_code: ResultCode::Ok,
        }
    };
    result.updated_state.ongoing_action = None;
    result.updated_state.updated_at = Some(now);
    enrich_state(&mut result.updated_state, svc.settlement.config(), &snapshot);

    let session_id = session_id_for(agent_id);
    for evt in &mut result.events {
        evt.set("agent_id", Value::from(agent_id));
        evt.set("session_id", Value::from(session_id.as_str()));
    }
    result.events.push(DomainEvent::new(
        EventType::OngoingActionEnded,
        now,
        json!({
            "agent_id": agent_id,
            "session_id": session_id,
            "action_type": ongoing.action_type.as_str(),
            "planned_minutes": ongoing.minutes,
            "actual_minutes": dt_minutes,
            "forced": force,
        }),
    ));

    uow.states()
        .save_with_version(&result.updated_state, state.version)
        .await?;
    uow.events().append(agent_id, &result.events).await?;
    if result.result_code == ResultCode::GameOver {
        let cause = result.updated_state.death_cause.unwrap_or_default();
        uow.sessions().close(&session_id, cause, now).await?;
    }

    let (world_time_before, world_time_after) = world_time_window_from_events(&result.events)
        .unwrap_or((snapshot.world_time_seconds, snapshot.world_time_seconds));
    debug!(
        agent_id,
        action_type = %ongoing.action_type,
        planned_minutes = ongoing.minutes,
        actual_minutes = dt_minutes,
        forced = force,
        "ongoing action finalized"
    );

    Ok(Some(FinalizeOutcome {
        updated_state: result.updated_state,
        events: result.events,
        result_code: result.result_code,
        dt_minutes,
        world_time_before,
        world_time_after,
    }))
}
