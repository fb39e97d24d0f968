//! Starting and terminating ongoing actions.

use async_trait::async_trait;
use chrono::Duration;
use serde_json::json;

use outlast_agents::enrich_state;
use outlast_types::{
    ActionResponse, ActionType, DomainEvent, EventType, OngoingAction, ResultCode, UnitOfWork,
};

use crate::context::{ActionContext, ExecuteMode, Services};
use crate::error::ActionError;
use crate::registry::ActionHandler;
use crate::response::settlement_summary;

/// Handler for `rest`. Starts the rest without settling anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct RestHandler;

/// Handler for `terminate`. Reports the ongoing action finalized while loading state.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminateHandler;

#[async_trait]
impl ActionHandler for RestHandler {
    async fn precheck(
        &self,
        _svc: &Services<'_>,
        _uow: &mut dyn UnitOfWork,
        ac: &mut ActionContext,
    ) -> Result<(), ActionError> {
        if ac.view.state_working.dead {
            return Err(ActionError::precondition("agent_dead"));
        }
        Ok(())
    }

    async fn execute_and_plan(
        &self,
        svc: &Services<'_>,
        _uow: &mut dyn UnitOfWork,
        ac: &mut ActionContext,
    ) -> Result<ExecuteMode, ActionError> {
        let now = ac.input.now;
        let rest_minutes = ac.scratch.intent.params.rest_minutes;
        let end_at = Duration::try_minutes(i64::from(rest_minutes))
            .and_then(|d| now.checked_add_signed(d))
            .ok_or(ActionError::InvalidActionParams)?;

        let mut next = ac.view.state_working.clone();
        next.ongoing_action = Some(OngoingAction {
            action_type: ActionType::Rest,
            minutes: rest_minutes,
            end_at,
        });
        next.version = next.version.saturating_add(1);
        next.updated_at = Some(now);
        enrich_state(&mut next, svc.settlement.config(), &ac.view.snapshot);

        let world_time = ac.view.snapshot.world_time_seconds;
        let event = DomainEvent::new(
            EventType::RestStarted,
            now,
            json!({
                "agent_id": ac.input.agent_id,
                "session_id": ac.input.session_id,
                "rest_minutes": rest_minutes,
                "end_at": end_at,
                "world_time_before_seconds": world_time,
                "world_time_after_seconds": world_time,
            }),
        );
        let events = vec![event];

        ac.scratch.response = Some(ActionResponse {
            settled_dt_minutes: 0,
            world_time_before_seconds: world_time,
            world_time_after_seconds: world_time,
            updated_state: next.clone(),
            events: events.clone(),
            settlement: settlement_summary(&events),
            result_code: ResultCode::Ok,
        });
        ac.scratch.dt_minutes = 0;
        ac.plan.state_version = ac.view.state_working.version;
        ac.plan.state_to_save = Some(next);
        ac.plan.events = events;
        ac.plan.result_code = ResultCode::Ok;
        ac.plan.should_persist = true;
        Ok(ExecuteMode::Completed)
    }
}

#[async_trait]
impl ActionHandler for TerminateHandler {
    async fn execute_and_plan(
        &self,
        _svc: &Services<'_>,
        _uow: &mut dyn UnitOfWork,
        ac: &mut ActionContext,
    ) -> Result<ExecuteMode, ActionError> {
        let Some(finalized) = ac.view.finalized.as_ref() else {
            return Err(ActionError::precondition("nothing_to_terminate"));
        };
        ac.scratch.response = Some(ActionResponse {
            settled_dt_minutes: finalized.dt_minutes,
            world_time_before_seconds: finalized.world_time_before,
            world_time_after_seconds: finalized.world_time_after,
            updated_state: finalized.updated_state.clone(),
            events: finalized.events.clone(),
            settlement: settlement_summary(&finalized.events),
            result_code: finalized.result_code,
        });
        ac.scratch.dt_minutes = finalized.dt_minutes;
        ac.plan.result_code = finalized.result_code;
        ac.plan.should_persist = true;
        Ok(ExecuteMode::Completed)
    }
}
