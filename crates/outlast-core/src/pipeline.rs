//! The action pipeline orchestrator.
//!
//! [`ActionEngine::execute`] runs one request through these stages inside a
//! single unit of work:
//!
//! 1. **Validate** -- trim and type the request, run the parameter validator.
//! 2. **Replay** -- return the stored result of a known idempotency key.
//! 3. **Load** -- read the agent state and finalize a due (or terminated)
//!    ongoing action.
//! 4. **Resolve** -- look up the action spec in the registry.
//! 5. **Build context** -- world snapshot, referenced object, move and
//!    retreat resolution, recent events.
//! 6. **Precheck** and 7. **Execute** -- delegated to the handler.
//! 8. **Persist** -- apply the write plan in dependency order.
//! 9. **Respond** -- hand back the response and record metrics.
//!
//! Any stage error rolls the unit of work back, so nothing partially
//! persists.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use outlast_agents::SettlementService;
use outlast_types::{
    ActionExecutionRecord, ActionMetrics, ActionRequest, ActionResponse, ActionType, NoopMetrics,
    PortError, TxManager, UnitOfWork, WorldProvider, session_id_for,
};

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::context::{ActionContext, ActionInput, ExecuteMode, Services};
use crate::depletion::depletion_record;
use crate::error::ActionError;
use crate::finalizer::finalize_ongoing;
use crate::movement::resolve_move_intent;
use crate::objects::{
    apply_object_action, attach_built_object_ids, create_built_objects, prepare_object_action,
};
use crate::registry::{ActionMode, ActionRegistry, ActionSpec, ValidatedRequest, validate_request};
use crate::response::settlement_summary;
use crate::retreat::resolve_retreat_intent;

/// The action resolution engine.
pub struct ActionEngine {
    tx: Arc<dyn TxManager>,
    world: Arc<dyn WorldProvider>,
    metrics: Arc<dyn ActionMetrics>,
    clock: Arc<dyn Clock>,
    settlement: SettlementService,
    config: EngineConfig,
    registry: ActionRegistry,
}

impl std::fmt::Debug for ActionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionEngine")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl ActionEngine {
    /// Engine over `tx` and `world` with the standard registry, the system
    /// clock, and no metrics.
    pub fn new(tx: Arc<dyn TxManager>, world: Arc<dyn WorldProvider>, config: EngineConfig) -> Self {
        Self {
            tx,
            world,
            metrics: Arc::new(NoopMetrics),
            clock: Arc::new(SystemClock),
            settlement: SettlementService::new(config.settlement.clone()),
            config,
            registry: ActionRegistry::standard(),
        }
    }

    /// Record outcomes into `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn ActionMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Read the time from `clock`.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The configuration in use.
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one action request to completion.
    ///
    /// # Errors
    ///
    /// Returns the first error of any stage. [`ActionError::Conflict`] means
    /// the agent state changed underneath the request and the caller may
    /// retry. Nothing is persisted when an error is returned.
    pub async fn execute(&self, request: ActionRequest) -> Result<ActionResponse, ActionError> {
        let now = self.clock.now();
        let agent_id = request.agent_id.trim().to_owned();
        let kind = request.intent.kind.trim().to_owned();

        let outcome = match validate_request(&self.registry, request) {
            Ok(valid) => self.run_in_tx(valid, now).await,
            Err(err) => Err(err),
        };

        match &outcome {
            Ok(response) => {
                self.metrics.record_success(response.result_code);
                info!(
                    agent_id = %agent_id,
                    intent = %kind,
                    result_code = %response.result_code,
                    dt_minutes = response.settled_dt_minutes,
                    version = response.updated_state.version,
                    "Action resolved"
                );
            }
            Err(err) if err.is_conflict() => {
                self.metrics.record_conflict();
                warn!(agent_id = %agent_id, intent = %kind, "Action lost a version race");
            }
            Err(err) => {
                self.metrics.record_failure();
                debug!(agent_id = %agent_id, intent = %kind, code = err.code(), %err, "Action rejected");
            }
        }
        outcome
    }

    fn services(&self) -> Services<'_> {
        Services {
            config: &self.config,
            settlement: &self.settlement,
            world: self.world.as_ref(),
        }
    }

    async fn run_in_tx(
        &self,
        valid: ValidatedRequest,
        now: DateTime<Utc>,
    ) -> Result<ActionResponse, ActionError> {
        let mut uow = self.tx.begin().await?;
        match self.drive(uow.as_mut(), valid, now).await {
            Ok(response) => {
                uow.commit().await?;
                Ok(response)
            }
            Err(err) => {
                if let Err(rollback_err) = uow.rollback().await {
                    warn!(%rollback_err, %err, "Rollback failed");
                }
                Err(err)
            }
        }
    }

    async fn drive(
        &self,
        uow: &mut dyn UnitOfWork,
        valid: ValidatedRequest,
        now: DateTime<Utc>,
    ) -> Result<ActionResponse, ActionError> {
        let svc = self.services();
        let input = ActionInput {
            session_id: session_id_for(&valid.agent_id),
            agent_id: valid.agent_id,
            idempotency_key: valid.idempotency_key,
            strategy_hash: valid.strategy_hash,
            now,
        };

        if let Some(record) = uow
            .executions()
            .get_by_idempotency_key(&input.agent_id, &input.idempotency_key)
            .await?
        {
            debug!(
                agent_id = %input.agent_id,
                idempotency_key = %input.idempotency_key,
                "Idempotent replay"
            );
            return Ok(replay_response(record, &input.session_id));
        }

        let mut ac = ActionContext::new(input, valid.intent);
        load_state(&svc, uow, &mut ac).await?;

        let spec = *self
            .registry
            .get(ac.scratch.intent.action_type)
            .ok_or(ActionError::InvalidRequest)?;
        ac.view.spec = Some(spec);

        build_context(&svc, uow, &mut ac, &spec).await?;
        spec.handler.precheck(&svc, uow, &mut ac).await?;
        let mode = spec.handler.execute_and_plan(&svc, uow, &mut ac).await?;
        debug!(
            agent_id = %ac.input.agent_id,
            intent = %spec.action_type,
            dt_minutes = ac.scratch.dt_minutes,
            completed = mode == ExecuteMode::Completed,
            "Action planned"
        );
        persist(&svc, uow, &mut ac).await
    }
}

/// The stored response of a replayed request.
fn replay_response(record: ActionExecutionRecord, session_id: &str) -> ActionResponse {
    let mut updated_state = record.result.updated_state;
    if updated_state.session_id.trim().is_empty() {
        updated_state.session_id = session_id.to_owned();
    }
    let events = record.result.events;
    ActionResponse {
        settled_dt_minutes: record.dt_minutes,
        world_time_before_seconds: record.world_time_before_seconds,
        world_time_after_seconds: record.world_time_after_seconds,
        updated_state,
        settlement: settlement_summary(&events),
        events,
        result_code: record.result.result_code,
    }
}

/// Load the agent state and finalize its ongoing action when due.
async fn load_state(
    svc: &Services<'_>,
    uow: &mut dyn UnitOfWork,
    ac: &mut ActionContext,
) -> Result<(), ActionError> {
    let mut state = uow.states().get_by_agent_id(&ac.input.agent_id).await?;
    state.recompute_inventory_used();
    if state.inventory_capacity <= 0 {
        state.inventory_capacity = svc.config.pipeline.default_inventory_capacity;
    }
    state.session_id.clone_from(&ac.input.session_id);
    ac.view.state_before = state.clone();

    let force = ac.scratch.intent.action_type == ActionType::Terminate;
    if let Some(finalized) = finalize_ongoing(svc, uow, &state, ac.input.now, force).await? {
        state = finalized.updated_state.clone();
        ac.view.finalized = Some(finalized);
    }
    ac.view.state_working = state;
    Ok(())
}

/// Snapshot, referenced object, resolved intent, and recent events.
async fn build_context(
    svc: &Services<'_>,
    uow: &mut dyn UnitOfWork,
    ac: &mut ActionContext,
    spec: &ActionSpec,
) -> Result<(), ActionError> {
    if spec.mode == ActionMode::FinalizeOnly {
        return Ok(());
    }
    if ac.view.state_working.ongoing_action.is_some() {
        return Err(ActionError::ActionInProgress);
    }

    let agent_id = ac.input.agent_id.clone();
    let position = ac.view.state_working.position;
    ac.view.snapshot = svc.world.snapshot_for_agent(&agent_id, position).await?;
    ac.view.prepared = prepare_object_action(
        uow,
        &svc.config.pipeline,
        ac.input.now,
        &ac.view.state_working,
        &ac.scratch.intent,
    )
    .await?;

    let tiles = &ac.view.snapshot.visible_tiles;
    let intent = resolve_move_intent(position, ac.scratch.intent.clone(), tiles)?;
    ac.scratch.intent = resolve_retreat_intent(intent, position, tiles);

    if spec.mode == ActionMode::Settle {
        ac.view.events_before = uow
            .events()
            .list_by_agent_id(&agent_id, svc.config.pipeline.recent_event_window)
            .await?;
    }
    Ok(())
}

/// Apply the write plan and return the final response.
async fn persist(
    svc: &Services<'_>,
    uow: &mut dyn UnitOfWork,
    ac: &mut ActionContext,
) -> Result<ActionResponse, ActionError> {
    let mut response = ac.scratch.response.take().ok_or_else(|| {
        ActionError::Port(PortError::Backend("handler planned no response".to_owned()))
    })?;
    if !ac.plan.should_persist {
        return Ok(response);
    }
    let agent_id = ac.input.agent_id.clone();
    let now = ac.input.now;

    if let Some(state) = ac.plan.state_to_save.as_ref() {
        uow.states()
            .save_with_version(state, ac.plan.state_version)
            .await?;
    }

    if ac.plan.apply_gather_depletion {
        let record = ac.scratch.intent.params.target_id.as_deref().and_then(|target_id| {
            depletion_record(&agent_id, target_id, now, &svc.config.policy)
        });
        if let Some(record) = record {
            uow.resources().upsert(&record).await?;
        }
    }

    let apply_object = ac.plan.apply_object_action;
    if let Some(prepared) = ac.view.prepared.as_ref().filter(|_| apply_object) {
        apply_object_action(uow, &svc.config.pipeline, now, &ac.scratch.intent, prepared).await?;
    }

    if ac.plan.create_built_objects {
        let ids = create_built_objects(
            uow,
            &svc.config.pipeline,
            &agent_id,
            &ac.input.idempotency_key,
            &ac.scratch.intent,
            &ac.plan.events,
        )
        .await?;
        attach_built_object_ids(&mut ac.plan.events, &ids);
    }

    for evt in &mut ac.plan.events {
        evt.set("agent_id", Value::from(agent_id.as_str()));
        evt.set("session_id", Value::from(ac.input.session_id.as_str()));
        if let Some(hash) = ac.input.strategy_hash.as_deref() {
            evt.set("strategy_hash", Value::from(hash));
        }
    }
    if !ac.plan.events.is_empty() {
        uow.events().append(&agent_id, &ac.plan.events).await?;
        response.events.clone_from(&ac.plan.events);
        response.settlement = settlement_summary(&response.events);
    }

    let record = ac.execution_record(&response);
    uow.executions().save_execution(&record).await?;
    ac.plan.execution = Some(record);

    if let Some(cause) = ac.plan.close_session {
        uow.sessions()
            .close(&ac.input.session_id, cause, now)
            .await?;
    }
    Ok(response)
}
