//! Per-request scratch state threaded through the pipeline stages.
//!
//! An [`ActionContext`] lives for exactly one call to
//! [`ActionEngine::execute`](crate::pipeline::ActionEngine::execute). Stages
//! read [`ActionInput`], fill in [`ActionView`], and handlers record what
//! must be written in the [`WritePlan`].

use chrono::{DateTime, Utc};

use outlast_agents::SettlementService;
use outlast_types::{
    ActionExecutionRecord, ActionIntent, ActionResponse, AgentStateAggregate, DeathCause,
    DomainEvent, ResultCode, WorldProvider, WorldSnapshot,
};

use crate::config::EngineConfig;
use crate::finalizer::FinalizeOutcome;
use crate::objects::PreparedObject;
use crate::registry::ActionSpec;

/// Shared collaborators handed to every handler.
pub struct Services<'a> {
    /// Engine configuration.
    pub config: &'a EngineConfig,
    /// Settlement algorithm.
    pub settlement: &'a SettlementService,
    /// World snapshot source.
    pub world: &'a dyn WorldProvider,
}

/// Normalized request data.
#[derive(Debug, Clone)]
pub struct ActionInput {
    /// Trimmed agent id.
    pub agent_id: String,
    /// Trimmed idempotency key.
    pub idempotency_key: String,
    /// Session of the agent (`session-<agent_id>`).
    pub session_id: String,
    /// Caller strategy fingerprint, stamped onto appended events.
    pub strategy_hash: Option<String>,
    /// Wall-clock time of the request.
    pub now: DateTime<Utc>,
}

/// Everything read while preparing the action.
#[derive(Debug, Clone, Default)]
pub struct ActionView {
    /// The registry entry of the requested action.
    pub spec: Option<ActionSpec>,
    /// State as loaded from storage.
    pub state_before: AgentStateAggregate,
    /// State after any ongoing action was finalized.
    pub state_working: AgentStateAggregate,
    /// Recent events, newest first.
    pub events_before: Vec<DomainEvent>,
    /// World view centered on the agent.
    pub snapshot: WorldSnapshot,
    /// Referenced bed, box, or farm plot.
    pub prepared: Option<PreparedObject>,
    /// Result of finalizing an ongoing action, if one was settled.
    pub finalized: Option<FinalizeOutcome>,
}

/// Writes the pipeline applies once the handler has planned them.
#[derive(Debug, Clone, Default)]
pub struct WritePlan {
    /// State to save with `state_version` as the expected version.
    pub state_to_save: Option<AgentStateAggregate>,
    /// Expected stored version for the optimistic save.
    pub state_version: i64,
    /// Events to stamp and append.
    pub events: Vec<DomainEvent>,
    /// Idempotency record to save.
    pub execution: Option<ActionExecutionRecord>,
    /// Outcome of the planned action.
    pub result_code: ResultCode,
    /// Whether anything is written at all.
    pub should_persist: bool,
    /// Record depletion of the gather target.
    pub apply_gather_depletion: bool,
    /// Mutate the prepared object (box contents, farm state).
    pub apply_object_action: bool,
    /// Create objects for `build_completed` events.
    pub create_built_objects: bool,
    /// Close the session with this cause.
    pub close_session: Option<DeathCause>,
}

/// Mode a handler returns from `execute_and_plan`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteMode {
    /// Settled normally; the response reflects the appended events.
    Continue,
    /// The handler built its own response (rest start, terminate).
    Completed,
}

/// Values computed by one stage and consumed by a later one.
#[derive(Debug, Clone)]
pub struct Scratch {
    /// The intent after normalization and move/retreat resolution.
    pub intent: ActionIntent,
    /// Minutes settled by the handler.
    pub dt_minutes: i32,
    /// Response prepared by the handler.
    pub response: Option<ActionResponse>,
}

/// Per-request pipeline state.
#[derive(Debug, Clone)]
pub struct ActionContext {
    /// Normalized input.
    pub input: ActionInput,
    /// Loaded and derived read state.
    pub view: ActionView,
    /// Planned writes.
    pub plan: WritePlan,
    /// Inter-stage values.
    pub scratch: Scratch,
}

impl ActionContext {
    /// Fresh context for a validated request.
    pub fn new(input: ActionInput, intent: ActionIntent) -> Self {
        Self {
            input,
            view: ActionView::default(),
            plan: WritePlan::default(),
            scratch: Scratch {
                intent,
                dt_minutes: 0,
                response: None,
            },
        }
    }

    /// An execution record for this request holding `response` verbatim.
    pub fn execution_record(&self, response: &ActionResponse) -> ActionExecutionRecord {
        ActionExecutionRecord {
            agent_id: self.input.agent_id.clone(),
            idempotency_key: self.input.idempotency_key.clone(),
            intent_type: self.scratch.intent.action_type.as_str().to_owned(),
            dt_minutes: response.settled_dt_minutes,
            result: outlast_types::ActionResult {
                updated_state: response.updated_state.clone(),
                events: response.events.clone(),
                result_code: response.result_code,
            },
            world_time_before_seconds: response.world_time_before_seconds,
            world_time_after_seconds: response.world_time_after_seconds,
            applied_at: self.input.now,
        }
    }
}
