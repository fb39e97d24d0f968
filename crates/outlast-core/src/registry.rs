//! Action handler registry and request validation.
//!
//! Every [`ActionType`] maps to an [`ActionSpec`]: how the action runs, the
//! parameter validator checked before the transaction opens, and the
//! stateless [`ActionHandler`] that implements its two pipeline phases.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;

use outlast_agents::production;
use outlast_types::{ActionIntent, ActionRequest, ActionType, UnitOfWork};

use crate::context::{ActionContext, ExecuteMode, Services};
use crate::error::ActionError;
use crate::handlers;

/// Shortest rest an agent may start, in minutes.
pub const MIN_REST_MINUTES: i32 = 1;
/// Longest rest an agent may start, in minutes.
pub const MAX_REST_MINUTES: i32 = 120;

/// The two-phase contract every action implements.
#[async_trait]
pub trait ActionHandler: fmt::Debug + Send + Sync {
    /// Check business preconditions. Nothing is written.
    async fn precheck(
        &self,
        _svc: &Services<'_>,
        _uow: &mut dyn UnitOfWork,
        _ac: &mut ActionContext,
    ) -> Result<(), ActionError> {
        Ok(())
    }

    /// Execute the action and fill in the write plan.
    async fn execute_and_plan(
        &self,
        svc: &Services<'_>,
        uow: &mut dyn UnitOfWork,
        ac: &mut ActionContext,
    ) -> Result<ExecuteMode, ActionError>;
}

/// How an action type is driven by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionMode {
    /// Settled immediately.
    Settle,
    /// Starts an ongoing action settled by a later request.
    StartOngoing,
    /// Only finalizes an ongoing action.
    FinalizeOnly,
}

/// Parameter validator run before the transaction opens.
pub type ParamValidator = fn(&ActionIntent) -> bool;

/// Registry entry of one action type.
#[derive(Debug, Clone, Copy)]
pub struct ActionSpec {
    /// The action type.
    pub action_type: ActionType,
    /// How the pipeline drives it.
    pub mode: ActionMode,
    /// Whether an ongoing action of this type may be terminated early.
    pub can_terminate: bool,
    /// Parameter validator.
    pub validate: ParamValidator,
    /// Handler implementing both phases.
    pub handler: &'static dyn ActionHandler,
}

/// Lookup table from action type to spec.
#[derive(Debug, Clone)]
pub struct ActionRegistry {
    specs: BTreeMap<ActionType, ActionSpec>,
}

impl ActionRegistry {
    /// The registry with every built-in action.
    pub fn standard() -> Self {
        use handlers::{
            BuildHandler, ContainerDepositHandler, ContainerWithdrawHandler, CraftHandler,
            EatHandler, FarmHarvestHandler, FarmPlantHandler, GatherHandler, MoveHandler,
            RestHandler, RetreatHandler, SleepHandler, TerminateHandler,
        };

        let specs = BTreeMap::from([
            entry(ActionType::Gather, ActionMode::Settle, validate_gather, &GatherHandler),
            entry(ActionType::Rest, ActionMode::StartOngoing, validate_rest, &RestHandler),
            entry(ActionType::Sleep, ActionMode::Settle, validate_sleep, &SleepHandler),
            entry(ActionType::Move, ActionMode::Settle, always_valid, &MoveHandler),
            entry(ActionType::Build, ActionMode::Settle, validate_build, &BuildHandler),
            entry(ActionType::FarmPlant, ActionMode::Settle, validate_farm, &FarmPlantHandler),
            entry(ActionType::FarmHarvest, ActionMode::Settle, validate_farm, &FarmHarvestHandler),
            entry(ActionType::ContainerDeposit, ActionMode::Settle, validate_container, &ContainerDepositHandler),
            entry(ActionType::ContainerWithdraw, ActionMode::Settle, validate_container, &ContainerWithdrawHandler),
            entry(ActionType::Retreat, ActionMode::Settle, always_valid, &RetreatHandler),
            entry(ActionType::Craft, ActionMode::Settle, validate_craft, &CraftHandler),
            entry(ActionType::Eat, ActionMode::Settle, validate_eat, &EatHandler),
            entry(ActionType::Terminate, ActionMode::FinalizeOnly, always_valid, &TerminateHandler),
        ]);
        Self { specs }
    }

    /// Spec of `action_type`, if registered.
    pub fn get(&self, action_type: ActionType) -> Option<&ActionSpec> {
        self.specs.get(&action_type)
    }

    /// Number of registered action types.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

const fn entry(
    action_type: ActionType,
    mode: ActionMode,
    validate: ParamValidator,
    handler: &'static dyn ActionHandler,
) -> (ActionType, ActionSpec) {
    (
        action_type,
        ActionSpec {
            action_type,
            mode,
            can_terminate: matches!(action_type, ActionType::Rest),
            validate,
            handler,
        },
    )
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

// ---------------------------------------------------------------------------
// Request validation
// ---------------------------------------------------------------------------

/// A request that passed shape validation.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    /// Trimmed agent id.
    pub agent_id: String,
    /// Trimmed idempotency key.
    pub idempotency_key: String,
    /// Normalized typed intent.
    pub intent: ActionIntent,
    /// Non-blank strategy hash.
    pub strategy_hash: Option<String>,
}

/// Trim, type, and normalize a request, then run its parameter validator.
pub fn validate_request(
    registry: &ActionRegistry,
    request: ActionRequest,
) -> Result<ValidatedRequest, ActionError> {
    let agent_id = request.agent_id.trim().to_owned();
    let idempotency_key = request.idempotency_key.trim().to_owned();
    let action_type =
        ActionType::from_str(request.intent.kind.trim()).map_err(|err| {
            tracing::debug!(%err, "unknown action type");
            ActionError::InvalidRequest
        })?;
    if agent_id.is_empty() || idempotency_key.is_empty() {
        return Err(ActionError::InvalidRequest);
    }
    let spec = registry.get(action_type).ok_or(ActionError::InvalidRequest)?;

    let intent = normalize_intent(ActionIntent {
        action_type,
        params: request.intent.params,
    });
    if !(spec.validate)(&intent) {
        return Err(ActionError::InvalidActionParams);
    }
    Ok(ValidatedRequest {
        agent_id,
        idempotency_key,
        intent,
        strategy_hash: request
            .strategy_hash
            .map(|h| h.trim().to_owned())
            .filter(|h| !h.is_empty()),
    })
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

/// Resolve compass directions, default the count, and tidy string params.
pub fn normalize_intent(mut intent: ActionIntent) -> ActionIntent {
    let params = &mut intent.params;
    params.direction = trimmed(params.direction.take()).map(|d| d.to_uppercase());
    match params.direction.as_deref() {
        Some("N") => (params.dx, params.dy) = (0, 1),
        Some("S") => (params.dx, params.dy) = (0, -1),
        Some("E") => (params.dx, params.dy) = (1, 0),
        Some("W") => (params.dx, params.dy) = (-1, 0),
        _ => {}
    }
    if params.count <= 0 {
        params.count = 1;
    }
    params.target_id = trimmed(params.target_id.take());
    params.bed_id = trimmed(params.bed_id.take());
    params.farm_id = trimmed(params.farm_id.take());
    params.container_id = trimmed(params.container_id.take());
    params.object_type = trimmed(params.object_type.take()).map(|t| t.to_lowercase());
    params.item_type = trimmed(params.item_type.take()).map(|t| t.to_lowercase());
    for item in &mut params.items {
        item.item_type = item.item_type.trim().to_lowercase();
    }
    intent
}

const fn always_valid(_: &ActionIntent) -> bool {
    true
}

const fn validate_gather(intent: &ActionIntent) -> bool {
    intent.params.target_id.is_some()
}

const fn validate_rest(intent: &ActionIntent) -> bool {
    let minutes = intent.params.rest_minutes;
    minutes >= MIN_REST_MINUTES && minutes <= MAX_REST_MINUTES
}

const fn validate_sleep(intent: &ActionIntent) -> bool {
    intent.params.bed_id.is_some()
}

fn validate_build(intent: &ActionIntent) -> bool {
    intent.params.pos.is_some()
        && intent
            .params
            .object_type
            .as_deref()
            .and_then(production::build_def)
            .is_some()
}

const fn validate_farm(intent: &ActionIntent) -> bool {
    intent.params.farm_id.is_some()
}

fn validate_container(intent: &ActionIntent) -> bool {
    intent.params.container_id.is_some()
        && !intent.params.items.is_empty()
        && intent
            .params
            .items
            .iter()
            .all(|item| !item.item_type.is_empty() && item.count > 0)
}

fn validate_craft(intent: &ActionIntent) -> bool {
    intent.params.recipe_id.is_some_and(|id| id > 0)
}

fn validate_eat(intent: &ActionIntent) -> bool {
    intent.params.count > 0
        && intent
            .params
            .item_type
            .as_deref()
            .and_then(production::food_recovery)
            .is_some()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use outlast_types::{IntentParams, ItemAmount, RequestedIntent};

    use super::*;

    fn request(kind: &str, params: IntentParams) -> ActionRequest {
        ActionRequest {
            agent_id: " a1 ".into(),
            idempotency_key: "k1".into(),
            intent: RequestedIntent {
                kind: kind.into(),
                params,
            },
            strategy_hash: Some("  ".into()),
        }
    }

    #[test]
    fn every_action_type_is_registered() {
        let registry = ActionRegistry::standard();
        assert_eq!(registry.len(), ActionType::ALL.len());
        for action_type in ActionType::ALL {
            let spec = registry.get(action_type).unwrap();
            assert_eq!(spec.action_type, action_type);
        }
        assert!(registry.get(ActionType::Rest).unwrap().can_terminate);
        assert_eq!(
            registry.get(ActionType::Terminate).unwrap().mode,
            ActionMode::FinalizeOnly
        );
    }

    #[test]
    fn unknown_type_is_invalid_request() {
        let err = validate_request(&ActionRegistry::standard(), request("dance", IntentParams::default()));
        assert_eq!(err.unwrap_err(), ActionError::InvalidRequest);
    }

    #[test]
    fn blank_key_is_invalid_request() {
        let mut req = request("move", IntentParams::default());
        req.idempotency_key = "  ".into();
        assert_eq!(
            validate_request(&ActionRegistry::standard(), req).unwrap_err(),
            ActionError::InvalidRequest
        );
    }

    #[test]
    fn direction_is_normalized_and_ids_trimmed() {
        let params = IntentParams {
            direction: Some(" w ".into()),
            ..IntentParams::default()
        };
        let valid = validate_request(&ActionRegistry::standard(), request("move", params)).unwrap();
        assert_eq!(valid.agent_id, "a1");
        assert_eq!((valid.intent.params.dx, valid.intent.params.dy), (-1, 0));
        assert_eq!(valid.intent.params.count, 1);
        assert!(valid.strategy_hash.is_none());
    }

    #[test]
    fn rest_minutes_must_be_in_range() {
        let registry = ActionRegistry::standard();
        for (minutes, ok) in [(0, false), (1, true), (120, true), (121, false)] {
            let params = IntentParams {
                rest_minutes: minutes,
                ..IntentParams::default()
            };
            assert_eq!(validate_request(&registry, request("rest", params)).is_ok(), ok, "{minutes}");
        }
    }

    #[test]
    fn container_items_must_be_well_formed() {
        let registry = ActionRegistry::standard();
        let mut params = IntentParams {
            container_id: Some("box-1".into()),
            ..IntentParams::default()
        };
        assert_eq!(
            validate_request(&registry, request("container_deposit", params.clone())).unwrap_err(),
            ActionError::InvalidActionParams
        );
        params.items = vec![ItemAmount {
            item_type: " Wood ".into(),
            count: 2,
        }];
        let valid = validate_request(&registry, request("container_deposit", params.clone())).unwrap();
        assert_eq!(valid.intent.params.items.first().unwrap().item_type, "wood");
        params.items.push(ItemAmount {
            item_type: "stone".into(),
            count: 0,
        });
        assert!(validate_request(&registry, request("container_withdraw", params)).is_err());
    }

    #[test]
    fn build_needs_known_type_and_position() {
        let registry = ActionRegistry::standard();
        let params = IntentParams {
            object_type: Some("box".into()),
            ..IntentParams::default()
        };
        assert!(validate_request(&registry, request("build", params.clone())).is_err());
        let params = IntentParams {
            pos: Some(outlast_types::Position::new(1, 1)),
            ..params
        };
        assert!(validate_request(&registry, request("build", params)).is_ok());
    }

    #[test]
    fn eat_needs_known_food() {
        let registry = ActionRegistry::standard();
        let params = IntentParams {
            item_type: Some("Berry".into()),
            ..IntentParams::default()
        };
        assert!(validate_request(&registry, request("eat", params)).is_ok());
        let params = IntentParams {
            item_type: Some("wood".into()),
            ..IntentParams::default()
        };
        assert!(validate_request(&registry, request("eat", params)).is_err());
    }
}
