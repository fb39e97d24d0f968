//! Action request and response types for agent-engine communication.
//!
//! An agent submits an [`ActionRequest`] carrying a loosely typed
//! [`RequestedIntent`]. Validation turns it into a typed [`ActionIntent`]
//! which flows through settlement, and the engine answers with an
//! [`ActionResponse`].

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{ActionType, BedQuality, ResultCode};
use crate::events::DomainEvent;
use crate::structs::{AgentStateAggregate, Position};

// ---------------------------------------------------------------------------
// Intent parameters
// ---------------------------------------------------------------------------

/// An item type and amount, used by container transfers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ItemAmount {
    /// Item type.
    pub item_type: String,
    /// Amount to move.
    pub count: i32,
}

/// Union of all per-action parameters. Each action reads only its own fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct IntentParams {
    /// Compass direction for move/retreat (`N`, `S`, `E`, `W`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    /// Horizontal step.
    #[serde(default)]
    pub dx: i32,
    /// Vertical step.
    #[serde(default)]
    pub dy: i32,
    /// Target position for move-to or build.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<Position>,
    /// Gather target in `res_<x>_<y>_<resource>` form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    /// Craft recipe id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe_id: Option<u32>,
    /// Object to build.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    /// Item to eat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
    /// Amount to eat.
    #[serde(default)]
    pub count: i32,
    /// Rest duration in minutes.
    #[serde(default)]
    pub rest_minutes: i32,
    /// Bed to sleep in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bed_id: Option<String>,
    /// Quality of the prepared bed. Filled by the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bed_quality: Option<BedQuality>,
    /// Farm plot to plant or harvest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub farm_id: Option<String>,
    /// Box to deposit into or withdraw from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    /// Items to transfer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<ItemAmount>,
}

/// The intent as submitted, with its type still an unparsed string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RequestedIntent {
    /// Wire name of the action type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Action parameters.
    #[serde(flatten)]
    pub params: IntentParams,
}

/// A validated, typed intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ActionIntent {
    /// Action to perform.
    #[serde(rename = "type")]
    pub action_type: ActionType,
    /// Action parameters.
    #[serde(flatten)]
    pub params: IntentParams,
}

impl ActionIntent {
    /// An intent with no parameters.
    pub fn bare(action_type: ActionType) -> Self {
        Self {
            action_type,
            params: IntentParams::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Request / response
// ---------------------------------------------------------------------------

/// An inbound action request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ActionRequest {
    /// Acting agent.
    pub agent_id: String,
    /// Caller-supplied deduplication token.
    pub idempotency_key: String,
    /// What the agent wants to do.
    pub intent: RequestedIntent,
    /// Opaque hash of the caller's strategy, stamped onto events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy_hash: Option<String>,
}

/// The engine's answer to an [`ActionRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ActionResponse {
    /// Minutes of game time settled by this call.
    pub settled_dt_minutes: i32,
    /// World clock before settlement.
    pub world_time_before_seconds: i64,
    /// World clock after settlement.
    pub world_time_after_seconds: i64,
    /// Agent state after the action.
    pub updated_state: AgentStateAggregate,
    /// Events produced by the action.
    pub events: Vec<DomainEvent>,
    /// Compact settlement summary taken from the `action_settled` event.
    #[ts(type = "Record<string, unknown> | null")]
    pub settlement: Option<serde_json::Value>,
    /// Outcome class.
    pub result_code: ResultCode,
}
