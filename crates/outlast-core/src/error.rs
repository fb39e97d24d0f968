//! Error taxonomy of the action pipeline.
//!
//! Request-shape errors are caller mistakes. Precondition errors are
//! business-rule rejections surfaced verbatim. [`ActionError::Conflict`] is
//! the optimistic-concurrency failure a caller may retry after re-reading.
//! Everything else is an infrastructure failure propagated unchanged.

use outlast_agents::SettlementError;
use outlast_types::{ActionType, PortError, Position};

/// Errors returned by [`ActionEngine::execute`](crate::pipeline::ActionEngine::execute).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    /// Blank agent id or idempotency key, or an unknown action type.
    #[error("invalid action request")]
    InvalidRequest,

    /// The intent is missing or carries malformed type-specific parameters.
    #[error("invalid action params")]
    InvalidActionParams,

    /// A business precondition does not hold.
    #[error("action precondition failed: {reason}")]
    PreconditionFailed {
        /// Short machine-readable reason.
        reason: &'static str,
    },

    /// A move target is unreachable or not passable.
    #[error("action invalid position")]
    InvalidPosition {
        /// The requested destination, when the intent named one.
        target_pos: Option<Position>,
        /// The impassable tile that cut the path, when one was found.
        blocking_tile_pos: Option<Position>,
    },

    /// The same action type was settled too recently.
    #[error("action cooldown active: {intent_type} ready in {remaining_seconds}s")]
    CooldownActive {
        /// The action type on cooldown.
        intent_type: ActionType,
        /// Whole seconds until the action is ready again.
        remaining_seconds: i64,
    },

    /// A non-terminate intent arrived while an ongoing action is active.
    #[error("action in progress")]
    ActionInProgress,

    /// The gather target lies outside the view radius.
    #[error("target out of view")]
    TargetOutOfView,

    /// The gather target is within range but not visible.
    #[error("target not visible")]
    TargetNotVisible,

    /// The gather target was depleted by this agent and has not respawned.
    #[error("resource depleted: {target_id} respawns in {remaining_seconds}s")]
    ResourceDepleted {
        /// The depleted target id.
        target_id: String,
        /// Whole seconds until the target respawns.
        remaining_seconds: i64,
    },

    /// The agent's inventory cannot hold the withdrawn items.
    #[error("inventory full")]
    InventoryFull,

    /// The container cannot hold the deposited items.
    #[error("container full")]
    ContainerFull,

    /// The agent state was modified concurrently.
    #[error("conflict")]
    Conflict,

    /// Settlement arithmetic failed.
    #[error(transparent)]
    Settlement(#[from] SettlementError),

    /// A storage or world port failed.
    #[error("port error: {0}")]
    Port(PortError),
}

impl From<PortError> for ActionError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::Conflict => Self::Conflict,
            other => Self::Port(other),
        }
    }
}

impl ActionError {
    /// Shorthand for a precondition failure.
    pub const fn precondition(reason: &'static str) -> Self {
        Self::PreconditionFailed { reason }
    }

    /// Stable snake-case code for transports.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidActionParams => "invalid_action_params",
            Self::PreconditionFailed { .. } => "action_precondition_failed",
            Self::InvalidPosition { .. } => "action_invalid_position",
            Self::CooldownActive { .. } => "action_cooldown_active",
            Self::ActionInProgress => "action_in_progress",
            Self::TargetOutOfView => "target_out_of_view",
            Self::TargetNotVisible => "target_not_visible",
            Self::ResourceDepleted { .. } => "resource_depleted",
            Self::InventoryFull => "inventory_full",
            Self::ContainerFull => "container_full",
            Self::Conflict => "conflict",
            Self::Settlement(_) => "settlement_error",
            Self::Port(_) => "internal_error",
        }
    }

    /// Whether the failure is an optimistic-concurrency conflict.
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_conflict_maps_to_conflict() {
        let err = ActionError::from(PortError::Conflict);
        assert!(err.is_conflict());
        assert_eq!(err.code(), "conflict");
    }

    #[test]
    fn other_port_errors_stay_wrapped() {
        let err = ActionError::from(PortError::NotFound);
        assert_eq!(err, ActionError::Port(PortError::NotFound));
        assert!(!err.is_conflict());
    }

    #[test]
    fn cooldown_message_names_remaining_seconds() {
        let err = ActionError::CooldownActive {
            intent_type: ActionType::Move,
            remaining_seconds: 30,
        };
        assert_eq!(err.to_string(), "action cooldown active: move ready in 30s");
        assert_eq!(err.code(), "action_cooldown_active");
    }
}
