//! Error types for the outlast-agents crate.
//!
//! Settlement never panics; every failure is a typed error.

/// Errors that can occur while settling an action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettlementError {
    /// The settled window must be at least one minute.
    #[error("invalid delta minutes: {minutes}")]
    InvalidDelta {
        /// The rejected minutes.
        minutes: i32,
    },

    /// An arithmetic overflow occurred during a vital or inventory computation.
    #[error("arithmetic overflow in settlement: {context}")]
    ArithmeticOverflow {
        /// Description of what was being computed.
        context: String,
    },
}

impl SettlementError {
    /// Shorthand for an overflow error.
    pub fn overflow(context: &str) -> Self {
        Self::ArithmeticOverflow {
            context: context.to_owned(),
        }
    }
}
