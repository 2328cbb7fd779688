//! Domain error kinds the core distinguishes. Return values that are
//! expected outcomes rather than failures (`place_limit`/`cancel`'s nullable
//! identifiers) stay `Option<T>` and never appear here; these variants cover
//! the handful of cases that are genuinely exceptional or fatal.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("transient stream error on {venue}: {source}")]
    TransientStream {
        venue: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("remote rejected {op} for order {order_id:?}: status {status}")]
    RpcRejected {
        op: &'static str,
        order_id: Option<String>,
        status: u16,
    },

    #[error("insufficient balance: {reason}")]
    InsufficientBalance { reason: String },

    #[error("invariant violated: {reason}")]
    InvariantViolation { reason: String },

    #[error("fatal: {reason}")]
    Fatal { reason: String },
}

impl EngineError {
    pub fn fatal(reason: impl Into<String>) -> Self {
        EngineError::Fatal { reason: reason.into() }
    }

    pub fn invariant(reason: impl Into<String>) -> Self {
        EngineError::InvariantViolation { reason: reason.into() }
    }
}
