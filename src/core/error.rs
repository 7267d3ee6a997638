//! Engine error taxonomy
//!
//! Validation and not-found errors are reported to the caller and never
//! retried. Conflicts from the part registry are retried once internally
//! before surfacing. Store failures abort the whole operation; the
//! enclosing transaction guarantees no partial state is left behind.

use thiserror::Error;

use crate::core::store::StoreError;
use crate::entities::error_report::ErrorStatus;

/// Errors surfaced by the workflow engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("part {part_number} rev '{revision}' lost a concurrent create race and could not be re-resolved")]
    Conflict {
        part_number: String,
        revision: String,
    },

    #[error("exit control {id} still has {missing} unrecorded sample(s)")]
    IncompleteSampling { id: String, missing: usize },

    #[error("invalid error report transition: {from} -> {to}")]
    InvalidErrorTransition { from: ErrorStatus, to: ErrorStatus },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Shorthand for a not-found error
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        EngineError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }
}
