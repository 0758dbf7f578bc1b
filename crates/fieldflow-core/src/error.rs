#![forbid(unsafe_code)]

//! Setup and caller errors surfaced by the orchestrator.
//!
//! Only defects are errors here. A rule evaluator that returns messages has
//! succeeded; its messages become [`ValidationOutcome::Invalid`] data, never
//! an `Err`.
//!
//! [`ValidationOutcome::Invalid`]: crate::state::ValidationOutcome::Invalid

use std::fmt;

/// Errors returned to the immediate caller. Never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    /// No rule evaluator is wired into the orchestrator.
    NotConfigured,
    /// The schema has no field with this name.
    UnknownField {
        /// The name the caller asked for.
        field: String,
    },
}

impl OrchestratorError {
    /// Build an [`OrchestratorError::UnknownField`].
    #[must_use]
    pub fn unknown_field(field: impl Into<String>) -> Self {
        Self::UnknownField {
            field: field.into(),
        }
    }
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "no rule evaluator configured"),
            Self::UnknownField { field } => write!(f, "field {field} not found in schema"),
        }
    }
}

impl std::error::Error for OrchestratorError {}

/// Result alias for orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;
