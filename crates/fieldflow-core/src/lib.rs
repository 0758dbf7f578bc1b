#![forbid(unsafe_code)]

//! Core: field schema, validation state, events, and configuration.
//!
//! # Role in fieldflow
//! `fieldflow-core` holds the leaf components the orchestration runtime
//! composes: the [`state::StateManager`] that owns every field's validation
//! record, the [`event::EventBus`] that fans validation events out to
//! renderers, the [`config::ValidationConfig`] timing knobs, and the two
//! collaborator seams ([`schema::Schema`] and [`evaluator::RuleEvaluator`]).
//!
//! Nothing here schedules work or sleeps; timing lives in `fieldflow-runtime`.

use std::collections::HashMap;

pub mod config;
pub mod error;
pub mod evaluator;
pub mod event;
pub mod logging;
pub mod schema;
pub mod state;

// Re-export tracing macros at crate root for ergonomic use.
#[cfg(feature = "tracing")]
pub use logging::{debug, error, trace, warn};

pub use config::{BehaviorFlags, DEFAULT_DEBOUNCE_DELAY, ValidationConfig};
pub use error::{OrchestratorError, Result};
pub use evaluator::{FieldErrors, FnEvaluator, RuleEvaluator};
pub use event::{EventBus, EventKind, ListenerId, ListenerPattern, ValidationEvent};
pub use schema::{FieldDescriptor, RuleMeta, Schema, StaticSchema};
pub use state::{FieldRecord, StateManager, ValidationOutcome, ValidationStatus, ValidationSummary};

/// A candidate value for a single field.
pub type FieldValue = serde_json::Value;

/// The full current value set, keyed by field name.
///
/// Rules that depend on other fields ("confirm password matches password")
/// read from this snapshot.
pub type ValueSnapshot = HashMap<String, FieldValue>;
