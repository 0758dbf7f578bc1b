#![forbid(unsafe_code)]

//! fieldflow public facade crate.
//!
//! This crate provides the stable, ergonomic surface area for users. It
//! re-exports common types from the internal crates and offers a lightweight
//! prelude for wiring a form.
//!
//! ```
//! use fieldflow::prelude::*;
//!
//! let schema = StaticSchema::new()
//!     .with_field(FieldDescriptor::new("username").with_rules(RuleMeta::unique()));
//! let orchestrator = Orchestrator::new(schema);
//! assert!(orchestrator.has_async_validation("username"));
//! assert_eq!(orchestrator.status("username"), ValidationStatus::Idle);
//! ```

// --- Core re-exports -------------------------------------------------------

pub use fieldflow_core::{
    BehaviorFlags, EventBus, EventKind, FieldDescriptor, FieldErrors, FieldRecord, FieldValue,
    FnEvaluator, ListenerId, ListenerPattern, OrchestratorError, Result, RuleEvaluator, RuleMeta,
    Schema, StateManager, StaticSchema, ValidationConfig, ValidationEvent, ValidationOutcome,
    ValidationStatus, ValidationSummary, ValueSnapshot,
};

// --- Runtime re-exports ----------------------------------------------------

#[cfg(feature = "runtime")]
pub use fieldflow_runtime::{
    ClientValidationResult, Debouncer, FieldValidationContext, FormValidationResponse,
    Orchestrator, Trigger, TriggerOutcome, select_trigger,
};

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        BehaviorFlags, EventKind, FieldDescriptor, FieldValue, FnEvaluator, OrchestratorError,
        Result, RuleEvaluator, RuleMeta, Schema, StaticSchema, ValidationConfig, ValidationEvent,
        ValidationOutcome, ValidationStatus, ValueSnapshot,
    };

    #[cfg(feature = "runtime")]
    pub use crate::{ClientValidationResult, Orchestrator, Trigger, TriggerOutcome};

    pub use crate::core;
    #[cfg(feature = "runtime")]
    pub use crate::runtime;
}

pub use fieldflow_core as core;
#[cfg(feature = "runtime")]
pub use fieldflow_runtime as runtime;
