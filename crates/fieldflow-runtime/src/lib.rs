#![forbid(unsafe_code)]

//! fieldflow Runtime
//!
//! This crate decides *when* form fields validate and merges the outcomes
//! into the shared state that renderers read.
//!
//! # Key Components
//!
//! - [`Orchestrator`] - Public entry point: per-field triggers, whole-form
//!   validation, submission and client-result handling
//! - [`Debouncer`] - Per-key delayed, cancellable actions
//! - [`Trigger`] - Timing modes and the [`select_trigger`] policy
//! - [`FormValidationResponse`] / [`FieldValidationContext`] - Views for form
//!   handlers and renderers
//!
//! # Role in fieldflow
//! `fieldflow-runtime` composes the leaves from `fieldflow-core` (state
//! manager, event bus, configuration) with the caller-supplied schema and
//! rule evaluator. It owns all timing: debounce threads and the blocking
//! blur settle delay.

pub mod debouncer;
pub mod orchestrator;
pub mod submission;
pub mod trigger;

pub use debouncer::Debouncer;
pub use orchestrator::{Orchestrator, TriggerOutcome};
pub use submission::{ClientValidationResult, FieldValidationContext, FormValidationResponse};
pub use trigger::{Trigger, select_trigger};
