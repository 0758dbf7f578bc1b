#![forbid(unsafe_code)]

//! The validation orchestrator.
//!
//! # Flow
//!
//! ```text
//!   caller ──► Orchestrator ──► Debouncer (Debounced only)
//!                   │                │ timer fires
//!                   ▼                ▼
//!              Engine::run ◄─────────┘
//!                   │  begin: state Validating, emit Start
//!                   │  evaluator.validate_field(..)   (no locks held)
//!                   ▼
//!              Engine::finish: state Valid/Invalid, emit Success/Error
//! ```
//!
//! Every trigger that evaluates funnels into [`Engine::finish`], so the
//! state update always happens before the event is emitted.
//!
//! # Snapshots
//!
//! Configuration and collaborators live behind one `RwLock`. Each operation
//! clones the `Arc`s it needs under the read lock and releases it before
//! calling the evaluator; a replacement configuration only affects
//! operations that start after the swap.
//!
//! # Concurrency
//!
//! Two triggers racing on the same field resolve as last write wins. With
//! [`BehaviorFlags::REJECT_STALE_RESULTS`] set, a terminal update from an
//! attempt older than the field's latest is discarded instead.
//!
//! [`BehaviorFlags::REJECT_STALE_RESULTS`]: fieldflow_core::BehaviorFlags::REJECT_STALE_RESULTS

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread;
use std::time::Duration;

use fieldflow_core::{
    DEFAULT_DEBOUNCE_DELAY, EventBus, EventKind, FieldDescriptor, FieldErrors, FieldValue,
    OrchestratorError, Result, RuleEvaluator, Schema, StateManager, ValidationConfig,
    ValidationEvent, ValidationOutcome, ValidationStatus, ValidationSummary,
};

use crate::debouncer::Debouncer;
use crate::submission::{ClientValidationResult, FieldValidationContext, FormValidationResponse};
use crate::trigger::{Trigger, select_trigger};

// ---------------------------------------------------------------------------
// TriggerOutcome
// ---------------------------------------------------------------------------

/// What a validation call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Rules ran and the outcome was recorded.
    Completed(ValidationOutcome),
    /// A debounced validation was scheduled; the outcome arrives later via
    /// state and events.
    Scheduled,
    /// `OnSubmit`: no evaluation, the field was returned to `Idle`.
    Deferred,
    /// The matching behavior flag is off; only the value was stored.
    Skipped,
    /// Rules ran but a newer attempt had started, so the outcome was not
    /// recorded.
    Discarded(ValidationOutcome),
}

impl TriggerOutcome {
    /// The evaluated outcome, when rules ran.
    #[must_use]
    pub fn outcome(&self) -> Option<&ValidationOutcome> {
        match self {
            Self::Completed(o) | Self::Discarded(o) => Some(o),
            Self::Scheduled | Self::Deferred | Self::Skipped => None,
        }
    }

    /// Whether the call completed with a recorded valid outcome.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Completed(ValidationOutcome::Valid))
    }
}

// ---------------------------------------------------------------------------
// Shared configuration and collaborators
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct Shared {
    config: Arc<ValidationConfig>,
    schema: Arc<dyn Schema>,
    evaluator: Option<Arc<dyn RuleEvaluator>>,
}

impl Shared {
    fn evaluator(&self) -> Result<Arc<dyn RuleEvaluator>> {
        self.evaluator.clone().ok_or(OrchestratorError::NotConfigured)
    }

    fn descriptor(&self, field: &str) -> Result<FieldDescriptor> {
        self.schema
            .field(field)
            .ok_or_else(|| OrchestratorError::unknown_field(field))
    }
}

/// The delay a debounced validation of `descriptor` waits. Never zero, so
/// what is scheduled and what is reported to renderers agree.
fn debounce_delay(config: &ValidationConfig, descriptor: Option<&FieldDescriptor>) -> Duration {
    config.effective_debounce(descriptor.and_then(|d| d.debounce))
}

// ---------------------------------------------------------------------------
// Engine: the shared begin/finish steps
// ---------------------------------------------------------------------------

/// State and event handles, cloned into debounced actions.
#[derive(Clone)]
struct Engine {
    state: Arc<StateManager>,
    events: Arc<EventBus>,
}

impl Engine {
    fn begin(&self, field: &str) -> u64 {
        let attempt = self.state.begin_validation(field);
        self.events.emit(ValidationEvent::start(field));
        attempt
    }

    fn finish(
        &self,
        field: &str,
        attempt: u64,
        outcome: ValidationOutcome,
        reject_stale: bool,
    ) -> TriggerOutcome {
        let applied = if reject_stale {
            self.state.apply_outcome_if_current(field, attempt, &outcome)
        } else {
            self.state.apply_outcome(field, &outcome);
            true
        };
        if !applied {
            tracing::debug!(field = %field, attempt, "stale validation result discarded");
            return TriggerOutcome::Discarded(outcome);
        }

        let event = match &outcome {
            ValidationOutcome::Valid => ValidationEvent::success(field),
            ValidationOutcome::Invalid(errors) => ValidationEvent::error(field, errors.clone()),
        };
        tracing::trace!(
            field = %field,
            attempt,
            error_count = outcome.errors().len(),
            "validation finished"
        );
        self.events.emit(event);
        TriggerOutcome::Completed(outcome)
    }

    /// The immediate procedure: begin, evaluate against the current
    /// snapshot, finish.
    fn run(
        &self,
        descriptor: &FieldDescriptor,
        value: &FieldValue,
        evaluator: &dyn RuleEvaluator,
        config: &ValidationConfig,
    ) -> TriggerOutcome {
        let field = descriptor.name.as_str();
        let attempt = self.begin(field);
        let values = self.state.values();
        let errors = evaluator.validate_field(descriptor, value, &values);
        self.finish(
            field,
            attempt,
            ValidationOutcome::from_errors(errors),
            config.reject_stale_results(),
        )
    }

    fn emit(&self, event: ValidationEvent) {
        self.events.emit(event);
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Decides when each field validates and merges outcomes into shared state.
///
/// All methods take `&self`; share the orchestrator across threads with an
/// `Arc`. Dropping it cancels every pending debounced validation.
///
/// # Example
///
/// ```
/// use fieldflow_core::{FieldDescriptor, FieldValue, FnEvaluator, StaticSchema, ValidationStatus};
/// use fieldflow_runtime::Orchestrator;
///
/// let schema = StaticSchema::new().with_field(FieldDescriptor::new("email").required());
/// let orchestrator = Orchestrator::new(schema).with_evaluator(FnEvaluator::new(
///     |_field: &FieldDescriptor, value: &FieldValue, _: &_| {
///         if value.as_str().is_none_or(str::is_empty) {
///             vec!["required".to_string()]
///         } else {
///             Vec::new()
///         }
///     },
/// ));
///
/// orchestrator.on_field_change("email", "".into()).unwrap();
/// assert_eq!(orchestrator.status("email"), ValidationStatus::Invalid);
/// assert_eq!(orchestrator.field_errors("email"), ["required"]);
/// ```
pub struct Orchestrator {
    shared: RwLock<Shared>,
    engine: Engine,
    debouncer: Debouncer,
    blurred: Mutex<HashSet<String>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.snapshot();
        f.debug_struct("Orchestrator")
            .field("config", &shared.config)
            .field("evaluator", &shared.evaluator.is_some())
            .field("debouncer", &self.debouncer)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Create an orchestrator over `schema` with default configuration and no
    /// evaluator.
    #[must_use]
    pub fn new<S: Schema + 'static>(schema: S) -> Self {
        Self::with_state(schema, Arc::new(StateManager::new()))
    }

    /// Create an orchestrator that records into an existing state manager.
    #[must_use]
    pub fn with_state<S: Schema + 'static>(schema: S, state: Arc<StateManager>) -> Self {
        let config = ValidationConfig::default();
        let events = Arc::new(EventBus::new());

        let timestamps = Arc::clone(&state);
        events.add_listener("*", move |event: &ValidationEvent| {
            timestamps.set_validated_at(event.field(), event.timestamp());
        });

        Self {
            debouncer: Debouncer::new(DEFAULT_DEBOUNCE_DELAY),
            shared: RwLock::new(Shared {
                config: Arc::new(config),
                schema: Arc::new(schema),
                evaluator: None,
            }),
            engine: Engine { state, events },
            blurred: Mutex::new(HashSet::new()),
        }
    }

    /// Set the rule evaluator (builder style).
    #[must_use]
    pub fn with_evaluator<E: RuleEvaluator + 'static>(self, evaluator: E) -> Self {
        self.set_evaluator(evaluator);
        self
    }

    /// Replace the configuration (builder style).
    #[must_use]
    pub fn with_config(self, config: ValidationConfig) -> Self {
        self.replace_config(config);
        self
    }

    fn snapshot(&self) -> Shared {
        self.shared
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update(&self, f: impl FnOnce(&mut Shared)) {
        let mut shared = self.shared.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut *shared);
    }

    // -- configuration ------------------------------------------------------

    /// Swap in a new configuration. Validations already running keep the one
    /// they started with.
    pub fn replace_config(&self, config: ValidationConfig) {
        let config = Arc::new(config);
        tracing::debug!(
            debounce_ms = config.debounce_delay.as_millis() as u64,
            blur_ms = config.blur_delay.as_millis() as u64,
            "validation config replaced"
        );
        self.update(|shared| shared.config = config);
    }

    /// The current configuration snapshot.
    #[must_use]
    pub fn config(&self) -> Arc<ValidationConfig> {
        self.snapshot().config
    }

    pub fn set_evaluator<E: RuleEvaluator + 'static>(&self, evaluator: E) {
        let evaluator: Arc<dyn RuleEvaluator> = Arc::new(evaluator);
        self.update(|shared| shared.evaluator = Some(evaluator));
    }

    pub fn clear_evaluator(&self) {
        self.update(|shared| shared.evaluator = None);
    }

    pub fn set_schema<S: Schema + 'static>(&self, schema: S) {
        let schema: Arc<dyn Schema> = Arc::new(schema);
        self.update(|shared| shared.schema = schema);
    }

    /// The state manager validation outcomes are recorded into.
    #[must_use]
    pub fn state(&self) -> &Arc<StateManager> {
        &self.engine.state
    }

    /// The bus validation events are emitted on.
    #[must_use]
    pub fn events(&self) -> &Arc<EventBus> {
        &self.engine.events
    }

    // -- entry points -------------------------------------------------------

    /// Validate `field` with an explicit trigger.
    ///
    /// The value is stored in the snapshot first. Immediate and OnBlur return
    /// the outcome once evaluation completes; Debounced returns
    /// [`TriggerOutcome::Scheduled`] at once. OnSubmit runs no rules: the
    /// field is reset to `Idle` and left for [`validate_all`](Self::validate_all).
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::NotConfigured`] without an evaluator and
    /// [`OrchestratorError::UnknownField`] for a field the schema lacks.
    pub fn validate_field(
        &self,
        field: &str,
        value: FieldValue,
        trigger: Trigger,
    ) -> Result<TriggerOutcome> {
        self.dispatch(&self.snapshot(), field, value, trigger)
    }

    fn dispatch(
        &self,
        shared: &Shared,
        field: &str,
        value: FieldValue,
        trigger: Trigger,
    ) -> Result<TriggerOutcome> {
        let evaluator = shared.evaluator()?;
        let descriptor = shared.descriptor(field)?;
        let config = Arc::clone(&shared.config);
        tracing::debug!(field = %field, trigger = ?trigger, "validate field");

        self.engine.state.set_value(field, value.clone());

        match trigger {
            Trigger::Immediate => Ok(self
                .engine
                .run(&descriptor, &value, evaluator.as_ref(), &config)),
            Trigger::OnBlur => {
                thread::sleep(config.blur_delay);
                let value = self.engine.state.value(field).unwrap_or(value);
                Ok(self
                    .engine
                    .run(&descriptor, &value, evaluator.as_ref(), &config))
            }
            Trigger::Debounced => {
                self.schedule(descriptor, value, evaluator, config);
                Ok(TriggerOutcome::Scheduled)
            }
            Trigger::OnSubmit => {
                self.engine.begin(field);
                self.engine.state.reset(field);
                self.engine.emit(ValidationEvent::clear(field));
                Ok(TriggerOutcome::Deferred)
            }
        }
    }

    fn schedule(
        &self,
        descriptor: FieldDescriptor,
        value: FieldValue,
        evaluator: Arc<dyn RuleEvaluator>,
        config: Arc<ValidationConfig>,
    ) {
        let field = descriptor.name.clone();
        let delay = debounce_delay(&config, Some(&descriptor));

        if self.debouncer.cancel(&field) {
            self.engine.emit(ValidationEvent::cancel(&field));
        }
        if config.clear_errors_on_change() {
            self.engine.state.reset(&field);
            self.engine.emit(ValidationEvent::clear(&field));
        }

        let engine = self.engine.clone();
        let replaced = self.debouncer.schedule(field.clone(), delay, move || {
            engine.run(&descriptor, &value, evaluator.as_ref(), &config);
        });
        if replaced {
            self.engine.emit(ValidationEvent::cancel(&field));
        }
    }

    /// Validate every schema field against the current value snapshot in one
    /// evaluator batch.
    ///
    /// Every field ends `Valid` or `Invalid` with exactly one Success or Error
    /// event. Returns the messages for failing fields.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::NotConfigured`] without an evaluator.
    pub fn validate_all(&self) -> Result<FieldErrors> {
        let shared = self.snapshot();
        let evaluator = shared.evaluator()?;
        let fields = shared.schema.fields();
        tracing::debug!(field_count = fields.len(), "validate all");

        let attempts: Vec<(String, u64)> = fields
            .into_iter()
            .map(|f| {
                let attempt = self.engine.state.begin_validation(&f.name);
                (f.name, attempt)
            })
            .collect();

        let values = self.engine.state.values();
        let mut errors = evaluator.validate_all(shared.schema.as_ref(), &values);
        errors.retain(|_, messages| !messages.is_empty());

        let reject_stale = shared.config.reject_stale_results();
        for (field, attempt) in attempts {
            let outcome = ValidationOutcome::from_errors(
                errors.get(&field).cloned().unwrap_or_default(),
            );
            self.engine.finish(&field, attempt, outcome, reject_stale);
        }
        Ok(errors)
    }

    /// A field's value changed.
    ///
    /// With validate-on-change off the value is stored and
    /// [`TriggerOutcome::Skipped`] returned. Otherwise the trigger comes from
    /// [`select_trigger`]. Failed checks are reported through state and
    /// events, never as `Err`.
    ///
    /// # Errors
    ///
    /// Setup errors as for [`validate_field`](Self::validate_field).
    pub fn on_field_change(&self, field: &str, value: FieldValue) -> Result<TriggerOutcome> {
        let shared = self.snapshot();
        if !shared.config.validate_on_change() {
            self.engine.state.set_value(field, value);
            return Ok(TriggerOutcome::Skipped);
        }
        let descriptor = shared.schema.field(field);
        let trigger = select_trigger(&shared.config, field, descriptor.as_ref());
        self.dispatch(&shared, field, value, trigger)
    }

    /// A field lost focus. Blocks for the configured blur delay before
    /// evaluating.
    ///
    /// # Errors
    ///
    /// Setup errors as for [`validate_field`](Self::validate_field).
    pub fn on_field_blur(&self, field: &str, value: FieldValue) -> Result<TriggerOutcome> {
        self.blurred
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(field.to_owned());

        let shared = self.snapshot();
        if !shared.config.validate_on_blur() {
            self.engine.state.set_value(field, value);
            return Ok(TriggerOutcome::Skipped);
        }
        self.dispatch(&shared, field, value, Trigger::OnBlur)
    }

    /// Validate a field using the trigger mapped from a UI event name (see
    /// [`Trigger::from_source`]).
    ///
    /// # Errors
    ///
    /// Setup errors as for [`validate_field`](Self::validate_field).
    pub fn trigger_for_source(
        &self,
        field: &str,
        value: FieldValue,
        source: &str,
    ) -> Result<TriggerOutcome> {
        self.validate_field(field, value, Trigger::from_source(source))
    }

    /// Cancel every pending debounced validation, emitting a Cancel event for
    /// each. Records are kept. Safe to call repeatedly.
    pub fn cleanup(&self) {
        for field in self.debouncer.cancel_all() {
            self.engine.emit(ValidationEvent::cancel(field));
        }
    }

    // -- submission and client results --------------------------------------

    /// Store submitted values, validate the whole form, and summarize.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::NotConfigured`] without an evaluator.
    pub fn handle_form_submission<I>(&self, values: I) -> Result<FormValidationResponse>
    where
        I: IntoIterator<Item = (String, FieldValue)>,
    {
        self.engine.state.set_values(values);
        let errors = self.validate_all()?;

        let mut response = FormValidationResponse::new(errors);
        let state = &self.engine.state;
        response.is_validating = state.has_fields_in_state(ValidationStatus::Validating);
        response.pending_fields = self.debouncer.pending_keys();
        response.touched_fields = state.touched_fields();
        response.dirty_fields = state.dirty_fields();
        tracing::debug!(
            is_valid = response.is_valid,
            error_count = response.error_count,
            "form submission validated"
        );
        Ok(response)
    }

    /// Merge a client-side check into state.
    ///
    /// With client rules enabled, a client failure is recorded at once as
    /// `Invalid`. A client success is recorded as `Valid`, unless the field
    /// has uniqueness or custom rules, in which case it is re-validated
    /// Debounced. With client rules disabled the client result is ignored
    /// and the field is validated Debounced.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::UnknownField`] for a field the schema lacks, and
    /// [`OrchestratorError::NotConfigured`] when server validation is needed
    /// but no evaluator is set.
    pub fn handle_client_result(
        &self,
        field: &str,
        result: ClientValidationResult,
    ) -> Result<TriggerOutcome> {
        let shared = self.snapshot();
        let descriptor = shared.descriptor(field)?;
        let ClientValidationResult { value, errors } = result;

        if !shared.config.client_rules_enabled() || (errors.is_empty() && descriptor.has_async_rules())
        {
            return self.dispatch(&shared, field, value, Trigger::Debounced);
        }

        self.engine.state.set_value(field, value);
        let attempt = self.engine.begin(field);
        Ok(self.engine.finish(
            field,
            attempt,
            ValidationOutcome::from_errors(errors),
            shared.config.reject_stale_results(),
        ))
    }

    // -- accessors ----------------------------------------------------------

    #[must_use]
    pub fn status(&self, field: &str) -> ValidationStatus {
        self.engine.state.status(field)
    }

    #[must_use]
    pub fn field_errors(&self, field: &str) -> Vec<String> {
        self.engine.state.field_errors(field)
    }

    #[must_use]
    pub fn is_field_validating(&self, field: &str) -> bool {
        self.status(field) == ValidationStatus::Validating
    }

    /// Whether any field is mid-validation.
    #[must_use]
    pub fn is_validation_in_progress(&self) -> bool {
        self.engine
            .state
            .has_fields_in_state(ValidationStatus::Validating)
    }

    /// Fields with a debounced validation still pending, sorted.
    #[must_use]
    pub fn pending_validations(&self) -> Vec<String> {
        self.debouncer.pending_keys()
    }

    /// Whether the field's rules include a uniqueness check or custom rule.
    /// `false` for fields the schema does not know.
    #[must_use]
    pub fn has_async_validation(&self, field: &str) -> bool {
        self.snapshot()
            .schema
            .field(field)
            .is_some_and(|d| d.has_async_rules())
    }

    /// Effective debounce delay for a field.
    #[must_use]
    pub fn debounce_for(&self, field: &str) -> Duration {
        let shared = self.snapshot();
        debounce_delay(&shared.config, shared.schema.field(field).as_ref())
    }

    #[must_use]
    pub fn summary(&self) -> ValidationSummary {
        self.engine.state.summary()
    }

    /// Renderer view of one field.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::UnknownField`] for a field the schema lacks.
    pub fn validation_context(&self, field: &str) -> Result<FieldValidationContext> {
        let shared = self.snapshot();
        let descriptor = shared.descriptor(field)?;
        let record = self.engine.state.record(field).unwrap_or_default();
        let blurred = self
            .blurred
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(field);

        Ok(FieldValidationContext {
            field: field.to_owned(),
            status: record.status(),
            is_validating: record.status() == ValidationStatus::Validating,
            has_async_validation: descriptor.has_async_rules(),
            errors: record.errors().to_vec(),
            touched: record.touched(),
            blurred,
            errors_deferred: shared.config.show_errors_only_on_blur(),
            last_validated_at: record.last_validated_at(),
            debounce: debounce_delay(&shared.config, Some(&descriptor)),
        })
    }

    /// Number of events of `kind` recorded for `field` in the bus history.
    #[must_use]
    pub fn event_count(&self, field: &str, kind: EventKind) -> usize {
        self.engine
            .events
            .history_for(field)
            .iter()
            .filter(|e| e.kind() == kind)
            .count()
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.cleanup();
    }
}
