#![forbid(unsafe_code)]

//! Authoritative per-field validation state.
//!
//! The [`StateManager`] owns one [`FieldRecord`] per field name plus the full
//! value snapshot. Records are created lazily the first time a field is
//! written and are never removed; resetting a field returns it to
//! [`ValidationStatus::Idle`].
//!
//! # Invariants
//!
//! 1. A record's `errors` is non-empty if and only if its status is
//!    [`ValidationStatus::Invalid`]. Every mutator preserves this.
//! 2. `attempt` is strictly increasing per field; each validation cycle that
//!    begins takes the next number.
//!
//! # State machine
//!
//! ```text
//!   Idle ──► Validating ──► Valid | Invalid
//!                ▲                 │
//!                └─────────────────┘      any ──► Idle (reset)
//! ```
//!
//! Transitions outside this machine are still applied (concurrent triggers on
//! one field resolve as last write wins) but are logged at `warn` level.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;

use crate::{FieldValue, ValueSnapshot};

// ---------------------------------------------------------------------------
// ValidationStatus
// ---------------------------------------------------------------------------

/// Where a field is in its validation lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ValidationStatus {
    /// Not validated, or reset.
    #[default]
    Idle,
    /// A validation cycle is running.
    Validating,
    /// The last completed cycle found no problems.
    Valid,
    /// The last completed cycle produced error messages.
    Invalid,
}

impl ValidationStatus {
    /// Stable lowercase name, for logs and renderer attributes.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Valid => "valid",
            Self::Invalid => "invalid",
        }
    }

    /// Whether `self → next` is an edge of the state machine.
    ///
    /// Staying in the same state and resetting to `Idle` are always allowed.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (_, Self::Idle)
                | (Self::Idle, Self::Validating)
                | (Self::Validating, Self::Valid | Self::Invalid | Self::Validating)
                | (Self::Valid, Self::Validating | Self::Valid)
                | (Self::Invalid, Self::Validating | Self::Invalid)
        )
    }
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ValidationOutcome
// ---------------------------------------------------------------------------

/// The result of evaluating a field's rules.
///
/// A failed check is an ordinary outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ValidationOutcome {
    /// No messages.
    #[default]
    Valid,
    /// One or more messages. Never empty.
    Invalid(Vec<String>),
}

impl ValidationOutcome {
    /// Classify an evaluator's message list.
    #[must_use]
    pub fn from_errors(errors: Vec<String>) -> Self {
        if errors.is_empty() {
            Self::Valid
        } else {
            Self::Invalid(errors)
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// The messages, empty when valid.
    #[must_use]
    pub fn errors(&self) -> &[String] {
        match self {
            Self::Valid => &[],
            Self::Invalid(errors) => errors,
        }
    }

    /// The status a field lands in with this outcome.
    #[must_use]
    pub fn status(&self) -> ValidationStatus {
        match self {
            Self::Valid => ValidationStatus::Valid,
            Self::Invalid(_) => ValidationStatus::Invalid,
        }
    }
}

// ---------------------------------------------------------------------------
// FieldRecord
// ---------------------------------------------------------------------------

/// Validation state for one field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldRecord {
    status: ValidationStatus,
    errors: Vec<String>,
    touched: bool,
    dirty: bool,
    last_validated_at: Option<SystemTime>,
    attempt: u64,
}

impl FieldRecord {
    #[must_use]
    pub fn status(&self) -> ValidationStatus {
        self.status
    }

    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Set once the field has been validated by any trigger.
    #[must_use]
    pub fn touched(&self) -> bool {
        self.touched
    }

    /// Set when the field's value changed since it was last marked clean.
    #[must_use]
    pub fn dirty(&self) -> bool {
        self.dirty
    }

    /// Timestamp of the most recent validation event seen for the field.
    #[must_use]
    pub fn last_validated_at(&self) -> Option<SystemTime> {
        self.last_validated_at
    }

    /// Number of validation cycles begun for this field.
    #[must_use]
    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    fn transition(&mut self, field: &str, next: ValidationStatus) {
        #[cfg(not(feature = "tracing"))]
        let _ = field;
        if !self.status.can_transition_to(next) {
            crate::warn!(
                field = field,
                from = self.status.as_str(),
                to = next.as_str(),
                "validation status changed outside the state machine (last write wins)"
            );
        }
        crate::trace!(field = field, from = self.status.as_str(), to = next.as_str(), "status");
        self.status = next;
        if next != ValidationStatus::Invalid {
            self.errors.clear();
        }
    }

    fn apply(&mut self, field: &str, outcome: &ValidationOutcome) {
        self.transition(field, outcome.status());
        self.errors = outcome.errors().to_vec();
        self.touched = true;
    }
}

// ---------------------------------------------------------------------------
// ValidationSummary
// ---------------------------------------------------------------------------

/// Form-wide counts over every known record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValidationSummary {
    pub states: HashMap<String, ValidationStatus>,
    pub last_validated: HashMap<String, SystemTime>,
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub validating: usize,
}

impl ValidationSummary {
    /// No field is invalid and none is mid-validation.
    #[must_use]
    pub fn is_form_valid(&self) -> bool {
        self.invalid == 0 && self.validating == 0
    }

    #[must_use]
    pub fn is_form_validating(&self) -> bool {
        self.validating > 0
    }
}

// ---------------------------------------------------------------------------
// StateManager
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct StateInner {
    records: HashMap<String, FieldRecord>,
    values: ValueSnapshot,
}

impl StateInner {
    fn record_mut(&mut self, field: &str) -> &mut FieldRecord {
        self.records.entry(field.to_owned()).or_default()
    }
}

/// Thread-safe store of field records and the value snapshot.
///
/// Every method takes the internal lock only for its own duration; no lock is
/// held across calls. A poisoned lock is recovered, since every mutation
/// leaves a record consistent before it can panic.
#[derive(Debug, Default)]
pub struct StateManager {
    inner: RwLock<StateInner>,
}

impl StateManager {
    /// Create an empty state manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, StateInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StateInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    // -- status -------------------------------------------------------------

    /// Current status; `Idle` for a field never written.
    #[must_use]
    pub fn status(&self, field: &str) -> ValidationStatus {
        self.read()
            .records
            .get(field)
            .map_or(ValidationStatus::Idle, FieldRecord::status)
    }

    /// Set a field's status.
    ///
    /// Moving to any status other than `Invalid` clears the field's errors.
    /// Moving to `Invalid` requires errors to already be recorded (see
    /// [`set_errors`](Self::set_errors)); otherwise the call is refused and
    /// returns `false`.
    pub fn set_status(&self, field: &str, status: ValidationStatus) -> bool {
        let mut inner = self.write();
        let record = inner.record_mut(field);
        if status == ValidationStatus::Invalid && record.errors.is_empty() {
            crate::warn!(field = field, "refusing Invalid status without error messages");
            return false;
        }
        record.transition(field, status);
        true
    }

    /// Begin a validation cycle: status becomes `Validating`, errors clear,
    /// and the field's attempt counter advances. Returns the new attempt.
    pub fn begin_validation(&self, field: &str) -> u64 {
        let mut inner = self.write();
        let record = inner.record_mut(field);
        record.transition(field, ValidationStatus::Validating);
        record.attempt += 1;
        record.attempt
    }

    /// Record a completed cycle's outcome and mark the field touched.
    pub fn apply_outcome(&self, field: &str, outcome: &ValidationOutcome) {
        self.write().record_mut(field).apply(field, outcome);
    }

    /// Like [`apply_outcome`](Self::apply_outcome), but only when `attempt` is
    /// still the field's latest. Returns whether the outcome was applied.
    pub fn apply_outcome_if_current(
        &self,
        field: &str,
        attempt: u64,
        outcome: &ValidationOutcome,
    ) -> bool {
        let mut inner = self.write();
        let record = inner.record_mut(field);
        if record.attempt != attempt {
            crate::debug!(
                field = field,
                attempt = attempt,
                latest = record.attempt,
                "discarding stale validation outcome"
            );
            return false;
        }
        record.apply(field, outcome);
        true
    }

    /// Return the field to `Idle` and clear its errors.
    pub fn reset(&self, field: &str) {
        self.write()
            .record_mut(field)
            .transition(field, ValidationStatus::Idle);
    }

    /// Whether any field currently has `status`.
    #[must_use]
    pub fn has_fields_in_state(&self, status: ValidationStatus) -> bool {
        self.read().records.values().any(|r| r.status == status)
    }

    /// Every field currently in `status`, sorted by name.
    #[must_use]
    pub fn fields_in_state(&self, status: ValidationStatus) -> Vec<String> {
        let mut fields: Vec<String> = self
            .read()
            .records
            .iter()
            .filter(|(_, r)| r.status == status)
            .map(|(name, _)| name.clone())
            .collect();
        fields.sort();
        fields
    }

    // -- errors -------------------------------------------------------------

    #[must_use]
    pub fn field_errors(&self, field: &str) -> Vec<String> {
        self.read()
            .records
            .get(field)
            .map(|r| r.errors.clone())
            .unwrap_or_default()
    }

    /// Record error messages. Non-empty errors make the field `Invalid`;
    /// an empty list behaves like [`clear_errors`](Self::clear_errors).
    pub fn set_errors(&self, field: &str, errors: Vec<String>) {
        let mut inner = self.write();
        let record = inner.record_mut(field);
        if errors.is_empty() {
            if record.status == ValidationStatus::Invalid {
                record.transition(field, ValidationStatus::Idle);
            }
            record.errors.clear();
        } else {
            record.transition(field, ValidationStatus::Invalid);
            record.errors = errors;
        }
    }

    /// Clear a field's errors. An `Invalid` field drops back to `Idle`.
    pub fn clear_errors(&self, field: &str) {
        self.set_errors(field, Vec::new());
    }

    // -- touched / timestamps -----------------------------------------------

    #[must_use]
    pub fn is_touched(&self, field: &str) -> bool {
        self.read().records.get(field).is_some_and(|r| r.touched)
    }

    pub fn set_touched(&self, field: &str, touched: bool) {
        self.write().record_mut(field).touched = touched;
    }

    /// Every touched field, sorted by name.
    #[must_use]
    pub fn touched_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = self
            .read()
            .records
            .iter()
            .filter(|(_, r)| r.touched)
            .map(|(name, _)| name.clone())
            .collect();
        fields.sort();
        fields
    }

    #[must_use]
    pub fn last_validated_at(&self, field: &str) -> Option<SystemTime> {
        self.read()
            .records
            .get(field)
            .and_then(|r| r.last_validated_at)
    }

    pub fn set_validated_at(&self, field: &str, at: SystemTime) {
        self.write().record_mut(field).last_validated_at = Some(at);
    }

    /// The field's latest attempt number (0 if never validated).
    #[must_use]
    pub fn attempt(&self, field: &str) -> u64 {
        self.read().records.get(field).map_or(0, |r| r.attempt)
    }

    // -- values -------------------------------------------------------------

    /// Copy of the full value snapshot.
    #[must_use]
    pub fn values(&self) -> ValueSnapshot {
        self.read().values.clone()
    }

    #[must_use]
    pub fn value(&self, field: &str) -> Option<FieldValue> {
        self.read().values.get(field).cloned()
    }

    /// Store a field's value. The field becomes dirty if the value changed.
    pub fn set_value(&self, field: &str, value: FieldValue) {
        let mut inner = self.write();
        let changed = inner.values.get(field) != Some(&value);
        inner.values.insert(field.to_owned(), value);
        if changed {
            inner.record_mut(field).dirty = true;
        }
    }

    /// Store several values under one lock acquisition.
    pub fn set_values<I>(&self, values: I)
    where
        I: IntoIterator<Item = (String, FieldValue)>,
    {
        let mut inner = self.write();
        for (field, value) in values {
            if inner.values.get(&field) != Some(&value) {
                inner.record_mut(&field).dirty = true;
            }
            inner.values.insert(field, value);
        }
    }

    #[must_use]
    pub fn is_dirty(&self, field: &str) -> bool {
        self.read().records.get(field).is_some_and(|r| r.dirty)
    }

    pub fn mark_dirty(&self, field: &str, dirty: bool) {
        self.write().record_mut(field).dirty = dirty;
    }

    /// Every dirty field, sorted by name.
    #[must_use]
    pub fn dirty_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = self
            .read()
            .records
            .iter()
            .filter(|(_, r)| r.dirty)
            .map(|(name, _)| name.clone())
            .collect();
        fields.sort();
        fields
    }

    // -- inspection ---------------------------------------------------------

    /// Copy of a field's record, if one exists.
    #[must_use]
    pub fn record(&self, field: &str) -> Option<FieldRecord> {
        self.read().records.get(field).cloned()
    }

    #[must_use]
    pub fn summary(&self) -> ValidationSummary {
        let inner = self.read();
        let mut summary = ValidationSummary {
            total: inner.records.len(),
            ..ValidationSummary::default()
        };
        for (name, record) in &inner.records {
            summary.states.insert(name.clone(), record.status);
            if let Some(at) = record.last_validated_at {
                summary.last_validated.insert(name.clone(), at);
            }
            match record.status {
                ValidationStatus::Valid => summary.valid += 1,
                ValidationStatus::Invalid => summary.invalid += 1,
                ValidationStatus::Validating => summary.validating += 1,
                ValidationStatus::Idle => {}
            }
        }
        summary
    }
}
