#![forbid(unsafe_code)]

//! The rule evaluator collaborator seam.
//!
//! An evaluator turns a field, a candidate value, and the full value snapshot
//! into a list of human-readable messages. An empty list means the value
//! passed. Evaluators never fail: if one cannot reach a dependency, reporting
//! that is its own business (usually as a message).

use std::collections::BTreeMap;

use crate::schema::{FieldDescriptor, Schema};
use crate::{FieldValue, ValueSnapshot};

/// Error messages keyed by field name.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Evaluates validation rules for fields.
///
/// Implementations may block for as long as they need (a uniqueness check
/// against a datastore, say). The orchestrator never holds a lock while
/// calling in.
pub trait RuleEvaluator: Send + Sync {
    /// Validate one field's candidate value.
    fn validate_field(
        &self,
        field: &FieldDescriptor,
        value: &FieldValue,
        values: &ValueSnapshot,
    ) -> Vec<String>;

    /// Validate every field in `schema` against `values` in one batch.
    ///
    /// The default walks the schema and calls [`validate_field`] with each
    /// field's snapshot value (`null` when absent). Fields that pass may be
    /// omitted from the result.
    ///
    /// [`validate_field`]: RuleEvaluator::validate_field
    fn validate_all(&self, schema: &dyn Schema, values: &ValueSnapshot) -> FieldErrors {
        let null = FieldValue::Null;
        schema
            .fields()
            .into_iter()
            .filter_map(|field| {
                let value = values.get(&field.name).unwrap_or(&null);
                let errors = self.validate_field(&field, value, values);
                (!errors.is_empty()).then(|| (field.name, errors))
            })
            .collect()
    }
}

/// A [`RuleEvaluator`] backed by a closure.
///
/// ```
/// use fieldflow_core::{FieldValue, FnEvaluator, RuleEvaluator, FieldDescriptor};
/// use std::collections::HashMap;
///
/// let eval = FnEvaluator::new(|field: &FieldDescriptor, value: &FieldValue, _: &_| {
///     if field.required && value.as_str().is_none_or(str::is_empty) {
///         vec!["required".to_string()]
///     } else {
///         Vec::new()
///     }
/// });
///
/// let email = FieldDescriptor::new("email").required();
/// let errors = eval.validate_field(&email, &FieldValue::from(""), &HashMap::new());
/// assert_eq!(errors, ["required"]);
/// ```
pub struct FnEvaluator<F> {
    check: F,
}

impl<F> FnEvaluator<F>
where
    F: Fn(&FieldDescriptor, &FieldValue, &ValueSnapshot) -> Vec<String> + Send + Sync,
{
    /// Wrap a closure.
    pub fn new(check: F) -> Self {
        Self { check }
    }
}

impl<F> RuleEvaluator for FnEvaluator<F>
where
    F: Fn(&FieldDescriptor, &FieldValue, &ValueSnapshot) -> Vec<String> + Send + Sync,
{
    fn validate_field(
        &self,
        field: &FieldDescriptor,
        value: &FieldValue,
        values: &ValueSnapshot,
    ) -> Vec<String> {
        (self.check)(field, value, values)
    }
}

impl<F> std::fmt::Debug for FnEvaluator<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnEvaluator").finish_non_exhaustive()
    }
}
