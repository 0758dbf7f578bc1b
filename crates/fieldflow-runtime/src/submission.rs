#![forbid(unsafe_code)]

//! Value types exchanged with form handlers and renderers.

use std::time::{Duration, SystemTime};

use fieldflow_core::{FieldErrors, FieldValue, ValidationStatus};

/// Result of a whole-form submission check.
///
/// `is_valid == false` is an ordinary answer; the per-field messages are in
/// `field_errors`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FormValidationResponse {
    pub is_valid: bool,
    /// Messages for failing fields only.
    pub field_errors: FieldErrors,
    /// Total number of messages across all fields.
    pub error_count: usize,
    /// Some field was still validating when the response was built.
    pub is_validating: bool,
    /// Fields with a debounced validation still outstanding.
    pub pending_fields: Vec<String>,
    pub touched_fields: Vec<String>,
    pub dirty_fields: Vec<String>,
    pub timestamp: SystemTime,
}

impl FormValidationResponse {
    pub(crate) fn new(field_errors: FieldErrors) -> Self {
        let error_count = field_errors.values().map(Vec::len).sum();
        Self {
            is_valid: error_count == 0,
            field_errors,
            error_count,
            is_validating: false,
            pending_fields: Vec::new(),
            touched_fields: Vec::new(),
            dirty_fields: Vec::new(),
            timestamp: SystemTime::now(),
        }
    }
}

/// A validation result computed on the client and reported back.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClientValidationResult {
    /// The value the client checked.
    pub value: FieldValue,
    /// The client's messages; empty when its checks passed.
    #[cfg_attr(feature = "serde", serde(default))]
    pub errors: Vec<String>,
}

impl ClientValidationResult {
    /// A passing client check.
    #[must_use]
    pub fn passed(value: impl Into<FieldValue>) -> Self {
        Self {
            value: value.into(),
            errors: Vec::new(),
        }
    }

    /// A failing client check.
    #[must_use]
    pub fn failed(value: impl Into<FieldValue>, errors: Vec<String>) -> Self {
        Self {
            value: value.into(),
            errors,
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Everything a renderer needs to draw one field's validation state.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldValidationContext {
    pub field: String,
    pub status: ValidationStatus,
    pub is_validating: bool,
    /// The field's rules include a uniqueness check or a custom rule.
    pub has_async_validation: bool,
    pub errors: Vec<String>,
    pub touched: bool,
    /// The field has lost focus at least once.
    pub blurred: bool,
    /// Errors should be hidden until the field has blurred.
    pub errors_deferred: bool,
    pub last_validated_at: Option<SystemTime>,
    /// Effective debounce delay for the field.
    #[cfg_attr(feature = "serde", serde(with = "fieldflow_core::config::millis"))]
    pub debounce: Duration,
}

impl FieldValidationContext {
    /// Whether a renderer should show the field's errors now.
    #[must_use]
    pub fn should_show_errors(&self) -> bool {
        !self.errors.is_empty() && (!self.errors_deferred || self.blurred)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_counts_messages() {
        let mut errors = FieldErrors::new();
        errors.insert("a".into(), vec!["x".into(), "y".into()]);
        errors.insert("b".into(), vec!["z".into()]);
        let response = FormValidationResponse::new(errors);
        assert!(!response.is_valid);
        assert_eq!(response.error_count, 3);

        assert!(FormValidationResponse::new(FieldErrors::new()).is_valid);
    }

    #[test]
    fn client_result_validity() {
        assert!(ClientValidationResult::passed("bob").is_valid());
        assert!(!ClientValidationResult::failed("", vec!["required".into()]).is_valid());
    }

    #[test]
    fn deferred_errors_wait_for_blur() {
        let mut ctx = FieldValidationContext {
            field: "email".into(),
            status: ValidationStatus::Invalid,
            is_validating: false,
            has_async_validation: false,
            errors: vec!["required".into()],
            touched: true,
            blurred: false,
            errors_deferred: true,
            last_validated_at: None,
            debounce: Duration::from_millis(300),
        };
        assert!(!ctx.should_show_errors());
        ctx.blurred = true;
        assert!(ctx.should_show_errors());
        ctx.errors_deferred = false;
        ctx.blurred = false;
        assert!(ctx.should_show_errors());
    }
}
