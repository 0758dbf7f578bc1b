#![forbid(unsafe_code)]

//! Validation timing modes and the policy that picks one on field change.

use fieldflow_core::{FieldDescriptor, ValidationConfig};

/// When a validation call evaluates its rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Trigger {
    /// Evaluate now, on the calling thread.
    Immediate,
    /// Evaluate after a quiet period; later calls for the same field replace
    /// the pending one.
    Debounced,
    /// Wait the blur settle delay, then evaluate on the calling thread.
    OnBlur,
    /// Do not evaluate. The field returns to `Idle` and waits for a
    /// form-wide `validate_all`.
    OnSubmit,
}

impl Trigger {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::Debounced => "debounced",
            Self::OnBlur => "on_blur",
            Self::OnSubmit => "on_submit",
        }
    }

    /// Map a UI event name to a trigger.
    ///
    /// | Source | Trigger |
    /// |--------|---------|
    /// | `input`, `keyup` | Debounced |
    /// | `blur`, `focusout` | OnBlur |
    /// | `change` | Immediate |
    /// | `submit` | OnSubmit |
    /// | anything else | Debounced |
    #[must_use]
    pub fn from_source(source: &str) -> Self {
        match source {
            "change" => Self::Immediate,
            "blur" | "focusout" => Self::OnBlur,
            "submit" => Self::OnSubmit,
            _ => Self::Debounced,
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick the trigger for a field change.
///
/// In priority order: the configured immediate-field list, then required
/// fields (both Immediate); everything else, including fields with costly
/// uniqueness or custom rules and fields the schema does not know, is
/// Debounced.
#[must_use]
pub fn select_trigger(
    config: &ValidationConfig,
    field: &str,
    descriptor: Option<&FieldDescriptor>,
) -> Trigger {
    if config.is_immediate_field(field) {
        return Trigger::Immediate;
    }
    let Some(descriptor) = descriptor else {
        return Trigger::Debounced;
    };
    // Costly rules (has_async_rules) debounce like every other optional field.
    if descriptor.required {
        Trigger::Immediate
    } else {
        Trigger::Debounced
    }
}
