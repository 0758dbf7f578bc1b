#![forbid(unsafe_code)]

//! Validation timing and behavior configuration.
//!
//! A [`ValidationConfig`] is treated as an immutable value: the orchestrator
//! holds it behind an `Arc`, every validation cycle captures the `Arc` it saw
//! at its start, and replacing the configuration swaps the pointer. A cycle
//! that is already running keeps using the configuration it started with.
//!
//! # Defaults
//!
//! | Knob | Default |
//! |------|---------|
//! | debounce delay | 300 ms |
//! | blur delay | 100 ms |
//! | async timeout (advisory) | 5 s |
//! | validate on change / on blur | on |
//! | clear errors on change | on |
//! | client rule shortcuts | on |
//! | show errors only on blur | off |
//! | reject stale results | off |
//!
//! A zero field override falls back to the configured debounce delay, and a
//! zero configured delay to [`DEFAULT_DEBOUNCE_DELAY`] (see
//! [`ValidationConfig::effective_debounce`]).

use std::time::Duration;

/// Debounce delay used by default and in place of a zero delay.
pub const DEFAULT_DEBOUNCE_DELAY: Duration = Duration::from_millis(300);

bitflags::bitflags! {
    /// Behavior switches for the orchestrator.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct BehaviorFlags: u8 {
        /// Route field changes into validation.
        const VALIDATE_ON_CHANGE = 1 << 0;
        /// Route field blurs into validation.
        const VALIDATE_ON_BLUR = 1 << 1;
        /// Renderers should only surface errors once a field has blurred.
        const SHOW_ERRORS_ONLY_ON_BLUR = 1 << 2;
        /// Debounced changes reset the field to Idle before the delay elapses.
        const CLEAR_ERRORS_ON_CHANGE = 1 << 3;
        /// Accept client-side rule results as shortcuts.
        const CLIENT_RULES = 1 << 4;
        /// Discard terminal updates from superseded validation attempts.
        const REJECT_STALE_RESULTS = 1 << 5;
    }
}

impl Default for BehaviorFlags {
    fn default() -> Self {
        Self::VALIDATE_ON_CHANGE
            | Self::VALIDATE_ON_BLUR
            | Self::CLEAR_ERRORS_ON_CHANGE
            | Self::CLIENT_RULES
    }
}

/// Process-wide validation configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValidationConfig {
    /// Fields that always validate immediately on change.
    pub immediate_fields: Vec<String>,
    /// Quiet period before a debounced validation fires.
    #[cfg_attr(feature = "serde", serde(with = "millis"))]
    pub debounce_delay: Duration,
    /// Settle delay before an on-blur validation reads its value.
    #[cfg_attr(feature = "serde", serde(with = "millis"))]
    pub blur_delay: Duration,
    /// Advisory budget for slow rule evaluation. Not enforced internally.
    #[cfg_attr(feature = "serde", serde(with = "millis"))]
    pub async_timeout: Duration,
    /// Behavior switches.
    pub flags: BehaviorFlags,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            immediate_fields: Vec::new(),
            debounce_delay: DEFAULT_DEBOUNCE_DELAY,
            blur_delay: Duration::from_millis(100),
            async_timeout: Duration::from_secs(5),
            flags: BehaviorFlags::default(),
        }
    }
}

impl ValidationConfig {
    /// The delay a debounced validation actually waits: a non-zero field
    /// override, else a non-zero configured delay, else
    /// [`DEFAULT_DEBOUNCE_DELAY`].
    #[must_use]
    pub fn effective_debounce(&self, field_override: Option<Duration>) -> Duration {
        field_override
            .filter(|d| !d.is_zero())
            .or_else(|| Some(self.debounce_delay).filter(|d| !d.is_zero()))
            .unwrap_or(DEFAULT_DEBOUNCE_DELAY)
    }

    /// Set the debounce delay.
    #[must_use]
    pub fn with_debounce_delay(mut self, delay: Duration) -> Self {
        self.debounce_delay = delay;
        self
    }

    /// Set the on-blur settle delay.
    #[must_use]
    pub fn with_blur_delay(mut self, delay: Duration) -> Self {
        self.blur_delay = delay;
        self
    }

    /// Set the advisory async timeout.
    #[must_use]
    pub fn with_async_timeout(mut self, timeout: Duration) -> Self {
        self.async_timeout = timeout;
        self
    }

    /// Force a field to the Immediate trigger on change.
    #[must_use]
    pub fn with_immediate_field(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        if !self.immediate_fields.contains(&field) {
            self.immediate_fields.push(field);
        }
        self
    }

    /// Replace the whole behavior flag set.
    #[must_use]
    pub fn with_flags(mut self, flags: BehaviorFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Turn a single behavior flag on or off.
    #[must_use]
    pub fn with_flag(mut self, flag: BehaviorFlags, enabled: bool) -> Self {
        self.flags.set(flag, enabled);
        self
    }

    /// Whether `field` is in the immediate-field list.
    #[must_use]
    pub fn is_immediate_field(&self, field: &str) -> bool {
        self.immediate_fields.iter().any(|f| f == field)
    }

    #[must_use]
    pub fn validate_on_change(&self) -> bool {
        self.flags.contains(BehaviorFlags::VALIDATE_ON_CHANGE)
    }

    #[must_use]
    pub fn validate_on_blur(&self) -> bool {
        self.flags.contains(BehaviorFlags::VALIDATE_ON_BLUR)
    }

    #[must_use]
    pub fn show_errors_only_on_blur(&self) -> bool {
        self.flags.contains(BehaviorFlags::SHOW_ERRORS_ONLY_ON_BLUR)
    }

    #[must_use]
    pub fn clear_errors_on_change(&self) -> bool {
        self.flags.contains(BehaviorFlags::CLEAR_ERRORS_ON_CHANGE)
    }

    #[must_use]
    pub fn client_rules_enabled(&self) -> bool {
        self.flags.contains(BehaviorFlags::CLIENT_RULES)
    }

    #[must_use]
    pub fn reject_stale_results(&self) -> bool {
        self.flags.contains(BehaviorFlags::REJECT_STALE_RESULTS)
    }
}

// ---------------------------------------------------------------------------
// Duration (de)serialization as whole milliseconds
// ---------------------------------------------------------------------------

#[cfg(feature = "serde")]
#[doc(hidden)]
pub mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(feature = "serde")]
pub(crate) mod opt_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
    }
}
