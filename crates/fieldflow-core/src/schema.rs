#![forbid(unsafe_code)]

//! Field descriptors and the schema collaborator seam.
//!
//! The orchestrator never interprets validation rules. It only reads the
//! handful of descriptor facts that drive timing decisions: whether the field
//! is required, and whether its rules include a uniqueness check or a named
//! custom rule (the expensive, possibly remote checks).

use std::collections::HashMap;
use std::time::Duration;

// ---------------------------------------------------------------------------
// RuleMeta
// ---------------------------------------------------------------------------

/// Rule metadata that affects validation timing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RuleMeta {
    /// The value must be unique (typically a datastore lookup).
    pub unique: bool,
    /// Identifier of a named custom rule, if any.
    pub custom: Option<String>,
}

impl RuleMeta {
    /// Metadata for a uniqueness-checked field.
    #[must_use]
    pub fn unique() -> Self {
        Self {
            unique: true,
            custom: None,
        }
    }

    /// Metadata for a field validated by a named custom rule.
    #[must_use]
    pub fn custom(rule: impl Into<String>) -> Self {
        Self {
            unique: false,
            custom: Some(rule.into()),
        }
    }

    /// Whether these rules are the costly kind (uniqueness or custom).
    #[must_use]
    pub fn is_costly(&self) -> bool {
        self.unique || self.custom.as_deref().is_some_and(|c| !c.is_empty())
    }
}

// ---------------------------------------------------------------------------
// FieldDescriptor
// ---------------------------------------------------------------------------

/// What the schema knows about one field.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldDescriptor {
    /// Field name, unique within a schema.
    pub name: String,
    /// The field must carry a non-empty value.
    pub required: bool,
    /// Optional rule metadata.
    pub rules: Option<RuleMeta>,
    /// Per-field debounce override; wins over the configured delay.
    #[cfg_attr(feature = "serde", serde(default, with = "crate::config::opt_millis"))]
    pub debounce: Option<Duration>,
}

impl FieldDescriptor {
    /// Create an optional field with no rule metadata.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
            rules: None,
            debounce: None,
        }
    }

    /// Mark the field required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Attach rule metadata.
    #[must_use]
    pub fn with_rules(mut self, rules: RuleMeta) -> Self {
        self.rules = Some(rules);
        self
    }

    /// Override the debounce delay for this field.
    #[must_use]
    pub fn with_debounce(mut self, delay: Duration) -> Self {
        self.debounce = Some(delay);
        self
    }

    /// Whether the field's rules include a uniqueness check or a custom rule.
    ///
    /// These are the checks assumed to need a server round trip.
    #[must_use]
    pub fn has_async_rules(&self) -> bool {
        self.rules.as_ref().is_some_and(RuleMeta::is_costly)
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// The schema collaborator: field existence and ordered field listing.
pub trait Schema: Send + Sync {
    /// Look up a field by name.
    fn field(&self, name: &str) -> Option<FieldDescriptor>;

    /// Every field, in schema order.
    fn fields(&self) -> Vec<FieldDescriptor>;
}

/// An ordered, in-memory schema.
///
/// Declaring the same name twice replaces the earlier descriptor in place,
/// keeping its position.
#[derive(Debug, Clone, Default)]
pub struct StaticSchema {
    fields: Vec<FieldDescriptor>,
    index: HashMap<String, usize>,
}

impl StaticSchema {
    /// Create an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field (builder style).
    #[must_use]
    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.insert(field);
        self
    }

    /// Add or replace a field.
    pub fn insert(&mut self, field: FieldDescriptor) {
        if let Some(&slot) = self.index.get(&field.name) {
            self.fields[slot] = field;
        } else {
            self.index.insert(field.name.clone(), self.fields.len());
            self.fields.push(field);
        }
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the schema has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<FieldDescriptor> for StaticSchema {
    fn from_iter<I: IntoIterator<Item = FieldDescriptor>>(iter: I) -> Self {
        let mut schema = Self::new();
        for field in iter {
            schema.insert(field);
        }
        schema
    }
}

impl Schema for StaticSchema {
    fn field(&self, name: &str) -> Option<FieldDescriptor> {
        self.index.get(name).map(|&i| self.fields[i].clone())
    }

    fn fields(&self) -> Vec<FieldDescriptor> {
        self.fields.clone()
    }
}
