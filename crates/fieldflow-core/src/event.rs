#![forbid(unsafe_code)]

//! Validation events and the listener bus.
//!
//! Every status change the orchestrator makes is announced as a
//! [`ValidationEvent`]. Renderers subscribe by field name or with the
//! wildcard pattern `"*"`.
//!
//! # Delivery
//!
//! [`EventBus::emit`] records the event in a bounded history, snapshots the
//! matching listeners, releases the lock, and then calls each listener in
//! registration order on the emitting thread. Listeners may therefore add or
//! remove listeners, or emit further events, without deadlocking. A listener
//! that panics is logged and skipped; the remaining listeners still run.

use std::collections::{HashMap, VecDeque};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;

use crate::state::ValidationStatus;

/// Events kept in the bus history by default.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

// ---------------------------------------------------------------------------
// EventKind
// ---------------------------------------------------------------------------

/// What happened to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EventKind {
    /// A validation cycle began.
    Start,
    /// A cycle completed with no messages.
    Success,
    /// A cycle completed with messages.
    Error,
    /// A scheduled validation was superseded or cancelled before it ran.
    Cancel,
    /// The field's errors were cleared while input is still settling.
    Clear,
}

impl EventKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Success => "success",
            Self::Error => "error",
            Self::Cancel => "cancel",
            Self::Clear => "clear",
        }
    }

    /// The status a field is in once this event has been emitted.
    #[must_use]
    pub const fn implied_status(self) -> ValidationStatus {
        match self {
            Self::Start => ValidationStatus::Validating,
            Self::Success => ValidationStatus::Valid,
            Self::Error => ValidationStatus::Invalid,
            Self::Cancel | Self::Clear => ValidationStatus::Idle,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ValidationEvent
// ---------------------------------------------------------------------------

/// An immutable record of one validation lifecycle step.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValidationEvent {
    field: String,
    kind: EventKind,
    errors: Vec<String>,
    timestamp: SystemTime,
}

impl ValidationEvent {
    /// Build an event stamped with the current time.
    ///
    /// Errors are only carried by [`EventKind::Error`]; they are dropped for
    /// every other kind.
    #[must_use]
    pub fn new(field: impl Into<String>, kind: EventKind, errors: Vec<String>) -> Self {
        Self::at(field, kind, errors, SystemTime::now())
    }

    /// Build an event with an explicit timestamp.
    #[must_use]
    pub fn at(
        field: impl Into<String>,
        kind: EventKind,
        errors: Vec<String>,
        timestamp: SystemTime,
    ) -> Self {
        let errors = if kind == EventKind::Error {
            errors
        } else {
            Vec::new()
        };
        Self {
            field: field.into(),
            kind,
            errors,
            timestamp,
        }
    }

    #[must_use]
    pub fn start(field: impl Into<String>) -> Self {
        Self::new(field, EventKind::Start, Vec::new())
    }

    #[must_use]
    pub fn success(field: impl Into<String>) -> Self {
        Self::new(field, EventKind::Success, Vec::new())
    }

    #[must_use]
    pub fn error(field: impl Into<String>, errors: Vec<String>) -> Self {
        Self::new(field, EventKind::Error, errors)
    }

    #[must_use]
    pub fn cancel(field: impl Into<String>) -> Self {
        Self::new(field, EventKind::Cancel, Vec::new())
    }

    #[must_use]
    pub fn clear(field: impl Into<String>) -> Self {
        Self::new(field, EventKind::Clear, Vec::new())
    }

    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Messages for an `Error` event; empty otherwise.
    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    #[must_use]
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// Shorthand for `self.kind().implied_status()`.
    #[must_use]
    pub fn status(&self) -> ValidationStatus {
        self.kind.implied_status()
    }
}

// ---------------------------------------------------------------------------
// Listener registration
// ---------------------------------------------------------------------------

/// Which events a listener receives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ListenerPattern {
    /// Events for one named field.
    Field(String),
    /// Every event.
    Any,
}

impl ListenerPattern {
    /// Whether an event for `field` matches this pattern.
    #[must_use]
    pub fn matches(&self, field: &str) -> bool {
        match self {
            Self::Field(name) => name == field,
            Self::Any => true,
        }
    }
}

impl From<&str> for ListenerPattern {
    fn from(pattern: &str) -> Self {
        if pattern == "*" {
            Self::Any
        } else {
            Self::Field(pattern.to_owned())
        }
    }
}

impl From<String> for ListenerPattern {
    fn from(pattern: String) -> Self {
        if pattern == "*" {
            Self::Any
        } else {
            Self::Field(pattern)
        }
    }
}

/// Handle returned by [`EventBus::add_listener`], used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&ValidationEvent) + Send + Sync>;

struct Registration {
    id: ListenerId,
    pattern: ListenerPattern,
    callback: Listener,
}

struct BusInner {
    listeners: Vec<Registration>,
    history: VecDeque<ValidationEvent>,
    capacity: usize,
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Fan-out of validation events with a bounded history.
pub struct EventBus {
    inner: RwLock<BusInner>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.read();
        f.debug_struct("EventBus")
            .field("listeners", &inner.listeners.len())
            .field("history", &inner.history.len())
            .field("capacity", &inner.capacity)
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_history_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl EventBus {
    /// Create a bus keeping the last [`DEFAULT_HISTORY_CAPACITY`] events.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bus with a custom history bound. A capacity of zero keeps no
    /// history.
    #[must_use]
    pub fn with_history_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(BusInner {
                listeners: Vec::new(),
                history: VecDeque::with_capacity(capacity),
                capacity,
            }),
            next_id: AtomicU64::new(1),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, BusInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BusInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a listener for a field name, or for every field with `"*"`.
    pub fn add_listener<P, F>(&self, pattern: P, callback: F) -> ListenerId
    where
        P: Into<ListenerPattern>,
        F: Fn(&ValidationEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let pattern = pattern.into();
        crate::trace!(listener = id.0, pattern = ?pattern, "listener registered");
        self.write().listeners.push(Registration {
            id,
            pattern,
            callback: Arc::new(callback),
        });
        id
    }

    /// Remove one listener. Returns whether it was registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut inner = self.write();
        let before = inner.listeners.len();
        inner.listeners.retain(|r| r.id != id);
        inner.listeners.len() != before
    }

    /// Remove every listener registered under exactly `pattern`. Returns the
    /// number removed.
    pub fn remove_listeners_for(&self, pattern: impl Into<ListenerPattern>) -> usize {
        let pattern = pattern.into();
        let mut inner = self.write();
        let before = inner.listeners.len();
        inner.listeners.retain(|r| r.pattern != pattern);
        before - inner.listeners.len()
    }

    /// Record `event` and deliver it to every matching listener.
    pub fn emit(&self, event: ValidationEvent) {
        let targets: Vec<Listener> = {
            let mut inner = self.write();
            if inner.capacity > 0 {
                while inner.history.len() >= inner.capacity {
                    inner.history.pop_front();
                }
                inner.history.push_back(event.clone());
            }
            inner
                .listeners
                .iter()
                .filter(|r| r.pattern.matches(&event.field))
                .map(|r| Arc::clone(&r.callback))
                .collect()
        };

        crate::trace!(
            field = event.field.as_str(),
            kind = event.kind.as_str(),
            listeners = targets.len(),
            "emit"
        );

        for callback in targets {
            if catch_unwind(AssertUnwindSafe(|| callback(&event))).is_err() {
                crate::error!(
                    field = event.field.as_str(),
                    kind = event.kind.as_str(),
                    "validation listener panicked"
                );
            }
        }
    }

    /// Recorded events, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<ValidationEvent> {
        self.read().history.iter().cloned().collect()
    }

    /// Recorded events for one field, oldest first.
    #[must_use]
    pub fn history_for(&self, field: &str) -> Vec<ValidationEvent> {
        self.read()
            .history
            .iter()
            .filter(|e| e.field == field)
            .cloned()
            .collect()
    }

    pub fn clear_history(&self) {
        self.write().history.clear();
    }

    /// Number of listeners per registration pattern.
    #[must_use]
    pub fn listener_counts(&self) -> HashMap<ListenerPattern, usize> {
        let mut counts = HashMap::new();
        for r in &self.read().listeners {
            *counts.entry(r.pattern.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Whether an event for `field` would reach at least one listener.
    #[must_use]
    pub fn has_listeners_for(&self, field: &str) -> bool {
        self.read().listeners.iter().any(|r| r.pattern.matches(field))
    }

    /// The status implied by each field's most recent recorded event.
    #[must_use]
    pub fn latest_states(&self) -> HashMap<String, ValidationStatus> {
        let mut states = HashMap::new();
        for event in &self.read().history {
            states.insert(event.field.clone(), event.status());
        }
        states
    }
}
