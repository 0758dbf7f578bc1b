#![forbid(unsafe_code)]

//! Per-key delayed, cancellable actions.
//!
//! Each scheduled action gets its own thread that waits on the pending
//! table's condition variable until its deadline. At most one action is
//! pending per key: scheduling again for the same key replaces the entry and
//! wakes the earlier thread, which then finds its entry gone and exits.
//!
//! # Exactly once
//!
//! Every pending entry carries a generation number. A waiting thread holds
//! the table lock whenever it checks its entry; once the deadline has passed
//! it removes the entry, still under the lock, and only then runs the
//! action. A cancel or replacement removes the entry under the same lock, so
//! for every scheduled action exactly one of these holds:
//!
//! - it was removed by its own thread and runs once, or
//! - it was removed by `cancel`/`cancel_all`/a replacing `schedule` and
//!   never runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Pending table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct PendingAction {
    generation: u64,
    deadline: Instant,
}

#[derive(Default)]
struct PendingTable {
    entries: Mutex<HashMap<String, PendingAction>>,
    /// Signalled whenever an entry is removed or replaced.
    changed: Condvar,
    next_generation: AtomicU64,
}

impl PendingTable {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingAction>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until the entry `key`/`generation` is due or gone.
    ///
    /// Returns `true` when the deadline passed with the entry still in
    /// place; the entry has then been removed and the caller owns the run.
    /// Returns `false` when the entry was cancelled or replaced. Spurious
    /// wakeups and notifications for other keys are absorbed.
    fn wait_until_due(&self, key: &str, generation: u64) -> bool {
        let mut entries = self.lock();
        loop {
            let deadline = match entries.get(key) {
                Some(pending) if pending.generation == generation => pending.deadline,
                _ => return false,
            };
            let now = Instant::now();
            if now >= deadline {
                entries.remove(key);
                return true;
            }
            entries = self
                .changed
                .wait_timeout(entries, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

// ---------------------------------------------------------------------------
// Debouncer
// ---------------------------------------------------------------------------

/// Delayed execution keyed by name, at most one pending action per key.
///
/// Actions run on their own thread once the delay elapses. Dropping the
/// debouncer does not cancel pending actions; call
/// [`cancel_all`](Self::cancel_all) for that.
pub struct Debouncer {
    table: Arc<PendingTable>,
    default_delay: Duration,
}

impl std::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("pending", &self.pending_count())
            .field("default_delay", &self.default_delay)
            .finish()
    }
}

impl Debouncer {
    /// Create a debouncer. `default_delay` applies when an action is
    /// scheduled with `Duration::ZERO`.
    #[must_use]
    pub fn new(default_delay: Duration) -> Self {
        Self {
            table: Arc::new(PendingTable::default()),
            default_delay,
        }
    }

    /// Run `action` after `delay` unless cancelled or replaced first.
    ///
    /// Any action already pending for `key` is cancelled and will never run.
    /// Returns `true` when such an action was replaced.
    pub fn schedule<F>(&self, key: impl Into<String>, delay: Duration, action: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let key = key.into();
        let delay = if delay.is_zero() {
            self.default_delay
        } else {
            delay
        };
        let generation = self.table.next_generation.fetch_add(1, Ordering::Relaxed);
        let pending = PendingAction {
            generation,
            deadline: Instant::now() + delay,
        };

        let replaced = self.table.lock().insert(key.clone(), pending).is_some();
        if replaced {
            self.table.changed.notify_all();
            tracing::debug!(field = %key, "superseded pending validation");
        }
        tracing::debug!(
            field = %key,
            delay_ms = delay.as_millis() as u64,
            generation,
            "scheduled validation"
        );

        let table = Arc::clone(&self.table);
        thread::spawn(move || {
            if table.wait_until_due(&key, generation) {
                tracing::debug!(field = %key, generation, "debounce elapsed");
                action();
            }
        });

        replaced
    }

    /// Cancel the pending action for `key`. Returns whether one was pending.
    pub fn cancel(&self, key: &str) -> bool {
        let removed = self.table.lock().remove(key).is_some();
        if removed {
            self.table.changed.notify_all();
            tracing::debug!(field = key, "cancelled pending validation");
        }
        removed
    }

    /// Cancel every pending action. Returns the cancelled keys, sorted.
    pub fn cancel_all(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.table.lock().drain().map(|(key, _)| key).collect();
        keys.sort();
        if !keys.is_empty() {
            self.table.changed.notify_all();
            tracing::debug!(count = keys.len(), "cancelled all pending validations");
        }
        keys
    }

    /// Keys with an outstanding action, sorted.
    #[must_use]
    pub fn pending_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.table.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    #[must_use]
    pub fn is_pending(&self, key: &str) -> bool {
        self.table.lock().contains_key(key)
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.table.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    const SHORT: Duration = Duration::from_millis(30);
    const WAIT: Duration = Duration::from_secs(2);

    #[test]
    fn wait_returns_false_for_missing_entry() {
        let table = PendingTable::default();
        assert!(!table.wait_until_due("f", 0));
    }

    #[test]
    fn wait_claims_entry_at_deadline() {
        let table = PendingTable::default();
        let deadline = Instant::now() + Duration::from_millis(10);
        table.lock().insert(
            "f".into(),
            PendingAction {
                generation: 7,
                deadline,
            },
        );
        assert!(!table.wait_until_due("f", 6));
        assert!(table.wait_until_due("f", 7));
        assert!(Instant::now() >= deadline);
        assert!(table.lock().is_empty());
    }

    #[test]
    fn removal_wakes_waiter_early() {
        let table = Arc::new(PendingTable::default());
        table.lock().insert(
            "f".into(),
            PendingAction {
                generation: 0,
                deadline: Instant::now() + Duration::from_secs(10),
            },
        );
        let waiter = {
            let table = Arc::clone(&table);
            thread::spawn(move || {
                let start = Instant::now();
                (table.wait_until_due("f", 0), start.elapsed())
            })
        };
        thread::sleep(Duration::from_millis(10));
        table.lock().remove("f");
        table.changed.notify_all();

        let (due, waited) = waiter.join().unwrap();
        assert!(!due);
        assert!(waited < Duration::from_secs(5), "waited {waited:?}");
    }

    #[test]
    fn scheduled_action_fires_once() {
        let debouncer = Debouncer::new(SHORT);
        let (tx, rx) = mpsc::channel();
        assert!(!debouncer.schedule("f", SHORT, move || tx.send(1).unwrap()));
        assert!(debouncer.is_pending("f"));

        assert_eq!(rx.recv_timeout(WAIT), Ok(1));
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert!(!debouncer.is_pending("f"));
    }

    #[test]
    fn replacement_runs_only_latest() {
        let debouncer = Debouncer::new(SHORT);
        let (tx, rx) = mpsc::channel();
        for i in 0..5 {
            let tx = tx.clone();
            let replaced = debouncer.schedule("f", Duration::from_millis(80), move || {
                tx.send(i).unwrap();
            });
            assert_eq!(replaced, i > 0);
        }
        assert_eq!(debouncer.pending_count(), 1);
        assert_eq!(rx.recv_timeout(WAIT), Ok(4));
        assert!(rx.recv_timeout(Duration::from_millis(150)).is_err());
    }

    #[test]
    fn cancel_prevents_firing() {
        let debouncer = Debouncer::new(SHORT);
        let (tx, rx) = mpsc::channel::<()>();
        debouncer.schedule("f", Duration::from_millis(50), move || tx.send(()).unwrap());
        assert!(debouncer.cancel("f"));
        assert!(!debouncer.cancel("f"));
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn cancel_all_reports_keys() {
        let debouncer = Debouncer::new(SHORT);
        debouncer.schedule("b", Duration::from_secs(5), || {});
        debouncer.schedule("a", Duration::from_secs(5), || {});
        assert_eq!(debouncer.pending_keys(), ["a", "b"]);
        assert_eq!(debouncer.cancel_all(), ["a", "b"]);
        assert_eq!(debouncer.pending_count(), 0);
        assert!(debouncer.cancel_all().is_empty());
    }

    #[test]
    fn zero_delay_uses_default() {
        let debouncer = Debouncer::new(Duration::from_millis(60));
        let (tx, rx) = mpsc::channel();
        let start = Instant::now();
        debouncer.schedule("f", Duration::ZERO, move || tx.send(start.elapsed()).unwrap());
        let elapsed = rx.recv_timeout(WAIT).unwrap();
        assert!(elapsed >= Duration::from_millis(60), "fired after {elapsed:?}");
    }

    #[test]
    fn keys_are_independent() {
        let debouncer = Debouncer::new(SHORT);
        let (tx, rx) = mpsc::channel();
        for key in ["a", "b", "c"] {
            let tx = tx.clone();
            debouncer.schedule(key, SHORT, move || tx.send(key).unwrap());
        }
        let mut fired: Vec<_> = (0..3).map(|_| rx.recv_timeout(WAIT).unwrap()).collect();
        fired.sort_unstable();
        assert_eq!(fired, ["a", "b", "c"]);
    }
}
