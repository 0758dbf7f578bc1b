#![forbid(unsafe_code)]

//! Timing guarantees of the debouncer under concurrent use.
//!
//! Delays are generous so the assertions hold on a loaded CI machine.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use fieldflow_runtime::Debouncer;

#[test]
fn coalesces_burst_into_last_call() {
    let debouncer = Debouncer::new(Duration::from_millis(100));
    let fired = Arc::new(Mutex::new(Vec::new()));

    for i in 0..10 {
        let fired = Arc::clone(&fired);
        debouncer.schedule("search", Duration::from_millis(100), move || {
            fired.lock().unwrap().push(i);
        });
        thread::sleep(Duration::from_millis(5));
    }

    thread::sleep(Duration::from_millis(500));
    assert_eq!(*fired.lock().unwrap(), [9]);
}

#[test]
fn fires_no_earlier_than_delay() {
    let debouncer = Debouncer::new(Duration::from_millis(10));
    let (tx, rx) = mpsc::channel();
    let scheduled_at = Instant::now();
    debouncer.schedule("f", Duration::from_millis(120), move || {
        tx.send(scheduled_at.elapsed()).unwrap();
    });
    let elapsed = rx.recv_timeout(Duration::from_secs(3)).unwrap();
    assert!(elapsed >= Duration::from_millis(120), "fired after {elapsed:?}");
}

#[test]
fn cancel_all_silences_every_key() {
    let debouncer = Debouncer::new(Duration::from_millis(10));
    let fired = Arc::new(AtomicUsize::new(0));
    for key in ["a", "b", "c", "d"] {
        let fired = Arc::clone(&fired);
        debouncer.schedule(key, Duration::from_millis(80), move || {
            fired.fetch_add(1, Ordering::SeqCst);
        });
    }
    assert_eq!(debouncer.pending_count(), 4);
    assert_eq!(debouncer.cancel_all().len(), 4);

    thread::sleep(Duration::from_millis(250));
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

/// Many threads replace the same key at once: exactly one action runs.
#[test]
fn concurrent_schedules_fire_exactly_once() {
    let debouncer = Arc::new(Debouncer::new(Duration::from_millis(10)));
    let fired = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let debouncer = Arc::clone(&debouncer);
            let fired = Arc::clone(&fired);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                debouncer.schedule("f", Duration::from_millis(60), move || {
                    fired.fetch_add(1, Ordering::SeqCst);
                });
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    thread::sleep(Duration::from_millis(300));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(!debouncer.is_pending("f"));
}

/// Cancelling right around the deadline: either the action ran and cancel
/// saw nothing pending, or cancel won and the action never runs.
#[test]
fn cancel_near_deadline_is_exclusive() {
    for _ in 0..20 {
        let debouncer = Debouncer::new(Duration::from_millis(1));
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        debouncer.schedule("f", Duration::from_millis(15), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        thread::sleep(Duration::from_millis(15));
        let cancelled = debouncer.cancel("f");

        thread::sleep(Duration::from_millis(60));
        let runs = fired.load(Ordering::SeqCst);
        if cancelled {
            assert_eq!(runs, 0);
        } else {
            assert_eq!(runs, 1);
        }
    }
}
