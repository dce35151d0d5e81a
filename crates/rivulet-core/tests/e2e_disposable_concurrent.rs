//! E2E integration test: disposable trees under concurrent disposal.
//!
//! Validates:
//! 1. `dispose()` raced from many threads performs its side effect once.
//! 2. Children added while a composite is being disposed are never leaked:
//!    each one ends up disposed exactly once.
//! 3. Serial assignment racing with disposal never leaves a live child.
//!
//! Test scenario: N threads released simultaneously by a `Barrier`.

#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use rivulet_core::{
    ActionDisposable, CompositeDisposable, Disposable, DisposableRef, SerialDisposable,
};

const THREADS: usize = 8;
const ROUNDS: usize = 200;

fn counting(counter: &Arc<AtomicUsize>) -> DisposableRef {
    let counter = Arc::clone(counter);
    Arc::new(ActionDisposable::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }))
}

#[test]
fn e2e_action_dispose_races_run_once() {
    for _ in 0..ROUNDS {
        let count = Arc::new(AtomicUsize::new(0));
        let disposable = counting(&count);
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let d = Arc::clone(&disposable);
                let b = Arc::clone(&barrier);
                thread::spawn(move || {
                    b.wait();
                    d.dispose();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        // A losing `dispose()` may return while the winner is still running
        // the action; only after every thread is done is the flag settled.
        assert!(disposable.is_disposed());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}

#[test]
fn e2e_composite_add_racing_dispose_never_leaks() {
    for _ in 0..ROUNDS {
        let count = Arc::new(AtomicUsize::new(0));
        let composite = Arc::new(CompositeDisposable::new());
        let barrier = Arc::new(Barrier::new(THREADS + 1));
        let per_thread = 16;

        let adders: Vec<_> = (0..THREADS)
            .map(|_| {
                let c = Arc::clone(&composite);
                let b = Arc::clone(&barrier);
                let counter = Arc::clone(&count);
                thread::spawn(move || {
                    b.wait();
                    for _ in 0..per_thread {
                        c.add(counting(&counter));
                    }
                })
            })
            .collect();

        barrier.wait();
        composite.dispose();
        for h in adders {
            h.join().unwrap();
        }

        // Every child was either disposed by the composite or rejected and
        // disposed by `add` itself.
        assert_eq!(count.load(Ordering::SeqCst), THREADS * per_thread);
        assert!(composite.is_empty());
    }
}

#[test]
fn e2e_serial_set_racing_dispose_leaves_nothing_live() {
    for _ in 0..ROUNDS {
        let count = Arc::new(AtomicUsize::new(0));
        let serial = Arc::new(SerialDisposable::new());
        let barrier = Arc::new(Barrier::new(THREADS + 1));

        let setters: Vec<_> = (0..THREADS)
            .map(|_| {
                let s = Arc::clone(&serial);
                let b = Arc::clone(&barrier);
                let counter = Arc::clone(&count);
                thread::spawn(move || {
                    b.wait();
                    for _ in 0..4 {
                        s.set(Some(counting(&counter)));
                    }
                })
            })
            .collect();

        barrier.wait();
        serial.dispose();
        for h in setters {
            h.join().unwrap();
        }

        assert!(serial.inner().is_none());
        assert_eq!(count.load(Ordering::SeqCst), THREADS * 4);
    }
}
