#![forbid(unsafe_code)]

//! Deferred single-value computation on a scheduler.
//!
//! A [`Promise`] wraps one unit of work. Nothing runs until [`Promise::start`]
//! (or a blocking [`Promise::result`]) hands the work to its scheduler; the
//! value is computed at most once and every waiter sees a clone of it.
//!
//! # Blocking
//!
//! [`Promise::result`] parks the caller until the work finishes. Calling it
//! from inside the promise's own serial queue while that queue still holds
//! the work deadlocks; chain with [`Promise::then`] instead.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};

use parking_lot::{Condvar, Mutex};
use rivulet_core::{ActionDisposable, Disposable, DisposableRef, SerialDisposable, SimpleDisposable};

use crate::error::{PromiseError, panic_message};
use crate::scheduler::SchedulerRef;

type PromiseWork<T> = Box<dyn FnOnce() -> Result<T, PromiseError> + Send>;
type Callback<T> = Box<dyn FnOnce(Result<T, PromiseError>) + Send>;

enum Phase<T> {
    Idle(PromiseWork<T>),
    Scheduled,
    Finished(Result<T, PromiseError>),
}

struct State<T> {
    phase: Phase<T>,
    callbacks: Vec<(u64, Callback<T>)>,
    next_callback: u64,
}

struct Shared<T> {
    scheduler: SchedulerRef,
    state: Mutex<State<T>>,
    finished: Condvar,
    /// Cancels the scheduled job while it is still pending.
    job: SerialDisposable,
}

/// A lazily started, memoized computation. Clones share the same result.
pub struct Promise<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone + Send + 'static> Promise<T> {
    /// Create a promise that will run `work` on `scheduler` once started.
    pub fn new<F>(scheduler: SchedulerRef, work: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self::from_fallible(scheduler, Box::new(move || Ok(work())))
    }

    fn from_fallible(scheduler: SchedulerRef, work: PromiseWork<T>) -> Self {
        Self {
            shared: Arc::new(Shared {
                scheduler,
                state: Mutex::new(State {
                    phase: Phase::Idle(work),
                    callbacks: Vec::new(),
                    next_callback: 0,
                }),
                finished: Condvar::new(),
                job: SerialDisposable::new(),
            }),
        }
    }

    /// Hand the work to the scheduler. Later calls do nothing.
    pub fn start(&self) {
        let work = {
            let mut state = self.shared.state.lock();
            match std::mem::replace(&mut state.phase, Phase::Scheduled) {
                Phase::Idle(work) => work,
                other => {
                    state.phase = other;
                    return;
                }
            }
        };

        let shared = Arc::clone(&self.shared);
        let job = self.shared.scheduler.schedule(Box::new(move || {
            let result = match catch_unwind(AssertUnwindSafe(work)) {
                Ok(result) => result,
                Err(payload) => {
                    let message = panic_message(&*payload);
                    tracing::warn!(panic = %message, "promise work panicked");
                    Err(PromiseError::Panicked { message })
                }
            };
            finish(&shared, result);
        }));
        if let Some(job) = job {
            self.shared.job.set(Some(job));
        }
    }

    /// Start the work if needed and block until it finishes.
    pub fn result(&self) -> Result<T, PromiseError> {
        self.start();
        let mut state = self.shared.state.lock();
        loop {
            if let Phase::Finished(result) = &state.phase {
                return result.clone();
            }
            self.shared.finished.wait(&mut state);
        }
    }

    /// The result, if the promise already finished.
    #[must_use]
    pub fn peek(&self) -> Option<Result<T, PromiseError>> {
        match &self.shared.state.lock().phase {
            Phase::Finished(result) => Some(result.clone()),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self.shared.state.lock().phase, Phase::Finished(_))
    }

    /// Run `action` with the result once the promise finishes (immediately if
    /// it already has). Does not start the promise.
    ///
    /// Disposing the returned handle deregisters a pending callback.
    pub fn when_finished<F>(&self, action: F) -> DisposableRef
    where
        F: FnOnce(Result<T, PromiseError>) + Send + 'static,
    {
        let mut state = self.shared.state.lock();
        if let Phase::Finished(result) = &state.phase {
            let result = result.clone();
            drop(state);
            action(result);
            let done = SimpleDisposable::new();
            done.dispose();
            return Arc::new(done);
        }

        let id = state.next_callback;
        state.next_callback += 1;
        state.callbacks.push((id, Box::new(action)));
        drop(state);

        let weak: Weak<Shared<T>> = Arc::downgrade(&self.shared);
        Arc::new(ActionDisposable::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.state.lock().callbacks.retain(|(key, _)| *key != id);
            }
        }))
    }

    /// Derive a promise from this one's value.
    ///
    /// The receiver is started right away so its job is queued ahead of the
    /// derived one; the derived promise still waits for its own `start`.
    /// Errors of the receiver pass through unchanged.
    pub fn then<U, F>(&self, f: F) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.start();
        let parent = self.clone();
        Promise::from_fallible(
            Arc::clone(&self.shared.scheduler),
            Box::new(move || parent.result().map(f)),
        )
    }

    /// Resolve with [`PromiseError::Cancelled`] unless already finished, and
    /// drop the pending job. Work that already started is not interrupted,
    /// but its result is discarded.
    pub fn cancel(&self) {
        self.shared.job.dispose();
        finish(&self.shared, Err(PromiseError::Cancelled));
    }
}

fn finish<T: Clone>(shared: &Shared<T>, result: Result<T, PromiseError>) {
    let callbacks = {
        let mut state = shared.state.lock();
        if matches!(state.phase, Phase::Finished(_)) {
            return;
        }
        state.phase = Phase::Finished(result.clone());
        shared.finished.notify_all();
        std::mem::take(&mut state.callbacks)
    };
    for (_, callback) in callbacks {
        callback(result.clone());
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self.shared.state.try_lock().map(|s| match s.phase {
            Phase::Idle(_) => "idle",
            Phase::Scheduled => "scheduled",
            Phase::Finished(Ok(_)) => "fulfilled",
            Phase::Finished(Err(_)) => "failed",
        }) {
            Some(phase) => phase,
            None => "<locked>",
        };
        f.debug_struct("Promise")
            .field("scheduler", &self.shared.scheduler.label())
            .field("phase", &phase)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{ImmediateScheduler, QueueScheduler};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    fn queue(label: &str) -> SchedulerRef {
        Arc::new(QueueScheduler::new(label).expect("spawn queue"))
    }

    #[test]
    fn nothing_runs_before_start() {
        let runs = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&runs);
        let p = Promise::new(Arc::new(ImmediateScheduler), move || {
            r.fetch_add(1, Ordering::SeqCst);
            5
        });
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(!p.is_finished());
        assert_eq!(p.result(), Ok(5));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn start_is_idempotent() {
        let runs = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&runs);
        let p = Promise::new(queue("promise-idem"), move || {
            r.fetch_add(1, Ordering::SeqCst);
            "done".to_string()
        });
        p.start();
        p.start();
        assert_eq!(p.result().as_deref(), Ok("done"));
        p.start();
        assert_eq!(p.result().as_deref(), Ok("done"));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn when_finished_before_and_after() {
        let p = Promise::new(queue("promise-cb"), || 7);
        let (tx, rx) = mpsc::channel();
        let early = tx.clone();
        p.when_finished(move |r| early.send(r).unwrap());
        p.start();
        assert_eq!(rx.recv().unwrap(), Ok(7));

        let late = p.when_finished(move |r| tx.send(r).unwrap());
        assert_eq!(rx.recv().unwrap(), Ok(7));
        assert!(late.is_disposed());
    }

    #[test]
    fn disposing_callback_deregisters_it() {
        let p = Promise::new(Arc::new(ImmediateScheduler), || 1);
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let registration = p.when_finished(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        registration.dispose();
        assert_eq!(p.result(), Ok(1));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn then_chains_on_one_serial_queue() {
        let q = queue("promise-chain");
        let base = Promise::new(Arc::clone(&q), || 20);
        let doubled = base.then(|v| v * 2);
        let text = doubled.then(|v| format!("v={v}"));
        assert_eq!(text.result().as_deref(), Ok("v=40"));
        assert_eq!(base.peek(), Some(Ok(20)));
    }

    #[test]
    fn panic_becomes_error_and_propagates_through_then() {
        let p: Promise<u32> = Promise::new(queue("promise-panic"), || panic!("bad input"));
        let next = p.then(|v| v + 1);
        assert_eq!(
            next.result(),
            Err(PromiseError::Panicked {
                message: "bad input".into()
            })
        );
    }

    #[test]
    fn cancel_before_start_discards_work() {
        let runs = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&runs);
        let p = Promise::new(queue("promise-cancel"), move || {
            r.fetch_add(1, Ordering::SeqCst);
        });
        p.cancel();
        assert_eq!(p.result(), Err(PromiseError::Cancelled));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancel_pending_job_never_runs() {
        let q = queue("promise-cancel-pending");
        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        q.schedule(Box::new(move || {
            let _ = gate_rx.recv();
        }));

        let runs = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&runs);
        let p = Promise::new(Arc::clone(&q), move || {
            r.fetch_add(1, Ordering::SeqCst);
        });
        p.start();
        p.cancel();
        gate_tx.send(()).unwrap();

        let (tx, rx) = mpsc::channel();
        q.schedule(Box::new(move || tx.send(()).unwrap()));
        rx.recv().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(p.result(), Err(PromiseError::Cancelled));
    }

    #[test]
    fn debug_shows_phase() {
        let p = Promise::new(Arc::new(ImmediateScheduler), || 3);
        assert!(format!("{p:?}").contains("idle"));
        p.start();
        assert!(format!("{p:?}").contains("fulfilled"));
    }
}
