//! `delay` and `deliver_on`: re-dispatch events through a scheduler.
//!
//! # Invariants
//!
//! 1. Every scheduled delivery is tracked in a pending set until it runs, so
//!    disposing the output cancels deliveries that have not started.
//! 2. Events are handed to the scheduler in arrival order. Delivery order
//!    matches scheduling order for a serial scheduler.
//!
//! # Failure Modes
//!
//! - A scheduler that reorders work (none of the bundled ones do) reorders
//!   deliveries too. The observer still drops anything after the first
//!   terminal event, so the grammar holds.

use std::sync::Arc;

use rivulet_core::{CompositeDisposable, Disposable, DisposableRef, SerialDisposable};
use rivulet_runtime::SchedulerRef;
use web_time::{Duration, Instant};

use crate::event::{Event, Value};
use crate::observable::Observable;
use crate::observer::Observer;

struct Dispatch<T, E> {
    observer: Observer<T, E>,
    scheduler: SchedulerRef,
    pending: Arc<CompositeDisposable>,
}

impl<T: Value, E: Value> Dispatch<T, E> {
    /// Deliver `event` through the scheduler, at `when` if given.
    fn dispatch(&self, when: Option<Instant>, event: Event<T, E>) {
        let slot = Arc::new(SerialDisposable::new());
        let key = self.pending.add(Arc::clone(&slot) as DisposableRef);
        if slot.is_disposed() {
            return;
        }

        let observer = self.observer.clone();
        let pending = Arc::clone(&self.pending);
        let work = Box::new(move || {
            pending.remove(key);
            observer.send(event);
        });
        let token = match when {
            Some(at) => self.scheduler.schedule_after(at, work),
            None => self.scheduler.schedule(work),
        };
        if let Some(token) = token {
            slot.set(Some(token));
        }
    }
}

impl<T: Value, E: Value> Observable<T, E> {
    /// Deliver values and completion `interval` later on `scheduler`.
    /// Errors are forwarded immediately and cancel anything still pending.
    #[must_use]
    pub fn delay(&self, interval: Duration, scheduler: SchedulerRef) -> Observable<T, E> {
        let source = self.clone();
        Observable::new(move |observer| {
            let dispatch = Arc::new(Dispatch {
                observer,
                scheduler: Arc::clone(&scheduler),
                pending: Arc::new(CompositeDisposable::new()),
            });

            let d = Arc::clone(&dispatch);
            let subscription = source.observe_for(&dispatch.observer, move |event| match event {
                Event::Error(error) => {
                    d.pending.dispose();
                    d.observer.send_error(error);
                }
                other => d.dispatch(Some(Instant::now() + interval), other),
            });

            Some(Arc::new(CompositeDisposable::from_children(vec![
                subscription,
                Arc::clone(&dispatch.pending) as DisposableRef,
            ])) as DisposableRef)
        })
    }

    /// Re-dispatch every event, terminal ones included, through `scheduler`.
    #[must_use]
    pub fn deliver_on(&self, scheduler: SchedulerRef) -> Observable<T, E> {
        let source = self.clone();
        Observable::new(move |observer| {
            let dispatch = Arc::new(Dispatch {
                observer,
                scheduler: Arc::clone(&scheduler),
                pending: Arc::new(CompositeDisposable::new()),
            });

            let d = Arc::clone(&dispatch);
            let subscription =
                source.observe_for(&dispatch.observer, move |event| d.dispatch(None, event));

            Some(Arc::new(CompositeDisposable::from_children(vec![
                subscription,
                Arc::clone(&dispatch.pending) as DisposableRef,
            ])) as DisposableRef)
        })
    }
}
