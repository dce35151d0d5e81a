//! `flatten_scan`, the operator every derived operator is written with.
//!
//! # Invariants
//!
//! 1. The accumulator, the in-flight count, and the termination flag live in
//!    one [`Atomic`] cell and are only touched under its lock, so racing
//!    inner completions cannot complete the output twice.
//! 2. In-flight starts at 1 (upstream). Each spawned inner stream adds 1
//!    before it is subscribed; upstream completion, upstream cut-off, and
//!    each inner completion subtract 1. `Completed` is sent exactly when the
//!    count reaches zero.
//! 3. The first error (upstream or inner) is forwarded and tears everything
//!    down; later terminal events are ignored.
//! 4. The upstream observer's demand is this operator: it lapses on cut-off,
//!    on termination, or when the output observer stops. A synchronous
//!    upstream therefore sees itself stopped even while still inside
//!    `observe`, before its subscription has been stored.

use std::sync::Arc;

use rivulet_core::{
    ActionDisposable, Atomic, CompositeDisposable, Disposable, DisposableRef, SerialDisposable,
};

use crate::event::{Event, Value};
use crate::observable::Observable;
use crate::observer::{Demand, DemandRef, Observer};

type Step<S, T, U, E> = dyn Fn(&S, T) -> (Option<S>, Observable<U, E>) + Send + Sync;

struct ScanState<S> {
    /// `None` once upstream has been cut off.
    acc: Option<S>,
    in_flight: usize,
    upstream_done: bool,
    terminated: bool,
}

struct FlattenScan<S, T, U, E> {
    observer: Observer<U, E>,
    step: Arc<Step<S, T, U, E>>,
    state: Atomic<ScanState<S>>,
    upstream: Arc<SerialDisposable>,
    inners: Arc<CompositeDisposable>,
}

impl<S: Value, T: Value, U: Value, E: Value> FlattenScan<S, T, U, E> {
    fn on_upstream(self: &Arc<Self>, event: Event<T, E>) {
        match event {
            Event::Next(value) => self.on_value(value),
            Event::Error(error) => self.fail(error),
            Event::Completed => {
                let first = self
                    .state
                    .with_value_mut(|st| !std::mem::replace(&mut st.upstream_done, true));
                if first {
                    self.finish_one();
                }
            }
        }
    }

    fn on_value(self: &Arc<Self>, value: T) {
        let step = self.state.with_value_mut(|st| {
            if st.terminated || st.upstream_done {
                return None;
            }
            let acc = st.acc.as_ref()?;
            let (next, inner) = (self.step)(acc, value);
            let cut_off = next.is_none();
            st.acc = next;
            st.in_flight += 1;
            if cut_off {
                st.upstream_done = true;
            }
            Some((inner, cut_off))
        });
        let Some((inner, cut_off)) = step else {
            return;
        };

        if cut_off {
            tracing::trace!("flatten_scan cut off upstream");
            self.upstream.dispose();
            self.finish_one();
        }
        self.subscribe_inner(&inner);
    }

    fn subscribe_inner(self: &Arc<Self>, inner: &Observable<U, E>) {
        let slot = Arc::new(SerialDisposable::new());
        let key = self.inners.add(Arc::clone(&slot) as DisposableRef);
        if slot.is_disposed() {
            // Already torn down; the in-flight count no longer matters.
            return;
        }

        let run = Arc::clone(self);
        let subscription = inner.observe_for(&self.observer, move |event| match event {
            Event::Next(value) => {
                if !run.state.with_value(|st| st.terminated) {
                    run.observer.send_next(value);
                }
            }
            Event::Error(error) => run.fail(error),
            Event::Completed => {
                if let Some(finished) = run.inners.remove(key) {
                    finished.dispose();
                }
                run.finish_one();
            }
        });
        slot.set(Some(subscription));
    }

    fn finish_one(&self) {
        let complete = self.state.with_value_mut(|st| {
            debug_assert!(st.in_flight > 0, "in-flight count underflow");
            st.in_flight = st.in_flight.saturating_sub(1);
            if st.in_flight == 0 && !st.terminated {
                st.terminated = true;
                true
            } else {
                false
            }
        });
        if complete {
            self.observer.send_completed();
            self.teardown();
        }
    }

    fn fail(&self, error: E) {
        let first = self
            .state
            .with_value_mut(|st| !std::mem::replace(&mut st.terminated, true));
        if first {
            self.observer.send_error(error);
            self.teardown();
        }
    }

    fn teardown(&self) {
        self.upstream.dispose();
        self.inners.dispose();
    }
}

impl<S: Value, T: Value, U: Value, E: Value> Demand for FlattenScan<S, T, U, E> {
    fn wants_more(&self) -> bool {
        let open = self.state.with_value(|st| !st.upstream_done && !st.terminated);
        open && !self.observer.is_stopped()
    }
}

impl<T: Value, E: Value> Observable<T, E> {
    /// See [`Stream::flatten_scan`](crate::Stream::flatten_scan).
    pub fn flatten_scan<S, U, F>(&self, initial: S, f: F) -> Observable<U, E>
    where
        S: Value,
        U: Value,
        F: Fn(&S, T) -> (Option<S>, Observable<U, E>) + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let step: Arc<Step<S, T, U, E>> = Arc::new(f);
        Observable::new(move |observer| {
            let run = Arc::new(FlattenScan {
                observer,
                step: Arc::clone(&step),
                state: Atomic::new(ScanState {
                    acc: Some(initial.clone()),
                    in_flight: 1,
                    upstream_done: false,
                    terminated: false,
                }),
                upstream: Arc::new(SerialDisposable::new()),
                inners: Arc::new(CompositeDisposable::new()),
            });

            let handler = Arc::clone(&run);
            let feed = Observer::with_demand(Some(Arc::clone(&run) as DemandRef), move |event| {
                handler.on_upstream(event);
            });
            run.upstream.set(Some(upstream.observe_with(feed)));

            Some(Arc::new(ActionDisposable::new(move || run.teardown())) as DisposableRef)
        })
    }
}
