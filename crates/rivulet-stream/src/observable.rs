#![forbid(unsafe_code)]

//! The push-based stream.
//!
//! # Design
//!
//! An [`Observable`] is an immutable emission function plus a small
//! bookkeeping registry. Each [`observe`](Observable::observe) call creates
//! a fresh [`Observer`], registers it, and runs the emission function with
//! it; the returned disposable tears that one observation down.
//!
//! Operators never mutate an existing observable. They build a new one whose
//! emission function observes the inputs and re-emits into its own observer,
//! so disposing the outermost observation disposes every upstream
//! subscription it created.
//!
//! # Invariants
//!
//! 1. Each observation gets its own observer and its own disposable.
//! 2. Registration and deregistration are serialized by the registry lock.
//! 3. Stopped observers are pruned from the registry lazily, on the next
//!    registration.

use std::fmt;
use std::sync::Arc;

use rivulet_core::{ActionDisposable, Atomic, DisposableRef};

use crate::event::{Event, Value};
use crate::observer::Observer;
use crate::stream::Stream;

type Emitter<T, E> = dyn Fn(Observer<T, E>) -> Option<DisposableRef> + Send + Sync;

struct Registry<T, E> {
    next_id: u64,
    entries: Vec<(u64, Observer<T, E>)>,
}

struct Inner<T, E> {
    emitter: Box<Emitter<T, E>>,
    observers: Atomic<Registry<T, E>>,
}

/// A push-based stream of `T` values that may fail with `E`.
///
/// Cloning is cheap and shares the emission function.
pub struct Observable<T, E> {
    inner: Arc<Inner<T, E>>,
}

impl<T, E> Clone for Observable<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Value, E: Value> Observable<T, E> {
    /// Create an observable from its emission function.
    ///
    /// `emitter` runs once per observation. It may emit synchronously before
    /// returning, or hand the observer to other threads; the disposable it
    /// returns (if any) is disposed when the observation is torn down.
    pub fn new<F>(emitter: F) -> Self
    where
        F: Fn(Observer<T, E>) -> Option<DisposableRef> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                emitter: Box::new(emitter),
                observers: Atomic::new(Registry {
                    next_id: 0,
                    entries: Vec::new(),
                }),
            }),
        }
    }

    /// Completes immediately.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(|observer| {
            observer.send_completed();
            None
        })
    }

    /// Emits `value`, then completes.
    #[must_use]
    pub fn single(value: T) -> Self {
        Self::new(move |observer| {
            observer.send_next(value.clone());
            observer.send_completed();
            None
        })
    }

    /// Fails immediately with `error`.
    #[must_use]
    pub fn error(error: E) -> Self {
        Self::new(move |observer| {
            observer.send_error(error.clone());
            None
        })
    }

    /// Never emits anything.
    #[must_use]
    pub fn never() -> Self {
        Self::new(|_| None)
    }

    /// Emits each value in order, then completes. Stops early once the
    /// observation is disposed.
    pub fn from_values(values: impl IntoIterator<Item = T>) -> Self {
        let values: Arc<[T]> = values.into_iter().collect();
        Self::new(move |observer| {
            for value in values.iter() {
                if observer.is_stopped() {
                    return None;
                }
                observer.send_next(value.clone());
            }
            observer.send_completed();
            None
        })
    }

    /// Start an observation that calls `handler` for every event.
    pub fn observe(&self, handler: impl Fn(Event<T, E>) + Send + Sync + 'static) -> DisposableRef {
        self.observe_with(Observer::new(handler))
    }

    /// Start an observation that pushes into an existing observer.
    pub fn observe_with(&self, observer: Observer<T, E>) -> DisposableRef {
        let id = self.inner.observers.with_value_mut(|registry| {
            registry.entries.retain(|(_, o)| !o.is_stopped());
            let id = registry.next_id;
            registry.next_id += 1;
            registry.entries.push((id, observer.clone()));
            id
        });
        tracing::trace!(observation = id, "observe");

        let upstream = (self.inner.emitter)(observer.clone());
        let registry = Arc::downgrade(&self.inner);
        Arc::new(ActionDisposable::new(move || {
            observer.stop();
            if let Some(upstream) = upstream {
                upstream.dispose();
            }
            if let Some(inner) = registry.upgrade() {
                let removed = inner.observers.with_value_mut(|registry| {
                    registry
                        .entries
                        .iter()
                        .position(|(key, _)| *key == id)
                        .map(|index| registry.entries.remove(index))
                });
                drop(removed);
            }
        }))
    }

    /// Observe on behalf of `downstream`: the new observation reports itself
    /// stopped as soon as `downstream` wants nothing more.
    pub(crate) fn observe_for<U: Value, F: Value>(
        &self,
        downstream: &Observer<U, F>,
        handler: impl Fn(Event<T, E>) + Send + Sync + 'static,
    ) -> DisposableRef {
        self.observe_with(Observer::with_demand(Some(downstream.demand()), handler))
    }

    /// Number of observations that have not ended yet.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.inner.observers.with_value(|registry| {
            registry
                .entries
                .iter()
                .filter(|(_, o)| !o.is_stopped())
                .count()
        })
    }
}

impl<T: Value, E: Value> FromIterator<T> for Observable<T, E> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_values(iter)
    }
}

impl<T, E> fmt::Debug for Observable<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registered = self
            .inner
            .observers
            .with_value(|registry| registry.entries.len());
        f.debug_struct("Observable")
            .field("registered", &registered)
            .finish()
    }
}

// ─── Stream ──────────────────────────────────────────────────────────────────

impl<T: Value, E: Value> Stream for Observable<T, E> {
    type Item = T;
    type Error = E;
    type Of<U: Value> = Observable<U, E>;

    fn empty() -> Self {
        Observable::empty()
    }

    fn single(value: T) -> Self {
        Observable::single(value)
    }

    fn error(error: E) -> Self {
        Observable::error(error)
    }

    fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        Observable::from_values(values)
    }

    fn concat(&self, other: &Self) -> Self {
        Observable::concat(self, other)
    }

    fn zip_with<U: Value>(&self, other: &Self::Of<U>) -> Self::Of<(Self::Item, U)> {
        Observable::zip_with(self, other)
    }

    fn flatten_scan<S, U, F>(&self, initial: S, f: F) -> Self::Of<U>
    where
        S: Value,
        U: Value,
        F: Fn(&S, Self::Item) -> (Option<S>, Self::Of<U>) + Send + Sync + 'static,
    {
        Observable::flatten_scan(self, initial, f)
    }

    fn catch_error<F>(&self, f: F) -> Self
    where
        F: Fn(Self::Error) -> Self + Send + Sync + 'static,
    {
        Observable::catch_error(self, f)
    }

    fn materialize(&self) -> Self::Of<Event<Self::Item, Self::Error>> {
        Observable::materialize(self)
    }
}
