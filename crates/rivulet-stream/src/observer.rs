//! The per-observation sink.
//!
//! Every call to [`Observable::observe`](crate::Observable::observe) creates
//! one [`Observer`]. Producers push events into it from any thread; the
//! observer enforces the event grammar before anything reaches the handler.
//!
//! # Invariants
//!
//! 1. The handler never sees an event after a terminal event.
//! 2. Deliveries are serialized: two producers racing on one observer never
//!    run the handler concurrently, so a `Next` cannot overtake a terminal
//!    event that started delivering first.
//! 3. Once stopped (terminal event or disposal) the handler is dropped, which
//!    releases whatever it captured and breaks subscription cycles.
//! 4. An observer an operator creates for one of its inputs is linked to the
//!    operator's `Demand`. As soon as that demand lapses the input observer
//!    reports itself stopped, so a source emitting synchronously inside
//!    `observe` can check [`Observer::is_stopped`] and bail out before its
//!    disposable even exists.
//!
//! # Failure Modes
//!
//! - **Event after terminal**: dropped and logged at `warn` level; this is a
//!   producer bug.
//! - **Event after disposal**: dropped silently (`trace`); disposal is
//!   best-effort against in-flight emission.
//! - **Event after demand lapsed**: the observer stops itself and drops the
//!   event (`trace`).

use std::fmt;
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use rivulet_core::Atomic;

use crate::event::Event;

type Handler<T, E> = Arc<dyn Fn(Event<T, E>) + Send + Sync>;

/// Whoever consumes what an input observer forwards.
pub(crate) trait Demand: Send + Sync {
    /// `false` once nothing more will be accepted.
    fn wants_more(&self) -> bool;
}

pub(crate) type DemandRef = Arc<dyn Demand>;

enum Phase<T, E> {
    Active {
        handler: Handler<T, E>,
        demand: Option<DemandRef>,
    },
    Terminated,
    Disposed,
}

struct Sink<T, E> {
    phase: Atomic<Phase<T, E>>,
    /// Held for the whole of a delivery. Reentrant so a handler may emit into
    /// its own observer.
    delivery: ReentrantMutex<()>,
}

/// Grammar-enforcing handle that producers push events into. Clones share
/// the same observation.
pub struct Observer<T, E> {
    sink: Arc<Sink<T, E>>,
}

impl<T, E> Clone for Observer<T, E> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
        }
    }
}

impl<T, E> Observer<T, E> {
    pub fn new(handler: impl Fn(Event<T, E>) + Send + Sync + 'static) -> Self {
        Self::with_demand(None, handler)
    }

    /// An observer that also stops once `demand` lapses.
    pub(crate) fn with_demand(
        demand: Option<DemandRef>,
        handler: impl Fn(Event<T, E>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            sink: Arc::new(Sink {
                phase: Atomic::new(Phase::Active {
                    handler: Arc::new(handler),
                    demand,
                }),
                delivery: ReentrantMutex::new(()),
            }),
        }
    }

    /// Deliver one event.
    pub fn send(&self, event: Event<T, E>) {
        let _delivery = self.sink.delivery.lock();
        let terminal = event.is_terminating();
        let active = self.sink.phase.with_value_mut(|phase| match phase {
            Phase::Active { handler, demand } => {
                let active = (Arc::clone(handler), demand.clone());
                if terminal {
                    *phase = Phase::Terminated;
                }
                Ok(active)
            }
            Phase::Terminated => Err(true),
            Phase::Disposed => Err(false),
        });
        match active {
            Ok((_, Some(demand))) if !demand.wants_more() => {
                self.stop();
                tracing::trace!(terminal, "event after demand lapsed dropped");
            }
            Ok((handler, _)) => handler(event),
            Err(true) => tracing::warn!(terminal, "event after a terminal event dropped"),
            Err(false) => tracing::trace!(terminal, "event after disposal dropped"),
        }
    }

    pub fn send_next(&self, value: T) {
        self.send(Event::Next(value));
    }

    pub fn send_error(&self, error: E) {
        self.send(Event::Error(error));
    }

    pub fn send_completed(&self) {
        self.send(Event::Completed);
    }

    /// Whether the observation has ended, by a terminal event, disposal, or
    /// because whatever consumes it downstream wants nothing more.
    ///
    /// Synchronous producers should poll this between values.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        let demand = self.sink.phase.with_value(|phase| match phase {
            Phase::Active { demand, .. } => Some(demand.clone()),
            _ => None,
        });
        match demand {
            None => true,
            Some(None) => false,
            Some(Some(demand)) => !demand.wants_more(),
        }
    }

    /// This observation as the demand of an observer feeding it.
    pub(crate) fn demand(&self) -> DemandRef
    where
        T: 'static,
        E: 'static,
    {
        Arc::clone(&self.sink) as DemandRef
    }

    /// End the observation without delivering anything.
    ///
    /// Does not wait for a delivery already in progress on another thread.
    pub(crate) fn stop(&self) {
        let previous = self.sink.phase.modify_with(|phase| match phase {
            Phase::Active { .. } => (Phase::Disposed, true),
            Phase::Terminated => (Phase::Terminated, false),
            Phase::Disposed => (Phase::Disposed, false),
        });
        // The replaced handler drops here, outside the cell's lock.
        drop(previous);
    }

    /// Run `f` while holding this observer's delivery lock, so that state
    /// computed inside `f` and the events it sends stay in one order across
    /// racing producers.
    pub(crate) fn serialized<R>(&self, f: impl FnOnce() -> R) -> R {
        let _delivery = self.sink.delivery.lock();
        f()
    }
}

impl<T, E> Demand for Sink<T, E> {
    fn wants_more(&self) -> bool {
        let demand = self.phase.with_value(|phase| match phase {
            Phase::Active { demand, .. } => Some(demand.clone()),
            _ => None,
        });
        match demand {
            None => false,
            Some(None) => true,
            Some(Some(demand)) => demand.wants_more(),
        }
    }
}

impl<T, E> fmt::Debug for Observer<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
