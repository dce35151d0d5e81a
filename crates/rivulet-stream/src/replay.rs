#![forbid(unsafe_code)]

//! Append-only record of an observation, readable after the fact.
//!
//! [`Observable::replay`] observes a stream into a [`ReplayBuffer`]. Any
//! number of readers can take a [`snapshot`](ReplayBuffer::snapshot) or walk
//! the buffer with a blocking [`iter`](ReplayBuffer::iter) that yields every
//! recorded event from the start and then waits for new ones.
//!
//! # Invariants
//!
//! 1. Recorded events obey the event grammar: nothing is appended after a
//!    terminal event.
//! 2. Once closed (terminal event recorded, or the replay subscription
//!    disposed) the buffer never grows again, and every blocked iterator
//!    wakes up and finishes.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use rivulet_core::{ActionDisposable, DisposableRef};

use crate::event::{Event, Value};
use crate::observable::Observable;

struct Recorded<T, E> {
    events: Vec<Event<T, E>>,
    closed: bool,
}

struct Shared<T, E> {
    recorded: Mutex<Recorded<T, E>>,
    grew: Condvar,
}

/// Shared, append-only event log. Cloning shares the same log.
pub struct ReplayBuffer<T, E> {
    shared: Arc<Shared<T, E>>,
}

impl<T, E> Clone for ReplayBuffer<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Value, E: Value> Default for ReplayBuffer<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Value, E: Value> ReplayBuffer<T, E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                recorded: Mutex::new(Recorded {
                    events: Vec::new(),
                    closed: false,
                }),
                grew: Condvar::new(),
            }),
        }
    }

    /// Append `event`. Returns `false` (and records nothing) once the buffer
    /// is closed.
    pub fn send(&self, event: Event<T, E>) -> bool {
        let mut recorded = self.shared.recorded.lock();
        if recorded.closed {
            return false;
        }
        recorded.closed = event.is_terminating();
        recorded.events.push(event);
        drop(recorded);
        self.shared.grew.notify_all();
        true
    }

    /// Stop recording without a terminal event.
    pub fn close(&self) {
        let mut recorded = self.shared.recorded.lock();
        if !std::mem::replace(&mut recorded.closed, true) {
            tracing::trace!(events = recorded.events.len(), "replay buffer closed");
        }
        drop(recorded);
        self.shared.grew.notify_all();
    }

    /// Everything recorded so far.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Event<T, E>> {
        self.shared.recorded.lock().events.clone()
    }

    /// `true` once a terminal event was recorded.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.shared
            .recorded
            .lock()
            .events
            .last()
            .is_some_and(Event::is_terminating)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.recorded.lock().closed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.recorded.lock().events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate from the first recorded event, blocking for new events until
    /// the buffer is closed.
    #[must_use]
    pub fn iter(&self) -> ReplayIter<T, E> {
        ReplayIter {
            buffer: self.clone(),
            position: 0,
        }
    }
}

impl<T: Value, E: Value> IntoIterator for &ReplayBuffer<T, E> {
    type Item = Event<T, E>;
    type IntoIter = ReplayIter<T, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T, E> fmt::Debug for ReplayBuffer<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let recorded = self.shared.recorded.lock();
        f.debug_struct("ReplayBuffer")
            .field("len", &recorded.events.len())
            .field("closed", &recorded.closed)
            .finish()
    }
}

/// Blocking iterator over a [`ReplayBuffer`].
pub struct ReplayIter<T, E> {
    buffer: ReplayBuffer<T, E>,
    position: usize,
}

impl<T: Value, E: Value> Iterator for ReplayIter<T, E> {
    type Item = Event<T, E>;

    fn next(&mut self) -> Option<Self::Item> {
        let shared = &self.buffer.shared;
        let mut recorded = shared.recorded.lock();
        while self.position >= recorded.events.len() && !recorded.closed {
            shared.grew.wait(&mut recorded);
        }
        let event = recorded.events.get(self.position).cloned()?;
        self.position += 1;
        Some(event)
    }
}

impl<T: Value, E: Value> Observable<T, E> {
    /// Observe `self` into a fresh [`ReplayBuffer`].
    ///
    /// Disposing the returned handle stops the observation and closes the
    /// buffer, which releases any reader blocked on it.
    #[must_use]
    pub fn replay(&self) -> (ReplayBuffer<T, E>, DisposableRef) {
        let buffer = ReplayBuffer::new();
        let sink = buffer.clone();
        let subscription = self.observe(move |event| {
            sink.send(event);
        });
        let closer = buffer.clone();
        let handle = ActionDisposable::new(move || {
            subscription.dispose();
            closer.close();
        });
        (buffer, Arc::new(handle) as DisposableRef)
    }
}
