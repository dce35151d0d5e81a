//! The abstract stream algebra.
//!
//! [`Stream`] names the small set of capabilities a stream type must
//! provide; every other operator is written once, here, on top of
//! [`flatten_scan`](Stream::flatten_scan). `catch_error` and `materialize`
//! are capabilities rather than derived operators because `flatten_scan`
//! only ever sees values, never terminal events.
//!
//! ```
//! use rivulet_stream::{Event, Observable, Stream};
//! use std::sync::{Arc, Mutex};
//!
//! let log = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&log);
//! Observable::<i32, String>::from_values(1..=10)
//!     .filter(|v| v % 2 == 0)
//!     .map(|v| v * 10)
//!     .take(2)
//!     .observe(move |event| sink.lock().unwrap().push(event));
//! assert_eq!(
//!     *log.lock().unwrap(),
//!     vec![Event::Next(20), Event::Next(40), Event::Completed]
//! );
//! ```

use std::collections::VecDeque;

use crate::event::{Event, Value};

/// A composable, terminating stream of values.
pub trait Stream: Sized + Clone + Send + Sync + 'static {
    type Item: Value;
    type Error: Value;

    /// The same kind of stream carrying `U` values.
    type Of<U: Value>: Stream<Item = U, Error = Self::Error>;

    fn empty() -> Self;

    fn single(value: Self::Item) -> Self;

    fn error(error: Self::Error) -> Self;

    /// Emits each of `values` in order, then completes. Emission is flat, so
    /// the number of values does not grow the stack.
    fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = Self::Item>;

    /// Everything from `self`, then, once it completes, everything from
    /// `other`.
    fn concat(&self, other: &Self) -> Self;

    /// Pair values from both streams in arrival order.
    fn zip_with<U: Value>(&self, other: &Self::Of<U>) -> Self::Of<(Self::Item, U)>;

    /// The primitive operator.
    ///
    /// For each value, `f` receives the accumulator and the value and
    /// returns the next accumulator plus an inner stream whose events are
    /// merged into the output. Returning `None` as the accumulator stops
    /// consuming upstream; inner streams already started still run to
    /// completion. The output completes once upstream is finished (or cut
    /// off) and every inner stream has completed. Any error ends it
    /// immediately.
    fn flatten_scan<S, U, F>(&self, initial: S, f: F) -> Self::Of<U>
    where
        S: Value,
        U: Value,
        F: Fn(&S, Self::Item) -> (Option<S>, Self::Of<U>) + Send + Sync + 'static;

    /// On error, continue with the stream produced by `f`.
    fn catch_error<F>(&self, f: F) -> Self
    where
        F: Fn(Self::Error) -> Self + Send + Sync + 'static;

    /// Every event, terminal ones included, wrapped in a `Next`, followed by
    /// `Completed`.
    fn materialize(&self) -> Self::Of<Event<Self::Item, Self::Error>>;

    // ─── Derived operators ───────────────────────────────────────────────

    fn map<U, F>(&self, f: F) -> Self::Of<U>
    where
        U: Value,
        F: Fn(Self::Item) -> U + Send + Sync + 'static,
    {
        self.flatten_scan::<(), U, _>((), move |_, value| {
            (Some(()), <Self::Of<U> as Stream>::single(f(value)))
        })
    }

    fn filter<F>(&self, predicate: F) -> Self::Of<Self::Item>
    where
        F: Fn(&Self::Item) -> bool + Send + Sync + 'static,
    {
        self.flatten_scan::<(), Self::Item, _>((), move |_, value| {
            let inner = if predicate(&value) {
                <Self::Of<Self::Item> as Stream>::single(value)
            } else {
                <Self::Of<Self::Item> as Stream>::empty()
            };
            (Some(()), inner)
        })
    }

    /// Map every value to a stream and merge all of them.
    fn flat_map<U, F>(&self, f: F) -> Self::Of<U>
    where
        U: Value,
        F: Fn(Self::Item) -> Self::Of<U> + Send + Sync + 'static,
    {
        self.flatten_scan::<(), U, _>((), move |_, value| (Some(()), f(value)))
    }

    /// The first `count` values. Stops consuming upstream as soon as the
    /// last one arrives.
    fn take(&self, count: usize) -> Self::Of<Self::Item> {
        if count == 0 {
            return <Self::Of<Self::Item> as Stream>::empty();
        }
        self.flatten_scan::<usize, Self::Item, _>(0, move |taken, value| {
            let taken = taken + 1;
            let next = (taken < count).then_some(taken);
            (next, <Self::Of<Self::Item> as Stream>::single(value))
        })
    }

    /// Values up to (excluding) the first one failing `predicate`; then
    /// completes.
    fn take_while<F>(&self, predicate: F) -> Self::Of<Self::Item>
    where
        F: Fn(&Self::Item) -> bool + Send + Sync + 'static,
    {
        self.flatten_scan::<(), Self::Item, _>((), move |_, value| {
            if predicate(&value) {
                (Some(()), <Self::Of<Self::Item> as Stream>::single(value))
            } else {
                (None, <Self::Of<Self::Item> as Stream>::empty())
            }
        })
    }

    fn skip(&self, count: usize) -> Self::Of<Self::Item> {
        self.flatten_scan::<usize, Self::Item, _>(0, move |skipped, value| {
            if *skipped < count {
                (
                    Some(skipped + 1),
                    <Self::Of<Self::Item> as Stream>::empty(),
                )
            } else {
                (
                    Some(*skipped),
                    <Self::Of<Self::Item> as Stream>::single(value),
                )
            }
        })
    }

    /// Drop values while `predicate` holds, then pass everything from the
    /// first failing value on.
    fn skip_while<F>(&self, predicate: F) -> Self::Of<Self::Item>
    where
        F: Fn(&Self::Item) -> bool + Send + Sync + 'static,
    {
        self.flatten_scan::<bool, Self::Item, _>(false, move |passing, value| {
            if *passing || !predicate(&value) {
                (Some(true), <Self::Of<Self::Item> as Stream>::single(value))
            } else {
                (Some(false), <Self::Of<Self::Item> as Stream>::empty())
            }
        })
    }

    /// The last `count` values, emitted once upstream completes. An upstream
    /// error is forwarded instead.
    fn take_last(
        &self,
        count: usize,
    ) -> <Self::Of<Event<Self::Item, Self::Error>> as Stream>::Of<Self::Item> {
        self.materialize()
            .flatten_scan::<VecDeque<Self::Item>, Self::Item, _>(
                VecDeque::new(),
                move |tail, event| match event {
                    Event::Next(value) => {
                        let mut tail = tail.clone();
                        if count > 0 {
                            if tail.len() == count {
                                tail.pop_front();
                            }
                            tail.push_back(value);
                        }
                        (Some(tail), Stream::empty())
                    }
                    Event::Error(error) => (None, Stream::error(error)),
                    Event::Completed => (None, Stream::from_values(tail.iter().cloned())),
                },
            )
    }
}
