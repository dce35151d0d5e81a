//! `zip_with`: pair values from two streams in arrival order.
//!
//! # Invariants
//!
//! 1. Both buffers and both completion flags live in one [`Atomic`] cell.
//! 2. Pairs are popped and emitted while holding the downstream observer's
//!    delivery lock, so pairs leave in the order they were formed even when
//!    the two sides emit from different threads.
//! 3. Once a side has completed and its buffer is empty, no further pair can
//!    form and the output completes.
//!
//! Buffers are unbounded: a fast side never waits for a slow one.

use std::collections::VecDeque;
use std::sync::Arc;

use rivulet_core::{Atomic, CompositeDisposable, Disposable, DisposableRef};
use smallvec::SmallVec;

use crate::event::{Event, Value};
use crate::observable::Observable;
use crate::observer::Observer;

struct ZipState<A, B> {
    left: VecDeque<A>,
    right: VecDeque<B>,
    left_done: bool,
    right_done: bool,
    terminated: bool,
}

impl<A, B> ZipState<A, B> {
    fn drained(&self) -> bool {
        (self.left_done && self.left.is_empty()) || (self.right_done && self.right.is_empty())
    }
}

enum Signal<A, B, E> {
    Left(A),
    Right(B),
    LeftDone,
    RightDone,
    Failed(E),
}

enum Outcome<A, B, E> {
    Pairs(SmallVec<[(A, B); 2]>, bool),
    Failed(E),
    Ignored,
}

struct Zip<A, B, E> {
    observer: Observer<(A, B), E>,
    state: Atomic<ZipState<A, B>>,
    subscriptions: Arc<CompositeDisposable>,
}

impl<A: Value, B: Value, E: Value> Zip<A, B, E> {
    fn on_signal(&self, signal: Signal<A, B, E>) {
        self.observer.serialized(|| {
            let outcome = self.state.with_value_mut(|st| {
                if st.terminated {
                    return Outcome::Ignored;
                }
                match signal {
                    Signal::Left(value) => st.left.push_back(value),
                    Signal::Right(value) => st.right.push_back(value),
                    Signal::LeftDone => st.left_done = true,
                    Signal::RightDone => st.right_done = true,
                    Signal::Failed(error) => {
                        st.terminated = true;
                        st.left.clear();
                        st.right.clear();
                        return Outcome::Failed(error);
                    }
                }
                let ready = st.left.len().min(st.right.len());
                let pairs = st
                    .left
                    .drain(..ready)
                    .zip(st.right.drain(..ready))
                    .collect();
                let complete = st.drained();
                if complete {
                    st.terminated = true;
                }
                Outcome::Pairs(pairs, complete)
            });

            match outcome {
                Outcome::Pairs(pairs, complete) => {
                    for pair in pairs {
                        self.observer.send_next(pair);
                    }
                    if complete {
                        self.observer.send_completed();
                        self.subscriptions.dispose();
                    }
                }
                Outcome::Failed(error) => {
                    self.observer.send_error(error);
                    self.subscriptions.dispose();
                }
                Outcome::Ignored => {}
            }
        });
    }
}

impl<T: Value, E: Value> Observable<T, E> {
    /// See [`Stream::zip_with`](crate::Stream::zip_with).
    ///
    /// An error from either side is forwarded immediately and discards
    /// anything buffered.
    #[must_use]
    pub fn zip_with<U: Value>(&self, other: &Observable<U, E>) -> Observable<(T, U), E> {
        let left = self.clone();
        let right = other.clone();
        Observable::new(move |observer| {
            let zip = Arc::new(Zip {
                observer,
                state: Atomic::new(ZipState {
                    left: VecDeque::new(),
                    right: VecDeque::new(),
                    left_done: false,
                    right_done: false,
                    terminated: false,
                }),
                subscriptions: Arc::new(CompositeDisposable::new()),
            });

            let z = Arc::clone(&zip);
            zip.subscriptions.add(left.observe_for(&zip.observer, move |event| match event {
                Event::Next(value) => z.on_signal(Signal::Left(value)),
                Event::Error(error) => z.on_signal(Signal::Failed(error)),
                Event::Completed => z.on_signal(Signal::LeftDone),
            }));
            if !zip.subscriptions.is_disposed() {
                let z = Arc::clone(&zip);
                zip.subscriptions.add(right.observe_for(&zip.observer, move |event| match event {
                    Event::Next(value) => z.on_signal(Signal::Right(value)),
                    Event::Error(error) => z.on_signal(Signal::Failed(error)),
                    Event::Completed => z.on_signal(Signal::RightDone),
                }));
            }
            Some(Arc::clone(&zip.subscriptions) as DisposableRef)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observable::tests::{collect, manual};
    use std::sync::Mutex;

    type Ints = Observable<i32, String>;
    type Strs = Observable<&'static str, String>;

    #[test]
    fn unmatched_values_are_dropped() {
        let a = Ints::from_values([1, 2, 3]);
        let b = Strs::from_values(["a", "b"]);
        assert_eq!(
            collect(&a.zip_with(&b)),
            vec![Event::Next((1, "a")), Event::Next((2, "b")), Event::Completed]
        );
    }

    #[test]
    fn waits_for_buffered_values_after_completion() {
        let (a, a_obs) = manual::<i32>();
        let (b, b_obs) = manual::<&'static str>();
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = Arc::clone(&log);
        let _sub = a.zip_with(&b).observe(move |e| l.lock().unwrap().push(e));

        let left = a_obs.lock().unwrap()[0].clone();
        let right = b_obs.lock().unwrap()[0].clone();
        left.send_next(1);
        left.send_next(2);
        left.send_completed();
        assert!(log.lock().unwrap().is_empty());

        right.send_next("x");
        assert_eq!(*log.lock().unwrap(), vec![Event::Next((1, "x"))]);
        right.send_next("y");
        assert_eq!(
            *log.lock().unwrap(),
            vec![Event::Next((1, "x")), Event::Next((2, "y")), Event::Completed]
        );
        assert!(right.is_stopped());
    }

    #[test]
    fn error_from_either_side_ends_immediately() {
        let (a, a_obs) = manual::<i32>();
        let (b, b_obs) = manual::<&'static str>();
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = Arc::clone(&log);
        let _sub = a.zip_with(&b).observe(move |e| l.lock().unwrap().push(e));

        let left = a_obs.lock().unwrap()[0].clone();
        let right = b_obs.lock().unwrap()[0].clone();
        left.send_next(1);
        right.send_error("right failed".into());
        left.send_next(2);
        assert_eq!(
            *log.lock().unwrap(),
            vec![Event::Error("right failed".to_string())]
        );
        assert!(left.is_stopped());
    }

    #[test]
    fn empty_side_completes_without_values() {
        let out = Ints::from_values([1, 2]).zip_with(&Strs::empty());
        assert_eq!(collect(&out), vec![Event::Completed]);
    }
}
