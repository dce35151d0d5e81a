use std::sync::Arc;

use rivulet_core::{Atomic, CompositeDisposable, Disposable, DisposableRef};

use crate::event::{Event, Value};
use crate::observable::Observable;
use crate::observer::Observer;

struct LatestState<A, B> {
    left: Option<A>,
    right: Option<B>,
    left_done: bool,
    right_done: bool,
    terminated: bool,
}

impl<A, B> LatestState<A, B> {
    fn completion<E>(&mut self) -> Outcome<A, B, E> {
        if self.left_done && self.right_done {
            self.terminated = true;
            Outcome::Complete
        } else {
            Outcome::Nothing
        }
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
    Emit((A, B)),
    Complete,
    Fail(E),
    Nothing,
}

struct CombineLatest<A, B, E> {
    observer: Observer<(A, B), E>,
    state: Atomic<LatestState<A, B>>,
    subscriptions: Arc<CompositeDisposable>,
}

impl<A: Value, B: Value, E: Value> CombineLatest<A, B, E> {
    fn on_signal(&self, signal: Signal<A, B, E>) {
        // Held across the state update and the emission so combined values
        // leave in the order their inputs were applied.
        self.observer.serialized(|| {
            let outcome = self.state.with_value_mut(|st| {
                if st.terminated {
                    return Outcome::Nothing;
                }
                match signal {
                    Signal::Left(value) => {
                        st.left = Some(value.clone());
                        st.right.clone().map_or(Outcome::Nothing, |b| Outcome::Emit((value, b)))
                    }
                    Signal::Right(value) => {
                        st.right = Some(value.clone());
                        st.left.clone().map_or(Outcome::Nothing, |a| Outcome::Emit((a, value)))
                    }
                    Signal::LeftDone => {
                        st.left_done = true;
                        st.completion()
                    }
                    Signal::RightDone => {
                        st.right_done = true;
                        st.completion()
                    }
                    Signal::Failed(error) => {
                        st.terminated = true;
                        Outcome::Fail(error)
                    }
                }
            });

            match outcome {
                Outcome::Emit(pair) => self.observer.send_next(pair),
                Outcome::Complete => {
                    self.observer.send_completed();
                    self.subscriptions.dispose();
                }
                Outcome::Fail(error) => {
                    self.observer.send_error(error);
                    self.subscriptions.dispose();
                }
                Outcome::Nothing => {}
            }
        });
    }
}

impl<T: Value, E: Value> Observable<T, E> {
    /// Pair the latest value of each side whenever either side emits, once
    /// both have emitted at least once.
    ///
    /// Completes when both sides have completed; an error from either side
    /// is forwarded immediately.
    #[must_use]
    pub fn combine_latest_with<U: Value>(&self, other: &Observable<U, E>) -> Observable<(T, U), E> {
        let left = self.clone();
        let right = other.clone();
        Observable::new(move |observer| {
            let combine = Arc::new(CombineLatest {
                observer,
                state: Atomic::new(LatestState {
                    left: None,
                    right: None,
                    left_done: false,
                    right_done: false,
                    terminated: false,
                }),
                subscriptions: Arc::new(CompositeDisposable::new()),
            });

            let c = Arc::clone(&combine);
            let left_sub = left.observe_for(&combine.observer, move |event| match event {
                Event::Next(value) => c.on_signal(Signal::Left(value)),
                Event::Error(error) => c.on_signal(Signal::Failed(error)),
                Event::Completed => c.on_signal(Signal::LeftDone),
            });
            combine.subscriptions.add(left_sub);
            if !combine.subscriptions.is_disposed() {
                let c = Arc::clone(&combine);
                let right_sub = right.observe_for(&combine.observer, move |event| match event {
                    Event::Next(value) => c.on_signal(Signal::Right(value)),
                    Event::Error(error) => c.on_signal(Signal::Failed(error)),
                    Event::Completed => c.on_signal(Signal::RightDone),
                });
                combine.subscriptions.add(right_sub);
            }
            Some(Arc::clone(&combine.subscriptions) as DisposableRef)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observable::tests::{collect, manual};
    use std::sync::Mutex;

    #[test]
    fn emits_only_once_both_sides_have_values() {
        let (a, a_obs) = manual::<i32>();
        let (b, b_obs) = manual::<&'static str>();
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = Arc::clone(&log);
        let _sub = a
            .combine_latest_with(&b)
            .observe(move |e| l.lock().unwrap().push(e));

        let left = a_obs.lock().unwrap()[0].clone();
        let right = b_obs.lock().unwrap()[0].clone();
        left.send_next(1);
        assert!(log.lock().unwrap().is_empty());
        right.send_next("x");
        assert_eq!(*log.lock().unwrap(), vec![Event::Next((1, "x"))]);
        left.send_next(2);
        assert_eq!(
            *log.lock().unwrap(),
            vec![Event::Next((1, "x")), Event::Next((2, "x"))]
        );
    }

    #[test]
    fn completes_only_when_both_complete() {
        let (a, a_obs) = manual::<i32>();
        let (b, b_obs) = manual::<i32>();
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = Arc::clone(&log);
        let _sub = a
            .combine_latest_with(&b)
            .observe(move |e| l.lock().unwrap().push(e));

        let left = a_obs.lock().unwrap()[0].clone();
        let right = b_obs.lock().unwrap()[0].clone();
        left.send_next(1);
        left.send_completed();
        right.send_next(10);
        right.send_next(20);
        assert_eq!(
            *log.lock().unwrap(),
            vec![Event::Next((1, 10)), Event::Next((1, 20))]
        );
        right.send_completed();
        assert_eq!(log.lock().unwrap().last(), Some(&Event::Completed));
    }

    #[test]
    fn error_wins_immediately() {
        let out = Observable::<i32, String>::never()
            .combine_latest_with(&Observable::<i32, String>::error("nope".into()));
        assert_eq!(collect(&out), vec![Event::Error("nope".to_string())]);
    }
}
