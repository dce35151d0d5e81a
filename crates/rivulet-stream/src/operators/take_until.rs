use std::sync::Arc;

use rivulet_core::{CompositeDisposable, Disposable, DisposableRef};

use crate::event::{Event, Value};
use crate::observable::Observable;

impl<T: Value, E: Value> Observable<T, E> {
    /// Mirror `self` until `trigger` emits a value or completes, then
    /// complete. A trigger error is ignored.
    ///
    /// The trigger is observed first, so a trigger that fires synchronously
    /// completes the output without ever observing `self`.
    #[must_use]
    pub fn take_until<X: Value, E2: Value>(&self, trigger: &Observable<X, E2>) -> Observable<T, E> {
        let source = self.clone();
        let trigger = trigger.clone();
        Observable::new(move |observer| {
            let subscriptions = Arc::new(CompositeDisposable::new());

            let downstream = observer.clone();
            let subs = Arc::clone(&subscriptions);
            subscriptions.add(trigger.observe_for(&observer, move |event| {
                if !matches!(event, Event::Error(_)) {
                    tracing::trace!("take_until triggered");
                    downstream.send_completed();
                    subs.dispose();
                }
            }));

            if !subscriptions.is_disposed() {
                let subs = Arc::clone(&subscriptions);
                let forward = observer.clone();
                subscriptions.add(source.observe_for(&observer, move |event| {
                    let terminal = event.is_terminating();
                    forward.send(event);
                    if terminal {
                        subs.dispose();
                    }
                }));
            }
            Some(subscriptions as DisposableRef)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observable::tests::{collect, manual};
    use std::sync::Mutex;

    type Obs = Observable<i32, String>;

    #[test]
    fn trigger_value_completes_and_disposes_source() {
        let (source, source_obs) = manual::<i32>();
        let (trigger, trigger_obs) = manual::<()>();
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = Arc::clone(&log);
        let _sub = source
            .take_until(&trigger)
            .observe(move |e| l.lock().unwrap().push(e));

        let values = source_obs.lock().unwrap()[0].clone();
        let fire = trigger_obs.lock().unwrap()[0].clone();
        values.send_next(1);
        fire.send_next(());
        values.send_next(2);

        assert_eq!(*log.lock().unwrap(), vec![Event::Next(1), Event::Completed]);
        assert!(values.is_stopped());
    }

    #[test]
    fn trigger_error_is_ignored() {
        let (source, source_obs) = manual::<i32>();
        let (trigger, trigger_obs) = manual::<()>();
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = Arc::clone(&log);
        let _sub = source
            .take_until(&trigger)
            .observe(move |e| l.lock().unwrap().push(e));

        let values = source_obs.lock().unwrap()[0].clone();
        trigger_obs.lock().unwrap()[0].send_error("ignored".into());
        values.send_next(1);
        values.send_completed();
        assert_eq!(*log.lock().unwrap(), vec![Event::Next(1), Event::Completed]);
    }

    #[test]
    fn completed_trigger_skips_the_source() {
        let (source, source_obs) = manual::<i32>();
        let out = source.take_until(&Observable::<(), String>::empty());
        assert_eq!(collect(&out), vec![Event::Completed]);
        assert!(source_obs.lock().unwrap().is_empty());
    }

    #[test]
    fn source_terminal_passes_through() {
        let out = Obs::from_values([1, 2]).take_until(&Observable::<(), String>::never());
        assert_eq!(
            collect(&out),
            vec![Event::Next(1), Event::Next(2), Event::Completed]
        );
    }
}
