use std::sync::Arc;

use rivulet_core::{Atomic, CompositeDisposable, Disposable, DisposableRef};

use crate::event::{Event, Value};
use crate::observable::Observable;

impl<T: Value, E: Value> Observable<T, E> {
    /// Re-emit the latest value of `self` each time `sampler` emits a value.
    ///
    /// Pulses that arrive before `self` has produced anything are ignored,
    /// as are the sampler's own terminal events. Terminal events of `self`
    /// pass straight through and end the output.
    #[must_use]
    pub fn sample<X: Value, E2: Value>(&self, sampler: &Observable<X, E2>) -> Observable<T, E> {
        let source = self.clone();
        let sampler = sampler.clone();
        Observable::new(move |observer| {
            let latest: Arc<Atomic<Option<T>>> = Arc::new(Atomic::new(None));
            let subscriptions = Arc::new(CompositeDisposable::new());

            let remembered = Arc::clone(&latest);
            let downstream = observer.clone();
            let subs = Arc::clone(&subscriptions);
            subscriptions.add(source.observe_for(&observer, move |event| match event {
                Event::Next(value) => remembered.set(Some(value)),
                terminal => {
                    downstream.send(terminal);
                    subs.dispose();
                }
            }));

            if !subscriptions.is_disposed() {
                let forward = observer.clone();
                subscriptions.add(sampler.observe_for(&observer, move |event| {
                    if event.is_next() {
                        if let Some(value) = latest.get() {
                            forward.send_next(value);
                        }
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

    #[test]
    fn pulses_re_emit_the_latest_value() {
        let (source, source_obs) = manual::<i32>();
        let (pulse, pulse_obs) = manual::<()>();
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = Arc::clone(&log);
        let _sub = source
            .sample(&pulse)
            .observe(move |e| l.lock().unwrap().push(e));

        let values = source_obs.lock().unwrap()[0].clone();
        let ticks = pulse_obs.lock().unwrap()[0].clone();
        ticks.send_next(());
        assert!(log.lock().unwrap().is_empty());

        values.send_next(1);
        values.send_next(2);
        ticks.send_next(());
        ticks.send_next(());
        values.send_next(3);
        ticks.send_next(());
        assert_eq!(
            *log.lock().unwrap(),
            vec![Event::Next(2), Event::Next(2), Event::Next(3)]
        );
    }

    #[test]
    fn sampler_terminals_are_ignored() {
        let (source, source_obs) = manual::<i32>();
        let (pulse, pulse_obs) = manual::<()>();
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = Arc::clone(&log);
        let _sub = source
            .sample(&pulse)
            .observe(move |e| l.lock().unwrap().push(e));

        let values = source_obs.lock().unwrap()[0].clone();
        let ticks = pulse_obs.lock().unwrap()[0].clone();
        values.send_next(9);
        ticks.send_error("sampler failed".into());
        values.send_completed();
        assert_eq!(*log.lock().unwrap(), vec![Event::Completed]);
    }

    #[test]
    fn source_error_passes_through_and_stops_the_sampler() {
        let (pulse, pulse_obs) = manual::<()>();
        let out = Observable::<i32, String>::error("bad".into()).sample(&pulse);
        assert_eq!(collect(&out), vec![Event::Error("bad".to_string())]);
        assert!(pulse_obs.lock().unwrap().is_empty());
    }
}
