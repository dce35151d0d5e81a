use crate::event::{Event, Value};
use crate::observable::Observable;

impl<T: Value, E: Value> Observable<T, E> {
    /// Wrap every event, terminal ones included, in a `Next`, then complete.
    #[must_use]
    pub fn materialize(&self) -> Observable<Event<T, E>, E> {
        let source = self.clone();
        Observable::new(move |observer| {
            let downstream = observer.clone();
            Some(source.observe_for(&observer, move |event| {
                let terminal = event.is_terminating();
                downstream.send_next(event);
                if terminal {
                    downstream.send_completed();
                }
            }))
        })
    }
}

/// Turn wrapped events back into real ones; a wrapped terminal event ends
/// the output.
pub fn dematerialize<T: Value, E: Value>(events: &Observable<Event<T, E>, E>) -> Observable<T, E> {
    events.flatten_scan((), |_, event| match event {
        Event::Next(value) => (Some(()), Observable::single(value)),
        Event::Error(error) => (None, Observable::error(error)),
        Event::Completed => (None, Observable::empty()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observable::tests::collect;

    type Obs = Observable<i32, String>;

    #[test]
    fn materialize_wraps_completion() {
        let out = Obs::from_values([1, 2]).materialize();
        assert_eq!(
            collect(&out),
            vec![
                Event::Next(Event::Next(1)),
                Event::Next(Event::Next(2)),
                Event::Next(Event::Completed),
                Event::Completed
            ]
        );
    }

    #[test]
    fn materialize_wraps_errors() {
        let out = Obs::error("e".into()).materialize();
        assert_eq!(
            collect(&out),
            vec![Event::Next(Event::Error("e".to_string())), Event::Completed]
        );
    }

    #[test]
    fn dematerialize_inverts_materialize() {
        let source = Obs::from_values([3, 4]).concat(&Obs::error("tail".into()));
        assert_eq!(collect(&dematerialize(&source.materialize())), collect(&source));
    }

    #[test]
    fn dematerialize_stops_at_wrapped_terminal() {
        let wrapped = Observable::<Event<i32, String>, String>::from_values([
            Event::Next(1),
            Event::Completed,
            Event::Next(2),
        ]);
        assert_eq!(
            collect(&dematerialize(&wrapped)),
            vec![Event::Next(1), Event::Completed]
        );
    }
}
