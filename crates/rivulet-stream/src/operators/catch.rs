use std::sync::Arc;

use rivulet_core::{DisposableRef, SerialDisposable};

use crate::event::{Event, Value};
use crate::observable::Observable;

impl<T: Value, E: Value> Observable<T, E> {
    /// On error, switch to the stream produced by `handler(error)`.
    ///
    /// Values and completion pass through unchanged.
    pub fn catch_error<F>(&self, handler: F) -> Self
    where
        F: Fn(E) -> Self + Send + Sync + 'static,
    {
        let source = self.clone();
        let handler = Arc::new(handler);
        Observable::new(move |observer| {
            let active = Arc::new(SerialDisposable::new());
            let switch = Arc::clone(&active);
            let handler = Arc::clone(&handler);
            let downstream = observer.clone();
            let head = source.observe_for(&observer, move |event| match event {
                Event::Error(error) => {
                    tracing::trace!("catch_error switching to fallback");
                    let fallback = handler(error);
                    let forward = downstream.clone();
                    let tail = fallback.observe_for(&downstream, move |event| forward.send(event));
                    switch.set(Some(tail));
                }
                other => downstream.send(other),
            });
            active.set_if_vacant(head);
            Some(active as DisposableRef)
        })
    }
}
