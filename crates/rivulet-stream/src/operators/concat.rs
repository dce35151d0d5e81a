use std::sync::Arc;

use rivulet_core::{DisposableRef, SerialDisposable};

use crate::event::{Event, Value};
use crate::observable::Observable;

impl<T: Value, E: Value> Observable<T, E> {
    /// Everything from `self`; once it completes, everything from `other`.
    ///
    /// Errors from `self` end the output without subscribing to `other`.
    #[must_use]
    pub fn concat(&self, other: &Self) -> Self {
        let first = self.clone();
        let second = other.clone();
        Observable::new(move |observer| {
            let active = Arc::new(SerialDisposable::new());
            let switch = Arc::clone(&active);
            let second = second.clone();
            let downstream = observer.clone();
            let head = first.observe_for(&observer, move |event| match event {
                Event::Completed => {
                    let forward = downstream.clone();
                    let tail = second.observe_for(&downstream, move |event| forward.send(event));
                    switch.set(Some(tail));
                }
                other => downstream.send(other),
            });
            // `self` may already have completed synchronously and installed
            // `other`'s subscription.
            active.set_if_vacant(head);
            Some(active as DisposableRef)
        })
    }
}
