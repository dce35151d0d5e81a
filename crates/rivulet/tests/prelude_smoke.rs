//! The prelude is enough to build, schedule, and observe a pipeline.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use rivulet::prelude::*;
use web_time::Duration;

type Obs = Observable<i32, String>;

fn collect(obs: &Obs) -> Vec<Event<i32, String>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let _sub = obs.observe(move |event| sink.lock().unwrap().push(event));
    let events = log.lock().unwrap().clone();
    events
}

#[test]
fn single_map_doubles() {
    assert_eq!(
        collect(&Obs::single(5).map(|v| v * 2)),
        vec![Event::Next(10), Event::Completed]
    );
}

#[test]
fn empty_concat_single() {
    assert_eq!(
        collect(&Obs::empty().concat(&Obs::single(7))),
        vec![Event::Next(7), Event::Completed]
    );
}

#[test]
fn promise_result_feeds_a_stream() {
    let queue: SchedulerRef = Arc::new(QueueScheduler::new("prelude-smoke").unwrap());
    let promise = Promise::new(Arc::clone(&queue), || 21);
    let doubled = promise.then(|v| v * 2);

    let (tx, rx) = mpsc::channel();
    let _sub = Obs::from_values([doubled.result().unwrap()])
        .deliver_on(queue)
        .observe(move |event| {
            let _ = tx.send(event);
        });
    assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), Event::Next(42));
    assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), Event::Completed);
}

#[test]
fn replay_records_for_late_readers() {
    let (buffer, _sub) = Obs::from_values([1, 2]).catch_error(|_| Obs::empty()).replay();
    assert_eq!(
        buffer.iter().collect::<Vec<_>>(),
        vec![Event::Next(1), Event::Next(2), Event::Completed]
    );
}
