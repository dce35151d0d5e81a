use rivulet_runtime::RepeatingSchedulerRef;
use web_time::{Duration, Instant};

use crate::event::Value;
use crate::observable::Observable;

impl<E: Value> Observable<Instant, E> {
    /// Emit the current time every `period`, first one period after each
    /// observation starts. Never terminates; dispose to stop the timer.
    ///
    /// `leeway` is how late a tick may fire so the scheduler can coalesce
    /// wakeups.
    #[must_use]
    pub fn interval(period: Duration, scheduler: RepeatingSchedulerRef, leeway: Duration) -> Self {
        Observable::new(move |observer| {
            tracing::debug!(?period, scheduler = scheduler.label(), "interval started");
            Some(scheduler.schedule_repeating(
                Instant::now() + period,
                period,
                leeway,
                Box::new(move || observer.send_next(Instant::now())),
            ))
        })
    }
}
