#![forbid(unsafe_code)]

use std::sync::Arc;

use rivulet_core::DisposableRef;
use web_time::Instant;

use super::current::CurrentGuard;
use super::{Scheduler, SchedulerId, Work};

/// Runs work synchronously on the calling thread.
///
/// [`schedule_after`](Scheduler::schedule_after) blocks the caller until the
/// target time. Nothing is ever pending, so every call returns `None`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImmediateScheduler;

impl Scheduler for ImmediateScheduler {
    fn id(&self) -> SchedulerId {
        SchedulerId::IMMEDIATE
    }

    fn label(&self) -> &str {
        "immediate"
    }

    fn schedule(&self, work: Work) -> Option<DisposableRef> {
        let _current = CurrentGuard::enter(Arc::new(*self));
        work();
        None
    }

    fn schedule_after(&self, when: Instant, work: Work) -> Option<DisposableRef> {
        let wait = when.saturating_duration_since(Instant::now());
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
        self.schedule(work)
    }
}
