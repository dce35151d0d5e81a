#![forbid(unsafe_code)]

//! Thread-local "current scheduler" association.

use std::cell::RefCell;

use rivulet_core::DisposableRef;

use super::{ImmediateScheduler, Scheduler, SchedulerRef, Work};

thread_local! {
    static CURRENT: RefCell<Option<SchedulerRef>> = const { RefCell::new(None) };
}

/// The scheduler running the calling work item, if any.
#[must_use]
pub fn current() -> Option<SchedulerRef> {
    CURRENT.with(|cell| cell.borrow().clone())
}

/// Schedule `work` on the current scheduler, or run it immediately when the
/// caller is not inside scheduled work.
pub fn schedule_on_current(work: Work) -> Option<DisposableRef> {
    match current() {
        Some(scheduler) => scheduler.schedule(work),
        None => ImmediateScheduler.schedule(work),
    }
}

/// Installs a scheduler as current for the guard's lifetime.
///
/// Dropping the guard restores the previous association, which also happens
/// during unwinding.
pub(crate) struct CurrentGuard {
    previous: Option<SchedulerRef>,
}

impl CurrentGuard {
    pub(crate) fn enter(scheduler: SchedulerRef) -> Self {
        let previous = CURRENT.with(|cell| cell.replace(Some(scheduler)));
        Self { previous }
    }
}

impl Drop for CurrentGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        // Drop the replaced handle outside the borrow.
        let _replaced = CURRENT.with(|cell| cell.replace(previous));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::SchedulerId;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn no_current_outside_work() {
        assert!(current().is_none());
    }

    #[test]
    fn guard_restores_previous() {
        {
            let _outer = CurrentGuard::enter(Arc::new(ImmediateScheduler));
            assert_eq!(current().map(|s| s.id()), Some(SchedulerId::IMMEDIATE));
        }
        assert!(current().is_none());
    }

    #[test]
    fn guard_restores_on_unwind() {
        let result = std::panic::catch_unwind(|| {
            let _guard = CurrentGuard::enter(Arc::new(ImmediateScheduler));
            panic!("work failed");
        });
        assert!(result.is_err());
        assert!(current().is_none());
    }

    #[test]
    fn schedule_on_current_without_scheduler_runs_inline() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let token = schedule_on_current(Box::new(move || flag.store(true, Ordering::SeqCst)));
        assert!(token.is_none());
        assert!(ran.load(Ordering::SeqCst));
    }
}
