#![forbid(unsafe_code)]

//! The scheduler abstraction: "run this work", decoupled from when and where.
//!
//! # Contract
//!
//! - [`Scheduler::schedule`] runs work as soon as the scheduler's policy
//!   allows.
//! - [`Scheduler::schedule_after`] runs work at or after an absolute time.
//! - [`RepeatingScheduler::schedule_repeating`] fires first at `start`, then
//!   every `interval` until the returned handle is disposed. A tick never
//!   fires before its due time and may fire up to `leeway` after it.
//!
//! Returned disposables cancel *pending* work only. Work that has already
//! started is never interrupted. `None` means the work already ran
//! synchronously and there is nothing left to cancel.
//!
//! # Current scheduler
//!
//! While a scheduler runs a work item, [`current()`] on that thread returns
//! it. The previous association is restored when the work returns or
//! unwinds.

mod current;
mod dispatcher;
mod immediate;
mod main;
mod queue;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rivulet_core::DisposableRef;
use web_time::{Duration, Instant};

pub use current::{current, schedule_on_current};
pub use immediate::ImmediateScheduler;
pub use main::{MainLoop, MainScheduler};
pub use queue::QueueScheduler;

/// A unit of one-shot work.
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// A unit of repeating work.
pub type RepeatingWork = Box<dyn FnMut() + Send + 'static>;

/// Shared handle to any scheduler.
pub type SchedulerRef = Arc<dyn Scheduler>;

/// Shared handle to a scheduler with repeating timers.
pub type RepeatingSchedulerRef = Arc<dyn RepeatingScheduler>;

// ─── Scheduler IDs ───────────────────────────────────────────────────────────

static NEXT_SCHEDULER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a scheduler instance (clones share it).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SchedulerId(u64);

impl SchedulerId {
    /// Shared by every [`ImmediateScheduler`].
    pub const IMMEDIATE: Self = Self(0);

    pub(crate) fn next() -> Self {
        Self(NEXT_SCHEDULER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

// ─── Traits ──────────────────────────────────────────────────────────────────

pub trait Scheduler: Send + Sync {
    fn id(&self) -> SchedulerId;

    /// Human-readable name (for tracing/logging).
    fn label(&self) -> &str;

    fn schedule(&self, work: Work) -> Option<DisposableRef>;

    fn schedule_after(&self, when: Instant, work: Work) -> Option<DisposableRef>;
}

pub trait RepeatingScheduler: Scheduler {
    fn schedule_repeating(
        &self,
        start: Instant,
        interval: Duration,
        leeway: Duration,
        work: RepeatingWork,
    ) -> DisposableRef;
}

/// Intervals shorter than this are rounded up.
pub const MIN_REPEAT_INTERVAL: Duration = Duration::from_millis(1);
