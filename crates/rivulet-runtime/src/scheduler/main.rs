#![forbid(unsafe_code)]

//! Main/UI-affine scheduler.
//!
//! [`MainScheduler`] is a serial queue whose jobs run on one designated
//! thread: the thread that created it and owns the companion [`MainLoop`].
//! That thread drains work at its own pace, e.g. once per UI frame with
//! [`MainLoop::run_pending`], or by parking inside [`MainLoop::run`].

use std::fmt;
use std::marker::PhantomData;
use std::thread::{self, ThreadId};

use rivulet_core::DisposableRef;
use web_time::{Duration, Instant};

use super::dispatcher::{Dispatcher, Drain};
use super::{
    QueueScheduler, RepeatingScheduler, RepeatingWork, Scheduler, SchedulerId, Work,
};
use crate::config::QueueConfig;
use crate::error::SchedulerError;

/// Handle to the main queue. Cheap to clone and `Send`.
#[derive(Clone)]
pub struct MainScheduler {
    queue: QueueScheduler,
    thread: ThreadId,
}

/// Drains a [`MainScheduler`]'s work. Pinned to the creating thread.
pub struct MainLoop {
    dispatcher: Dispatcher,
    thread: ThreadId,
    _not_send: PhantomData<*const ()>,
}

impl MainScheduler {
    /// Bind a main queue to the calling thread.
    #[must_use]
    pub fn new() -> (Self, MainLoop) {
        match Self::with_config(QueueConfig::main()) {
            Ok(pair) => pair,
            Err(_) => unreachable!("the default main queue configuration is valid"),
        }
    }

    pub fn with_config(config: QueueConfig) -> Result<(Self, MainLoop), SchedulerError> {
        config.validate()?;
        let (queue, dispatcher) = QueueScheduler::detached(&config);
        let thread = thread::current().id();
        tracing::debug!(queue = %config.label, ?thread, "main queue bound");
        Ok((
            Self { queue, thread },
            MainLoop {
                dispatcher,
                thread,
                _not_send: PhantomData,
            },
        ))
    }

    /// Whether the caller is on the thread that drains this queue.
    #[must_use]
    pub fn is_main_thread(&self) -> bool {
        thread::current().id() == self.thread
    }
}

impl Scheduler for MainScheduler {
    fn id(&self) -> SchedulerId {
        self.queue.id()
    }

    fn label(&self) -> &str {
        self.queue.label()
    }

    fn schedule(&self, work: Work) -> Option<DisposableRef> {
        self.queue.schedule(work)
    }

    fn schedule_after(&self, when: Instant, work: Work) -> Option<DisposableRef> {
        self.queue.schedule_after(when, work)
    }
}

impl RepeatingScheduler for MainScheduler {
    fn schedule_repeating(
        &self,
        start: Instant,
        interval: Duration,
        leeway: Duration,
        work: RepeatingWork,
    ) -> DisposableRef {
        self.queue.schedule_repeating(start, interval, leeway, work)
    }
}

impl fmt::Debug for MainScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MainScheduler")
            .field("queue", &self.queue)
            .field("thread", &self.thread)
            .finish()
    }
}

impl MainLoop {
    /// Run everything that is ready now; never blocks.
    pub fn run_pending(&mut self) -> usize {
        self.dispatcher.run_ready()
    }

    /// Drain work for `duration`, sleeping while idle.
    pub fn run_for(&mut self, duration: Duration) {
        self.run_until(Instant::now() + duration);
    }

    /// Drain work until `deadline`. Returns `false` if every
    /// [`MainScheduler`] handle was dropped first.
    pub fn run_until(&mut self, deadline: Instant) -> bool {
        self.dispatcher.run_until(Some(deadline)) == Drain::DeadlineReached
    }

    /// Drain work until every [`MainScheduler`] handle is dropped and no job
    /// remains.
    pub fn run(&mut self) {
        self.dispatcher.run_until(None);
    }

    /// Delayed or repeating jobs that have been received but not yet fired.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.dispatcher.pending_timers()
    }

    #[must_use]
    pub fn thread(&self) -> ThreadId {
        self.thread
    }
}

impl fmt::Debug for MainLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MainLoop")
            .field("thread", &self.thread)
            .field("pending_timers", &self.pending_timers())
            .finish()
    }
}
