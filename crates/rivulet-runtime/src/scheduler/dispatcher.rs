#![forbid(unsafe_code)]

//! The serial engine shared by [`QueueScheduler`](super::QueueScheduler) and
//! [`MainScheduler`](super::MainScheduler).
//!
//! Jobs arrive over an mpsc channel. Immediate jobs run in arrival order;
//! delayed and repeating jobs wait in a timer heap ordered by
//! `(due time, submission order)`. Whoever owns the [`Dispatcher`]
//! (a dedicated worker thread or a [`MainLoop`](super::MainLoop)) is the only
//! thread that ever runs jobs, which makes execution strictly serial.
//!
//! # Leeway
//!
//! A timed job never fires before its due time. Its leeway is how late it
//! may fire: the dispatcher sleeps until the earliest `due + leeway` among
//! parked timers, then runs every timer that is due by then, so timers with
//! nearby due times share one wakeup.
//!
//! # Failure Modes
//!
//! - **Work panics**: the panic is caught, logged at `error` level, and the
//!   dispatcher keeps going. A panicking repeating job is cancelled.
//! - **All handles dropped**: the channel disconnects; once no timers remain
//!   the dispatcher reports [`Drain::Disconnected`].

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};

use rivulet_core::{Disposable, SimpleDisposable};
use web_time::{Duration, Instant};

use super::current::CurrentGuard;
use super::{RepeatingWork, SchedulerRef, Work};
use crate::error::panic_message;

pub(crate) enum Task {
    Once(Work),
    Repeating {
        work: RepeatingWork,
        interval: Duration,
    },
}

pub(crate) struct Job {
    pub(crate) token: Arc<SimpleDisposable>,
    pub(crate) due: Option<Instant>,
    pub(crate) leeway: Duration,
    pub(crate) task: Task,
    /// Installed as the current scheduler while the job runs.
    pub(crate) owner: SchedulerRef,
}

impl Job {
    /// Latest instant the job should fire.
    fn deadline(&self) -> Option<Instant> {
        self.due
            .map(|due| due.checked_add(self.leeway).unwrap_or(due))
    }
}

struct Timed {
    due: Instant,
    deadline: Instant,
    seq: u64,
    job: Job,
}

impl PartialEq for Timed {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Timed {}

impl PartialOrd for Timed {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timed {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due
            .cmp(&other.due)
            .then(self.seq.cmp(&other.seq))
    }
}

/// Why a blocking drain returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Drain {
    /// The requested deadline passed.
    DeadlineReached,
    /// Every sender is gone and no timers remain.
    Disconnected,
}

pub(crate) struct Dispatcher {
    label: String,
    rx: mpsc::Receiver<Job>,
    timers: BinaryHeap<Reverse<Timed>>,
    seq: u64,
}

impl Dispatcher {
    pub(crate) fn new(label: String, rx: mpsc::Receiver<Job>) -> Self {
        Self {
            label,
            rx,
            timers: BinaryHeap::new(),
            seq: 0,
        }
    }

    /// Number of delayed or repeating jobs waiting in the timer heap.
    pub(crate) fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Run every job that is ready right now without blocking.
    ///
    /// Returns the number of jobs executed (cancelled jobs are not counted).
    pub(crate) fn run_ready(&mut self) -> usize {
        let mut ran = 0;
        loop {
            match self.rx.try_recv() {
                Ok(job) => {
                    if self.accept(job) {
                        ran += 1;
                    }
                    continue;
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => {}
            }
            match self.pop_due(Instant::now()) {
                Some(job) => {
                    if self.execute(job) {
                        ran += 1;
                    }
                }
                None => return ran,
            }
        }
    }

    /// Run jobs as they become ready until `deadline` passes (or forever when
    /// `None`), returning early once the queue is disconnected and idle.
    pub(crate) fn run_until(&mut self, deadline: Option<Instant>) -> Drain {
        loop {
            self.run_ready();
            let now = Instant::now();
            if deadline.is_some_and(|d| now >= d) {
                return Drain::DeadlineReached;
            }

            let next_timer = self.timers.iter().map(|Reverse(t)| t.deadline).min();
            let wake = match (next_timer, deadline) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
            let received = match wake {
                Some(at) => self.rx.recv_timeout(at.saturating_duration_since(now)),
                None => self.rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok(job) => {
                    self.accept(job);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    let (false, Some(at)) = (self.timers.is_empty(), wake) else {
                        return Drain::Disconnected;
                    };
                    // Nothing else can arrive; sleep until the next timer.
                    std::thread::sleep(at.saturating_duration_since(Instant::now()));
                }
            }
        }
    }

    /// Run immediate jobs now, park delayed ones. Returns whether a job ran.
    fn accept(&mut self, job: Job) -> bool {
        match job.due {
            Some(due) if due > Instant::now() => {
                self.push_timer(due, job);
                false
            }
            _ => self.execute(job),
        }
    }

    fn push_timer(&mut self, due: Instant, job: Job) {
        self.seq += 1;
        let deadline = job.deadline().unwrap_or(due);
        self.timers.push(Reverse(Timed {
            due,
            deadline,
            seq: self.seq,
            job,
        }));
    }

    fn pop_due(&mut self, now: Instant) -> Option<Job> {
        match self.timers.peek() {
            Some(Reverse(top)) if top.due <= now => self.timers.pop().map(|Reverse(t)| t.job),
            _ => None,
        }
    }

    fn execute(&mut self, job: Job) -> bool {
        if job.token.is_disposed() {
            tracing::trace!(queue = %self.label, "skipping cancelled job");
            return false;
        }

        let Job {
            token,
            due,
            leeway,
            task,
            owner,
        } = job;

        match task {
            Task::Once(work) => {
                let outcome = {
                    let _current = CurrentGuard::enter(Arc::clone(&owner));
                    catch_unwind(AssertUnwindSafe(work))
                };
                if let Err(payload) = outcome {
                    tracing::error!(
                        queue = %self.label,
                        panic = %panic_message(&*payload),
                        "scheduled work panicked"
                    );
                }
            }
            Task::Repeating { mut work, interval } => {
                let outcome = {
                    let _current = CurrentGuard::enter(Arc::clone(&owner));
                    catch_unwind(AssertUnwindSafe(|| work()))
                };
                if let Err(payload) = outcome {
                    tracing::error!(
                        queue = %self.label,
                        panic = %panic_message(&*payload),
                        "repeating work panicked; timer cancelled"
                    );
                    token.dispose();
                    return true;
                }
                if token.is_disposed() {
                    return true;
                }

                // Skip ticks we fell behind on instead of replaying a burst.
                let now = Instant::now();
                let mut next = due.unwrap_or(now) + interval;
                while next + leeway < now {
                    next += interval;
                }
                let job = Job {
                    token,
                    due: Some(next),
                    leeway,
                    task: Task::Repeating { work, interval },
                    owner,
                };
                self.push_timer(next, job);
            }
        }
        true
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        tracing::debug!(queue = %self.label, pending = self.timers.len(), "dispatcher stopped");
    }
}
