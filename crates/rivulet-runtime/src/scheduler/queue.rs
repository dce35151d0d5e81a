#![forbid(unsafe_code)]

//! Serial work queue backed by a dedicated worker thread.
//!
//! Every job submitted to one [`QueueScheduler`] (and its clones) runs on the
//! same thread, one at a time, in submission order. Delayed and repeating
//! jobs share that thread through the dispatcher's timer heap, so they never
//! overlap with immediate work either.
//!
//! # Lifecycle
//!
//! The worker exits once every handle is dropped and no job is pending.
//! Pending jobs hold a handle to their queue, so a live repeating timer keeps
//! the worker alive until it is disposed.
//!
//! # Example
//!
//! ```
//! use rivulet_runtime::{QueueScheduler, Scheduler};
//! use std::sync::mpsc;
//!
//! let queue = QueueScheduler::new("example").unwrap();
//! let (tx, rx) = mpsc::channel();
//! queue.schedule(Box::new(move || tx.send(42).unwrap()));
//! assert_eq!(rx.recv().unwrap(), 42);
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use rivulet_core::{Disposable, DisposableRef, SimpleDisposable};
use web_time::{Duration, Instant};

use super::dispatcher::{Dispatcher, Job, Task};
use super::{
    MIN_REPEAT_INTERVAL, RepeatingScheduler, RepeatingWork, Scheduler, SchedulerId, Work,
};
use crate::config::QueueConfig;
use crate::error::SchedulerError;

struct QueueShared {
    id: SchedulerId,
    label: String,
    timer_leeway: Duration,
    sender: mpsc::Sender<Job>,
}

/// Handle to a serial work queue. Cloning shares the same queue.
#[derive(Clone)]
pub struct QueueScheduler {
    shared: Arc<QueueShared>,
}

impl QueueScheduler {
    /// Spawn a queue with default configuration and the given label.
    pub fn new(label: impl Into<String>) -> Result<Self, SchedulerError> {
        Self::with_config(QueueConfig::new(label))
    }

    /// Spawn a queue's worker thread.
    pub fn with_config(config: QueueConfig) -> Result<Self, SchedulerError> {
        config.validate()?;
        let (queue, dispatcher) = Self::detached(&config);

        let mut builder = thread::Builder::new().name(config.label.clone());
        if let Some(bytes) = config.stack_size {
            builder = builder.stack_size(bytes);
        }
        builder
            .spawn(move || {
                let mut dispatcher = dispatcher;
                dispatcher.run_until(None);
            })
            .map_err(|source| SchedulerError::Spawn {
                label: config.label.clone(),
                source,
            })?;

        tracing::debug!(queue = %config.label, id = ?queue.id(), "queue started");
        Ok(queue)
    }

    /// Create the handle and its dispatcher without spawning a thread.
    ///
    /// The caller becomes responsible for draining the dispatcher.
    pub(crate) fn detached(config: &QueueConfig) -> (Self, Dispatcher) {
        let (sender, rx) = mpsc::channel();
        let queue = Self {
            shared: Arc::new(QueueShared {
                id: SchedulerId::next(),
                label: config.label.clone(),
                timer_leeway: config.timer_leeway,
                sender,
            }),
        };
        (queue, Dispatcher::new(config.label.clone(), rx))
    }

    fn submit(&self, due: Option<Instant>, leeway: Duration, task: Task) -> DisposableRef {
        let token = Arc::new(SimpleDisposable::new());
        let job = Job {
            token: Arc::clone(&token),
            due,
            leeway,
            task,
            owner: Arc::new(self.clone()),
        };
        if self.shared.sender.send(job).is_err() {
            tracing::warn!(queue = %self.shared.label, "queue is no longer draining; work dropped");
            token.dispose();
        }
        token
    }
}

impl Scheduler for QueueScheduler {
    fn id(&self) -> SchedulerId {
        self.shared.id
    }

    fn label(&self) -> &str {
        &self.shared.label
    }

    fn schedule(&self, work: Work) -> Option<DisposableRef> {
        Some(self.submit(None, Duration::ZERO, Task::Once(work)))
    }

    fn schedule_after(&self, when: Instant, work: Work) -> Option<DisposableRef> {
        Some(self.submit(Some(when), self.shared.timer_leeway, Task::Once(work)))
    }
}

impl RepeatingScheduler for QueueScheduler {
    fn schedule_repeating(
        &self,
        start: Instant,
        interval: Duration,
        leeway: Duration,
        work: RepeatingWork,
    ) -> DisposableRef {
        let interval = interval.max(MIN_REPEAT_INTERVAL);
        self.submit(Some(start), leeway, Task::Repeating { work, interval })
    }
}

impl fmt::Debug for QueueScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueScheduler")
            .field("id", &self.shared.id)
            .field("label", &self.shared.label)
            .finish()
    }
}
