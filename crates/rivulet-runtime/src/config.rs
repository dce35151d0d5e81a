//! Queue configuration.
//!
//! [`QueueConfig`] has sensible defaults and builder-style setters. The
//! defaults can be overridden from the environment with
//! [`QueueConfig::apply_env`]:
//!
//! | Variable | Meaning |
//! |---|---|
//! | `RIVULET_QUEUE_STACK_SIZE` | worker thread stack size in bytes |
//! | `RIVULET_TIMER_LEEWAY_MS` | how late one-shot delayed work may fire |

use web_time::Duration;

use crate::error::SchedulerError;

/// Thread name used by queues created without an explicit label.
pub const DEFAULT_QUEUE_LABEL: &str = "rivulet-queue";

/// Label of the main/UI-affine queue.
pub const MAIN_QUEUE_LABEL: &str = "rivulet-main";

pub const STACK_SIZE_ENV: &str = "RIVULET_QUEUE_STACK_SIZE";
pub const TIMER_LEEWAY_ENV: &str = "RIVULET_TIMER_LEEWAY_MS";

/// Smallest worker stack we accept.
pub const MIN_STACK_SIZE: usize = 64 * 1024;

/// Configuration for a serial work queue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueConfig {
    /// Queue label; also the worker thread's name.
    pub label: String,
    /// Worker stack size. `None` uses the platform default.
    pub stack_size: Option<usize>,
    /// How late one-shot delayed work may fire so it can share a wakeup
    /// with neighbouring timers. It never fires before its due time.
    pub timer_leeway: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            label: DEFAULT_QUEUE_LABEL.to_string(),
            stack_size: None,
            timer_leeway: Duration::ZERO,
        }
    }
}

impl QueueConfig {
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self::default().with_label(label)
    }

    /// Defaults for the main queue.
    #[must_use]
    pub fn main() -> Self {
        Self::new(MAIN_QUEUE_LABEL)
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    #[must_use]
    pub fn with_timer_leeway(mut self, leeway: Duration) -> Self {
        self.timer_leeway = leeway;
        self
    }

    /// Apply overrides from the process environment on top of `self`.
    pub fn apply_env(self) -> Result<Self, SchedulerError> {
        self.apply_lookup(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup` on top of `self`.
    pub fn apply_lookup(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, SchedulerError> {
        if let Some(raw) = lookup(STACK_SIZE_ENV) {
            let bytes = raw.trim().parse::<usize>().map_err(|_| {
                SchedulerError::invalid(format!("{STACK_SIZE_ENV}={raw:?} is not a byte count"))
            })?;
            self.stack_size = Some(bytes);
        }
        if let Some(raw) = lookup(TIMER_LEEWAY_ENV) {
            let ms = raw.trim().parse::<u64>().map_err(|_| {
                SchedulerError::invalid(format!("{TIMER_LEEWAY_ENV}={raw:?} is not milliseconds"))
            })?;
            self.timer_leeway = Duration::from_millis(ms);
        }
        self.validate()?;
        Ok(self)
    }

    /// Check that the configuration can be used to spawn a worker.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.label.is_empty() {
            return Err(SchedulerError::invalid("queue label is empty"));
        }
        if self.label.contains('\0') {
            return Err(SchedulerError::invalid("queue label contains a NUL byte"));
        }
        if let Some(size) = self.stack_size
            && size < MIN_STACK_SIZE
        {
            return Err(SchedulerError::invalid(format!(
                "stack size {size} is below the minimum of {MIN_STACK_SIZE} bytes"
            )));
        }
        Ok(())
    }
}
