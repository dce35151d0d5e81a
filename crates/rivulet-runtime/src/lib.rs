#![forbid(unsafe_code)]

//! Runtime: schedulers that decide when and where work runs, plus the
//! promise type built on top of them.
//!
//! # Schedulers
//!
//! - [`ImmediateScheduler`]: runs work synchronously on the calling thread.
//! - [`QueueScheduler`]: a dedicated worker thread that runs work one item at
//!   a time, in submission order, with delayed and repeating timers.
//! - [`MainScheduler`]: the same serial queue, drained by whichever thread
//!   owns the companion [`MainLoop`] (typically the UI thread).
//!
//! All scheduling calls return a [`DisposableRef`](rivulet_core::DisposableRef)
//! (or `None` when the work already ran) that cancels work which has not
//! started yet.

pub mod config;
pub mod error;
pub mod promise;
pub mod scheduler;

pub use config::QueueConfig;
pub use error::{PromiseError, SchedulerError};
pub use promise::Promise;
pub use scheduler::{
    ImmediateScheduler, MainLoop, MainScheduler, QueueScheduler, RepeatingScheduler,
    RepeatingSchedulerRef, RepeatingWork, Scheduler, SchedulerId, SchedulerRef, Work, current,
    schedule_on_current,
};
