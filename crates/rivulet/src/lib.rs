#![forbid(unsafe_code)]

//! rivulet public facade crate.
//!
//! Re-exports the stable surface of the workspace crates:
//!
//! - [`core`]: atomic cells and disposables.
//! - [`runtime`]: schedulers and promises.
//! - [`stream`]: observables, events, and operators.
//!
//! Most users only need the [`prelude`].

pub use rivulet_core as core;
pub use rivulet_runtime as runtime;
pub use rivulet_stream as stream;

pub mod prelude {
    pub use rivulet_core::{
        ActionDisposable, Atomic, CompositeDisposable, Disposable, DisposableRef,
        ScopedDisposable, SerialDisposable, SimpleDisposable,
    };
    pub use rivulet_runtime::{
        ImmediateScheduler, MainLoop, MainScheduler, Promise, QueueScheduler, RepeatingScheduler,
        RepeatingSchedulerRef, Scheduler, SchedulerRef,
    };
    pub use rivulet_stream::{
        Event, Observable, Observer, ReplayBuffer, Stream, Value, dematerialize, flatten,
    };
}
