#![forbid(unsafe_code)]

//! Core: lock-guarded atomic cells and the disposable cancellation tree.

pub mod atomic;
pub mod disposable;
pub mod logging;

pub use atomic::Atomic;
pub use disposable::{
    ActionDisposable, CompositeDisposable, CompositeKey, Disposable, DisposableRef,
    ScopedDisposable, SerialDisposable, SimpleDisposable,
};
