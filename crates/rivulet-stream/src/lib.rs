#![forbid(unsafe_code)]

//! Push-based event streams.
//!
//! An [`Observable`] pushes [`Event`]s into an [`Observer`]; operators build
//! new observables from existing ones without the consumer ever polling.
//! The [`Stream`] trait names the handful of capabilities a stream type
//! provides and derives the rest of the algebra from
//! [`flatten_scan`](Stream::flatten_scan).
//!
//! Observables are safe to produce into, observe, and dispose from any
//! thread; timing operators take a scheduler from `rivulet-runtime`.

pub mod event;
pub mod observable;
pub mod observer;
pub mod operators;
pub mod replay;
pub mod stream;

pub use event::{Event, Value};
pub use observable::Observable;
pub use observer::Observer;
pub use operators::{dematerialize, flatten};
pub use replay::{ReplayBuffer, ReplayIter};
pub use stream::Stream;
