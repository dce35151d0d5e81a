#![forbid(unsafe_code)]

//! Operators on [`Observable`](crate::Observable).
//!
//! Each module adds inherent methods (or a free function) for one family of
//! operators:
//!
//! - [`flatten_scan`]: the primitive every derived [`Stream`](crate::Stream)
//!   operator is written with.
//! - [`concat`], [`catch`], [`materialize`]: the remaining required
//!   capabilities, plus `dematerialize`.
//! - [`zip`], [`combine_latest`], [`sample`], [`take_until`]: two-input
//!   operators that observe both sides directly.
//! - [`delay`], [`interval`]: scheduler-driven timing.
//! - [`flatten`]: merge a stream of streams.
//!
//! # Invariants
//!
//! 1. Every operator produces a fresh observable; inputs are never mutated.
//! 2. Any error that an operator does not explicitly intercept is forwarded
//!    immediately and disposes every other input the operator observes.
//! 3. Disposing the output disposes every upstream subscription the
//!    observation created.

pub mod catch;
pub mod combine_latest;
pub mod concat;
pub mod delay;
pub mod flatten;
pub mod flatten_scan;
pub mod interval;
pub mod materialize;
pub mod sample;
pub mod take_until;
pub mod zip;

pub use flatten::flatten;
pub use materialize::dematerialize;
