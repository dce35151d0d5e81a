#![forbid(unsafe_code)]

//! Lock-guarded mutable cells.
//!
//! [`Atomic<T>`] is the foundation for every piece of shared mutable state in
//! rivulet: disposable trees, operator state machines, and observer
//! bookkeeping all live inside one.
//!
//! # Invariants
//!
//! 1. The wrapped value is only ever read or written while the lock is held.
//! 2. Read-modify-write happens exclusively through [`Atomic::modify`],
//!    [`Atomic::modify_with`], or [`Atomic::with_value_mut`], so every update
//!    is linearizable.
//!
//! # Locking
//!
//! The cell is backed by [`parking_lot::Mutex`], which spins for a short
//! while before parking the thread. Short, non-blocking critical sections get
//! spin-lock behavior; a section that does block will park instead of burning
//! CPU.
//!
//! # Preconditions
//!
//! No operation may be called on a cell from inside a closure that is
//! currently running under that same cell's lock. Doing so deadlocks. This is
//! a programming error, not a recoverable condition.

use std::fmt;

use parking_lot::Mutex;

/// A mutually-exclusive container for a single value.
pub struct Atomic<T> {
    value: Mutex<T>,
}

impl<T> Atomic<T> {
    /// Wrap `value` in a new cell.
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self {
            value: Mutex::new(value),
        }
    }

    /// Replace the value.
    pub fn set(&self, value: T) {
        *self.value.lock() = value;
    }

    /// Replace the value, returning the previous one.
    pub fn swap(&self, value: T) -> T {
        std::mem::replace(&mut *self.value.lock(), value)
    }

    /// Replace the value with `f(&old)`, returning the old value.
    pub fn modify(&self, f: impl FnOnce(&T) -> T) -> T {
        let mut guard = self.value.lock();
        let next = f(&guard);
        std::mem::replace(&mut *guard, next)
    }

    /// Like [`modify`](Self::modify), but `f` also returns side-channel data.
    ///
    /// Returns `(old, side)`.
    pub fn modify_with<U>(&self, f: impl FnOnce(&T) -> (T, U)) -> (T, U) {
        let mut guard = self.value.lock();
        let (next, side) = f(&guard);
        (std::mem::replace(&mut *guard, next), side)
    }

    /// Run a read-only critical section.
    pub fn with_value<U>(&self, f: impl FnOnce(&T) -> U) -> U {
        f(&self.value.lock())
    }

    /// Run a critical section with mutable access to the value.
    pub fn with_value_mut<U>(&self, f: impl FnOnce(&mut T) -> U) -> U {
        f(&mut self.value.lock())
    }

    /// Consume the cell and return the value.
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T: Clone> Atomic<T> {
    /// Clone the current value out of the cell.
    #[must_use]
    pub fn get(&self) -> T {
        self.value.lock().clone()
    }
}

impl<T: Default> Default for Atomic<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> From<T> for Atomic<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for Atomic<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value.try_lock() {
            Some(guard) => f.debug_tuple("Atomic").field(&*guard).finish(),
            None => f.write_str("Atomic(<locked>)"),
        }
    }
}
