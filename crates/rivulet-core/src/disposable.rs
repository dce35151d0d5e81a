#![forbid(unsafe_code)]

//! Disposables: idempotent, thread-safe cancellation handles.
//!
//! Every piece of in-flight work in rivulet (an observation, a scheduled job,
//! a repeating timer) is torn down through a [`Disposable`]. The variants
//! here compose into trees so that disposing a parent disposes every
//! descendant exactly once.
//!
//! | Variant | Side effect of the first `dispose()` |
//! |---|---|
//! | [`SimpleDisposable`] | flips a flag |
//! | [`ActionDisposable`] | takes and runs its closure |
//! | [`CompositeDisposable`] | disposes and drops every child |
//! | [`SerialDisposable`] | disposes the current child |
//! | [`ScopedDisposable`] | disposes the wrapped disposable (also on drop) |
//!
//! # Invariants
//!
//! 1. `dispose()` may be called any number of times from any number of
//!    threads; only the first call has side effects.
//! 2. `is_disposed()` turns `true` only once the first `dispose()` has
//!    finished its side effects, and no further side effects occur after.
//!    While that first call is still running, the handle already refuses
//!    new children.
//! 3. A child handed to a composite or serial disposable concurrently with
//!    its disposal is either stored (and later disposed by the parent) or
//!    disposed immediately by the caller. It is never silently dropped.
//! 4. Child side effects always run outside the parent's lock, so a child may
//!    call back into its parent while being disposed.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use smallvec::SmallVec;

use crate::atomic::Atomic;
#[cfg(feature = "tracing")]
use crate::logging::trace;
#[cfg(not(feature = "tracing"))]
use crate::trace;

// ─── Metrics counters ────────────────────────────────────────────────────────

/// Total number of first-time disposals observed.
static DISPOSALS_TOTAL: AtomicU64 = AtomicU64::new(0);

/// Read the total disposal count (for diagnostics/telemetry).
#[must_use]
pub fn disposals_total() -> u64 {
    DISPOSALS_TOTAL.load(Ordering::Relaxed)
}

fn record_disposal(kind: &'static str) {
    DISPOSALS_TOTAL.fetch_add(1, Ordering::Relaxed);
    trace!(kind, "disposed");
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// A cancellation handle with idempotent, thread-safe teardown.
pub trait Disposable: Send + Sync {
    /// Whether [`dispose`](Self::dispose) has taken effect.
    fn is_disposed(&self) -> bool;

    /// Tear down the associated work. Idempotent.
    fn dispose(&self);
}

/// Shared, type-erased disposable handle.
pub type DisposableRef = Arc<dyn Disposable>;

/// Reference identity for disposable handles (data pointer only).
fn same_disposable(a: &DisposableRef, b: &DisposableRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

// ─── Simple ──────────────────────────────────────────────────────────────────

/// A disposable whose only effect is flipping a flag.
///
/// Useful as a cancellation token that work polls before running.
#[derive(Debug, Default)]
pub struct SimpleDisposable {
    disposed: AtomicBool,
}

impl SimpleDisposable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Disposable for SimpleDisposable {
    #[inline]
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::AcqRel) {
            record_disposal("simple");
        }
    }
}

// ─── Action ──────────────────────────────────────────────────────────────────

type Action = Box<dyn FnOnce() + Send>;

enum ActionPhase {
    Pending(Action),
    Running,
    Done,
}

/// A disposable that runs a closure exactly once when disposed.
pub struct ActionDisposable {
    phase: Atomic<ActionPhase>,
}

impl ActionDisposable {
    pub fn new(action: impl FnOnce() + Send + 'static) -> Self {
        Self {
            phase: Atomic::new(ActionPhase::Pending(Box::new(action))),
        }
    }
}

impl Disposable for ActionDisposable {
    fn is_disposed(&self) -> bool {
        self.phase.with_value(|phase| matches!(phase, ActionPhase::Done))
    }

    fn dispose(&self) {
        // Take under the lock, run outside it.
        let taken = self.phase.with_value_mut(|phase| {
            match std::mem::replace(phase, ActionPhase::Running) {
                ActionPhase::Pending(action) => Some(action),
                other => {
                    *phase = other;
                    None
                }
            }
        });
        if let Some(action) = taken {
            record_disposal("action");
            action();
            self.phase.set(ActionPhase::Done);
        }
    }
}

impl fmt::Debug for ActionDisposable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDisposable")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ─── Composite ───────────────────────────────────────────────────────────────

/// Token identifying a child of a [`CompositeDisposable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CompositeKey(u64);

type Children = SmallVec<[(CompositeKey, DisposableRef); 4]>;

/// Lifecycle shared by the container disposables.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Teardown {
    #[default]
    Live,
    /// Children taken, their `dispose()` still running.
    Draining,
    Done,
}

struct CompositeState {
    children: Children,
    next_key: u64,
    teardown: Teardown,
}

/// An ordered collection of child disposables, disposed together.
pub struct CompositeDisposable {
    state: Atomic<CompositeState>,
}

impl CompositeDisposable {
    #[must_use]
    pub fn new() -> Self {
        Self::from_children(Vec::new())
    }

    /// Create a composite that already owns `children`.
    #[must_use]
    pub fn from_children(children: Vec<DisposableRef>) -> Self {
        let mut stored = Children::new();
        let mut next_key = 0;
        for child in children {
            stored.push((CompositeKey(next_key), child));
            next_key += 1;
        }
        Self {
            state: Atomic::new(CompositeState {
                children: stored,
                next_key,
                teardown: Teardown::Live,
            }),
        }
    }

    /// Add a child.
    ///
    /// If the composite is already disposed (or being disposed), `child` is
    /// disposed immediately instead of being stored; the returned key then
    /// refers to nothing.
    pub fn add(&self, child: DisposableRef) -> CompositeKey {
        let (key, rejected) = self.state.with_value_mut(|state| {
            let key = CompositeKey(state.next_key);
            state.next_key += 1;
            if state.teardown == Teardown::Live {
                state.children.push((key, child));
                (key, None)
            } else {
                (key, Some(child))
            }
        });
        if let Some(child) = rejected {
            child.dispose();
        }
        key
    }

    /// Detach the child registered under `key` without disposing it.
    pub fn remove(&self, key: CompositeKey) -> Option<DisposableRef> {
        self.state.with_value_mut(|state| {
            let index = state.children.iter().position(|(k, _)| *k == key)?;
            Some(state.children.remove(index).1)
        })
    }

    /// Number of children currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.with_value(|state| state.children.len())
    }

    /// Whether no children are currently stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CompositeDisposable {
    fn default() -> Self {
        Self::new()
    }
}

impl Disposable for CompositeDisposable {
    fn is_disposed(&self) -> bool {
        self.state.with_value(|state| state.teardown == Teardown::Done)
    }

    fn dispose(&self) {
        let taken = self.state.with_value_mut(|state| {
            (state.teardown == Teardown::Live).then(|| {
                state.teardown = Teardown::Draining;
                std::mem::take(&mut state.children)
            })
        });
        if let Some(children) = taken {
            record_disposal("composite");
            for (_, child) in children {
                child.dispose();
            }
            self.state
                .with_value_mut(|state| state.teardown = Teardown::Done);
        }
    }
}

impl fmt::Debug for CompositeDisposable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeDisposable")
            .field("disposed", &self.is_disposed())
            .field("children", &self.len())
            .finish()
    }
}

// ─── Serial ──────────────────────────────────────────────────────────────────

#[derive(Default)]
struct SerialState {
    current: Option<DisposableRef>,
    assigned: bool,
    teardown: Teardown,
}

/// Holds at most one "current" child; assigning a new one disposes the old.
#[derive(Default)]
pub struct SerialDisposable {
    state: Atomic<SerialState>,
}

impl SerialDisposable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current child, if any.
    #[must_use]
    pub fn inner(&self) -> Option<DisposableRef> {
        self.state.with_value(|state| state.current.clone())
    }

    /// Replace the current child.
    ///
    /// The previous child is disposed unless it is the same handle as `next`.
    /// If this disposable is already disposed, `next` is disposed immediately.
    pub fn set(&self, next: Option<DisposableRef>) {
        let (previous, rejected) = self.state.with_value_mut(|state| {
            if state.teardown != Teardown::Live {
                (None, next.clone())
            } else {
                state.assigned = true;
                let previous = std::mem::replace(&mut state.current, next.clone());
                (previous, None)
            }
        });

        if let Some(rejected) = rejected {
            rejected.dispose();
        }
        if let Some(previous) = previous {
            let unchanged = next.as_ref().is_some_and(|n| same_disposable(n, &previous));
            if !unchanged {
                previous.dispose();
            }
        }
    }

    /// Store `next` only if no child was ever assigned.
    ///
    /// Returns `true` if stored. Otherwise `next` is disposed, because a later
    /// assignment has already superseded it.
    pub fn set_if_vacant(&self, next: DisposableRef) -> bool {
        let stored = self.state.with_value_mut(|state| {
            if state.teardown != Teardown::Live || state.assigned {
                false
            } else {
                state.assigned = true;
                state.current = Some(next.clone());
                true
            }
        });
        if !stored {
            next.dispose();
        }
        stored
    }
}

impl Disposable for SerialDisposable {
    fn is_disposed(&self) -> bool {
        self.state.with_value(|state| state.teardown == Teardown::Done)
    }

    fn dispose(&self) {
        let taken = self.state.with_value_mut(|state| {
            (state.teardown == Teardown::Live).then(|| {
                state.teardown = Teardown::Draining;
                state.current.take()
            })
        });
        let Some(current) = taken else {
            return;
        };
        record_disposal("serial");
        if let Some(current) = current {
            current.dispose();
        }
        self.state
            .with_value_mut(|state| state.teardown = Teardown::Done);
    }
}

impl fmt::Debug for SerialDisposable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialDisposable")
            .field("disposed", &self.is_disposed())
            .field("has_inner", &self.inner().is_some())
            .finish()
    }
}

// ─── Scoped ──────────────────────────────────────────────────────────────────

/// RAII guard that disposes the wrapped disposable when it goes out of scope.
#[must_use = "dropping a ScopedDisposable disposes it immediately"]
pub struct ScopedDisposable {
    inner: Option<DisposableRef>,
}

impl ScopedDisposable {
    pub fn new(inner: DisposableRef) -> Self {
        Self { inner: Some(inner) }
    }

    /// Release the wrapped disposable without disposing it.
    #[must_use]
    pub fn into_inner(mut self) -> DisposableRef {
        match self.inner.take() {
            Some(inner) => inner,
            None => unreachable!("inner is only taken by into_inner or drop"),
        }
    }
}

impl Disposable for ScopedDisposable {
    fn is_disposed(&self) -> bool {
        self.inner.as_ref().is_none_or(|inner| inner.is_disposed())
    }

    fn dispose(&self) {
        if let Some(inner) = &self.inner {
            inner.dispose();
        }
    }
}

impl Drop for ScopedDisposable {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            inner.dispose();
        }
    }
}

impl fmt::Debug for ScopedDisposable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedDisposable")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
