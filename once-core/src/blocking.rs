//! At-most-once guard for callers on preemptible threads.
//!
//! The lock is held only for the state check and the two transitions; the
//! guarded block always runs outside it. That is what lets a re-entrant
//! call from inside the block observe `Running` instead of deadlocking.

use crate::select::Variant;
use crate::state::{Admission, Guard, GuardState, Transition};
use parking_lot::Mutex;
use std::borrow::Cow;
use std::convert::Infallible;

pub struct BlockingGuard {
    machine: Mutex<Transition>,
    label: Cow<'static, str>,
}

impl BlockingGuard {
    /// Create an unlabeled guard. Usable in `static` items.
    pub const fn new() -> Self {
        Self::labeled("anonymous")
    }

    pub const fn labeled(label: &'static str) -> Self {
        Self {
            machine: parking_lot::const_mutex(Transition::new()),
            label: Cow::Borrowed(label),
        }
    }

    pub fn with_label(label: impl Into<Cow<'static, str>>) -> Self {
        Self {
            machine: parking_lot::const_mutex(Transition::new()),
            label: label.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Run `block` if this is the first call ever made on the guard.
    ///
    /// Returns `Some` on the one call that executed `block`, `None` on
    /// every other call (concurrent, re-entrant or later).
    pub fn run<T, F>(&self, block: F) -> Option<T>
    where
        F: FnOnce() -> T,
    {
        match self.try_run(|| Ok::<T, Infallible>(block())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Fallible form of [`run`](Self::run).
    ///
    /// An error from `block` is returned to this caller unchanged, but only
    /// after the guard is durably `Completed`: the guard is spent even when
    /// its one execution fails. Skipped calls never return an error.
    pub fn try_run<T, E, F>(&self, block: F) -> Result<Option<T>, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        // 1. Claim the execution under the lock
        let admission = self.machine.lock().begin();
        if let Admission::Skipped(state) = admission {
            tracing::trace!(guard = %self.label, %state, "guarded block skipped");
            return Ok(None);
        }

        // 2. Run the block with the lock released. Completion is armed
        //    before the call so unwinding also spends the guard.
        tracing::debug!(guard = %self.label, "guarded block started");
        let completion = Completion { guard: self };
        let outcome = block();
        drop(completion);

        outcome.map(Some)
    }
}

impl Default for BlockingGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Guard for BlockingGuard {
    fn state(&self) -> GuardState {
        self.machine.lock().state()
    }

    fn variant(&self) -> Variant {
        Variant::Blocking
    }
}

impl std::fmt::Debug for BlockingGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingGuard")
            .field("label", &self.label)
            .field("state", &self.state())
            .finish()
    }
}

/// Moves the guard to `Completed` when dropped.
struct Completion<'a> {
    guard: &'a BlockingGuard,
}

impl Drop for Completion<'_> {
    fn drop(&mut self) {
        self.guard.machine.lock().complete();
        if std::thread::panicking() {
            tracing::warn!(guard = %self.guard.label, "guarded block panicked, guard is spent");
        } else {
            tracing::debug!(guard = %self.guard.label, "guarded block completed");
        }
    }
}
