use crate::select::Variant;
use serde::{Deserialize, Serialize};

/// Lifecycle of a guard. Only ever advances `Idle -> Running -> Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardState {
    /// The block has never been started
    Idle,
    /// The one execution is in flight
    Running,
    /// The one execution finished, successfully or not
    Completed,
}

impl GuardState {
    /// Encoding used for lock-free snapshots.
    pub const fn as_u8(self) -> u8 {
        match self {
            GuardState::Idle => 0,
            GuardState::Running => 1,
            GuardState::Completed => 2,
        }
    }

    /// Unknown encodings decode as `Completed` so a corrupt snapshot can
    /// only ever cause a skip, never a second execution.
    pub const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => GuardState::Idle,
            1 => GuardState::Running,
            _ => GuardState::Completed,
        }
    }
}

impl std::fmt::Display for GuardState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuardState::Idle => write!(f, "idle"),
            GuardState::Running => write!(f, "running"),
            GuardState::Completed => write!(f, "completed"),
        }
    }
}

/// Outcome of a guard's prelude.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// This caller moved the guard out of `Idle` and must run the block
    Granted,
    /// Another execution is in flight or already finished
    Skipped(GuardState),
}

/// The state machine both guard variants drive. It holds no
/// synchronization of its own: the owning guard decides how access is
/// serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    state: GuardState,
}

impl Transition {
    pub const fn new() -> Self {
        Self {
            state: GuardState::Idle,
        }
    }

    pub fn state(&self) -> GuardState {
        self.state
    }

    /// Claim the single execution. Succeeds exactly once per machine.
    pub fn begin(&mut self) -> Admission {
        match self.state {
            GuardState::Idle => {
                self.state = GuardState::Running;
                Admission::Granted
            }
            spent => Admission::Skipped(spent),
        }
    }

    /// Mark the execution finished. Idempotent.
    pub fn complete(&mut self) {
        self.state = GuardState::Completed;
    }
}

impl Default for Transition {
    fn default() -> Self {
        Self::new()
    }
}

/// Inspection surface shared by every guard variant.
///
/// Execution itself is inherent on each type (`run` takes a closure on
/// [`BlockingGuard`](crate::BlockingGuard) and a future on
/// [`CooperativeGuard`](crate::CooperativeGuard)), so the call site picks
/// the variant statically.
pub trait Guard {
    fn state(&self) -> GuardState;

    fn variant(&self) -> Variant;

    /// True once the guard has left `Idle`; it will never run its block again.
    fn is_spent(&self) -> bool {
        self.state() != GuardState::Idle
    }
}
