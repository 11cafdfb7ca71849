//! Per-task pipeline state definitions
//!
//! Each admitted task walks a small state machine driven by attempt outcomes
//! and retry decisions.

use crate::ScanError;
use std::fmt;

/// Represents the current state of one task's probe pipeline
///
/// The number carried by `Attempting` and `WaitingBackoff` is the zero-based
/// index of the attempt in progress or just finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Admitted but no attempt has started yet
    Pending,

    /// Attempt `n` is in flight
    Attempting(u32),

    /// Attempt `n` finished with a retryable outcome; sleeping before `n + 1`
    WaitingBackoff(u32),

    /// A result has been produced
    Done,
}

impl TaskState {
    /// Returns true once the task has produced its result
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns true while the task holds an in-flight attempt
    pub fn is_attempting(&self) -> bool {
        matches!(self, Self::Attempting(_))
    }

    /// Checks whether moving to `next` is a legal transition
    ///
    /// | From | To |
    /// |------|----|
    /// | Pending | Attempting(0), Done |
    /// | Attempting(n) | WaitingBackoff(n), Done |
    /// | WaitingBackoff(n) | Attempting(n + 1), Done |
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        match (*self, next) {
            (Self::Pending, Self::Attempting(0)) => true,
            (Self::Pending, Self::Done) => true,
            (Self::Attempting(n), Self::WaitingBackoff(m)) => n == m,
            (Self::Attempting(_), Self::Done) => true,
            (Self::WaitingBackoff(n), Self::Attempting(m)) => m == n + 1,
            (Self::WaitingBackoff(_), Self::Done) => true,
            _ => false,
        }
    }

    /// Moves to `next`, rejecting illegal transitions
    pub fn transition_to(&mut self, next: TaskState) -> Result<(), ScanError> {
        if !self.can_transition_to(next) {
            return Err(ScanError::InvalidTransition {
                from: *self,
                to: next,
            });
        }
        *self = next;
        Ok(())
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Attempting(n) => write!(f, "attempting({})", n),
            Self::WaitingBackoff(n) => write!(f, "waiting_backoff({})", n),
            Self::Done => write!(f, "done"),
        }
    }
}
