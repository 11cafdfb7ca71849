use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

/// Process-wide state for one scan run
///
/// Only the scheduler mutates the counters; everything else reads them through
/// [`RunState::snapshot`]. The cancellation token is the run's single
/// cancellation signal: interrupts, the run timeout and sink failures all
/// trigger it.
#[derive(Debug, Default)]
pub struct RunState {
    admitted: AtomicU64,
    in_flight: AtomicUsize,
    completed: AtomicU64,
    peak_in_flight: AtomicUsize,
    cancel: CancellationToken,
}

/// Point-in-time copy of the run counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSnapshot {
    pub admitted: u64,
    pub in_flight: usize,
    pub completed: u64,
    pub peak_in_flight: usize,
    pub cancelled: bool,
}

impl RunState {
    /// Creates a fresh run state with its own cancellation token
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a task entering the admission window
    pub(crate) fn admit(&self) {
        self.admitted.fetch_add(1, Ordering::Relaxed);
        let now = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::AcqRel);
    }

    /// Records a task leaving the admission window with its result
    pub(crate) fn complete(&self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a result produced for a task that never entered the window
    pub(crate) fn complete_unstarted(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Signals cancellation
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Returns a clone of the run's cancellation token
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            admitted: self.admitted.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Acquire),
            completed: self.completed.load(Ordering::Relaxed),
            peak_in_flight: self.peak_in_flight.load(Ordering::Acquire),
            cancelled: self.cancel.is_cancelled(),
        }
    }
}
