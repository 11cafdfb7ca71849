//! State module for tracking scan progress
//!
//! # Components
//!
//! - `TaskState`: the per-task pipeline state machine (pending, attempting, backoff, done)
//! - `RunState`: run-wide admission counters and the cancellation signal

mod run_state;
mod task_state;

// Re-export main types
pub use run_state::{RunSnapshot, RunState};
pub use task_state::TaskState;
