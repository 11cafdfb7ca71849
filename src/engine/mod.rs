//! Probing engine
//!
//! This module contains the core probing logic, including:
//! - The outcome and result data model
//! - HTTP probe execution and error classification
//! - Retry policy with backoff
//! - Per-task pipelines and the bounded-concurrency scheduler
//! - Overall scan coordination

mod coordinator;
mod fetcher;
mod model;
mod pipeline;
mod retry;
mod scheduler;

pub use coordinator::{run_scan, Coordinator};
pub use fetcher::{build_http_client, classify_error, HttpProber, ProbeExecutor};
pub use model::{Attempt, Outcome, OutcomeKind, ProbeResult, UrlTask};
pub use retry::{Backoff, RetryDecision, RetryPolicy};
pub use scheduler::{RunSummary, Scheduler, SchedulerOptions};
