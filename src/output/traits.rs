//! Result sink trait and output errors
//!
//! The scheduler is the single consumption point for completed results: every
//! result reaches exactly one `write` call, serialized on the scheduler's task.

use crate::engine::ProbeResult;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Failed to format output: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Consumer of completed results
///
/// Responsible for persistence and formatting. A failed write aborts the run
/// after the results already written have been flushed.
pub trait ResultSink {
    /// Records one completed result
    fn write(&mut self, result: &ProbeResult) -> OutputResult<()>;

    /// Flushes buffered output; called once when the run ends
    fn flush(&mut self) -> OutputResult<()> {
        Ok(())
    }
}

impl<S: ResultSink + ?Sized> ResultSink for Box<S> {
    fn write(&mut self, result: &ProbeResult) -> OutputResult<()> {
        (**self).write(result)
    }

    fn flush(&mut self) -> OutputResult<()> {
        (**self).flush()
    }
}

/// Sink that keeps every result in memory
///
/// Handy for library callers with small inputs and for tests.
#[derive(Debug, Default)]
pub struct CollectSink {
    pub results: Vec<ProbeResult>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_results(self) -> Vec<ProbeResult> {
        self.results
    }
}

impl ResultSink for CollectSink {
    fn write(&mut self, result: &ProbeResult) -> OutputResult<()> {
        self.results.push(result.clone());
        Ok(())
    }
}
