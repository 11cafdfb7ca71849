//! Outcome and result data model
//!
//! A [`UrlTask`] is produced once by the source and consumed once by the
//! scheduler. Each probe try is an [`Attempt`]; only the final attempt's
//! [`Outcome`] survives into the task's [`ProbeResult`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// One URL scheduled for probing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTask {
    /// Normalized URL string (may be syntactically invalid)
    pub url: String,

    /// Position in the input, used to reconstruct input order
    pub seq: Option<u64>,

    /// URL probed when `url` ends unreachable (`Timeout` or `ConnectionError`)
    pub fallback: Option<String>,
}

impl UrlTask {
    pub fn new(seq: u64, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            seq: Some(seq),
            fallback: None,
        }
    }

    /// Creates a task without a sequence number
    pub fn unsequenced(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            seq: None,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Option<String>) -> Self {
        self.fallback = fallback;
        self
    }
}

/// Classified result of a single attempt
///
/// `Success` means a status code was obtained, whatever its value: a 404 or
/// 503 is still a `Success`. Liveness judgement belongs to the output filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Outcome {
    Success { status_code: u16 },
    Timeout,
    ConnectionError { detail: String },
    TooManyRedirects,
    InvalidUrl,
    Cancelled,
}

/// Tag of an [`Outcome`] without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeKind {
    Success,
    Timeout,
    ConnectionError,
    TooManyRedirects,
    InvalidUrl,
    Cancelled,
}

impl Outcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Success { .. } => OutcomeKind::Success,
            Self::Timeout => OutcomeKind::Timeout,
            Self::ConnectionError { .. } => OutcomeKind::ConnectionError,
            Self::TooManyRedirects => OutcomeKind::TooManyRedirects,
            Self::InvalidUrl => OutcomeKind::InvalidUrl,
            Self::Cancelled => OutcomeKind::Cancelled,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Success { status_code } => Some(*status_code),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns the output classification: the numeric status code for
    /// `Success`, a fixed token otherwise
    pub fn classification(&self) -> String {
        match self {
            Self::Success { status_code } => status_code.to_string(),
            other => other.kind().token().to_string(),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success { status_code } => write!(f, "HTTP {}", status_code),
            Self::ConnectionError { detail } => write!(f, "connection error: {}", detail),
            other => write!(f, "{}", other.kind()),
        }
    }
}

impl OutcomeKind {
    /// Returns the fixed output token for this kind
    pub fn token(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Timeout => "TIMEOUT",
            Self::ConnectionError => "ERROR",
            Self::TooManyRedirects => "REDIRECTS",
            Self::InvalidUrl => "INVALID",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Timeout => "timeout",
            Self::ConnectionError => "connection-error",
            Self::TooManyRedirects => "too-many-redirects",
            Self::InvalidUrl => "invalid-url",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns all outcome kinds
    pub fn all() -> [Self; 6] {
        [
            Self::Success,
            Self::Timeout,
            Self::ConnectionError,
            Self::TooManyRedirects,
            Self::InvalidUrl,
            Self::Cancelled,
        ]
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One HTTP request try for a task
///
/// Owned by the pipeline that runs it and discarded once classified.
#[derive(Debug)]
pub struct Attempt {
    /// Zero-based attempt index
    pub index: u32,
    pub started_at: Instant,
    pub duration: Option<Duration>,
    pub outcome: Option<Outcome>,
}

impl Attempt {
    pub fn start(index: u32) -> Self {
        Self {
            index,
            started_at: Instant::now(),
            duration: None,
            outcome: None,
        }
    }

    /// Records the attempt's outcome and duration
    pub fn finish(&mut self, outcome: Outcome) {
        self.duration = Some(self.started_at.elapsed());
        self.outcome = Some(outcome);
    }

    /// Returns the outcome; an unfinished attempt reads as cancelled
    pub fn into_outcome(self) -> (Outcome, Option<Duration>) {
        (self.outcome.unwrap_or(Outcome::Cancelled), self.duration)
    }
}

/// Terminal record for a task, handed to the sink exactly once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub url: String,
    pub seq: Option<u64>,

    /// Number of attempts made (0 only for tasks cancelled before admission)
    pub attempts: u32,

    pub outcome: Outcome,

    /// Duration of the final attempt
    pub response_time: Option<Duration>,

    /// Wall time from admission to result
    pub elapsed: Duration,
}

impl ProbeResult {
    pub fn new(task: UrlTask, attempts: u32, outcome: Outcome) -> Self {
        Self {
            url: task.url,
            seq: task.seq,
            attempts,
            outcome,
            response_time: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Result for a task that was never admitted before cancellation
    pub fn not_started(task: UrlTask) -> Self {
        Self::new(task, 0, Outcome::Cancelled)
    }

    pub fn with_timing(mut self, response_time: Option<Duration>, elapsed: Duration) -> Self {
        self.response_time = response_time;
        self.elapsed = elapsed;
        self
    }

    pub fn classification(&self) -> String {
        self.outcome.classification()
    }
}

impl fmt::Display for ProbeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.classification(), self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_kind() {
        assert_eq!(Outcome::Success { status_code: 200 }.kind(), OutcomeKind::Success);
        assert_eq!(Outcome::Timeout.kind(), OutcomeKind::Timeout);
        assert_eq!(
            Outcome::ConnectionError {
                detail: "refused".to_string()
            }
            .kind(),
            OutcomeKind::ConnectionError
        );
        assert_eq!(Outcome::TooManyRedirects.kind(), OutcomeKind::TooManyRedirects);
        assert_eq!(Outcome::InvalidUrl.kind(), OutcomeKind::InvalidUrl);
        assert_eq!(Outcome::Cancelled.kind(), OutcomeKind::Cancelled);
    }

    #[test]
    fn test_classification_tokens() {
        assert_eq!(Outcome::Success { status_code: 404 }.classification(), "404");
        assert_eq!(Outcome::Timeout.classification(), "TIMEOUT");
        assert_eq!(
            Outcome::ConnectionError {
                detail: "reset".to_string()
            }
            .classification(),
            "ERROR"
        );
        assert_eq!(Outcome::TooManyRedirects.classification(), "REDIRECTS");
        assert_eq!(Outcome::InvalidUrl.classification(), "INVALID");
        assert_eq!(Outcome::Cancelled.classification(), "CANCELLED");
    }

    #[test]
    fn test_non_2xx_is_success() {
        let outcome = Outcome::Success { status_code: 503 };
        assert!(outcome.is_success());
        assert_eq!(outcome.status_code(), Some(503));
        assert_eq!(Outcome::Timeout.status_code(), None);
    }

    #[test]
    fn test_result_display_line() {
        let result = ProbeResult::new(
            UrlTask::new(0, "https://example.com"),
            1,
            Outcome::Success { status_code: 200 },
        );
        assert_eq!(result.to_string(), "200 - https://example.com");

        let result = ProbeResult::new(UrlTask::new(1, "not-a-url"), 1, Outcome::InvalidUrl);
        assert_eq!(result.to_string(), "INVALID - not-a-url");
    }

    #[test]
    fn test_not_started_result() {
        let result = ProbeResult::not_started(UrlTask::new(7, "https://example.com"));
        assert_eq!(result.attempts, 0);
        assert_eq!(result.outcome, Outcome::Cancelled);
        assert_eq!(result.seq, Some(7));
    }

    #[test]
    fn test_kind_names_parse_back() {
        for kind in OutcomeKind::all() {
            let quoted = format!("\"{}\"", kind.as_str());
            let parsed: OutcomeKind = serde_json::from_str(&quoted).unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn test_attempt_finish() {
        let mut attempt = Attempt::start(0);
        attempt.finish(Outcome::Timeout);
        let (outcome, duration) = attempt.into_outcome();
        assert_eq!(outcome, Outcome::Timeout);
        assert!(duration.is_some());
    }

    #[test]
    fn test_unfinished_attempt_reads_cancelled() {
        let (outcome, duration) = Attempt::start(1).into_outcome();
        assert_eq!(outcome, Outcome::Cancelled);
        assert!(duration.is_none());
    }
}
