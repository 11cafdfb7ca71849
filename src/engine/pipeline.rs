//! Per-task probe pipeline
//!
//! Drives one task through `Pending -> Attempting(n) -> WaitingBackoff(n) ->
//! ... -> Done`. Suspension points are the attempt itself and the backoff
//! sleep; neither blocks any other pipeline.

use crate::engine::fetcher::ProbeExecutor;
use crate::engine::model::{Attempt, Outcome, OutcomeKind, ProbeResult, UrlTask};
use crate::engine::retry::{RetryDecision, RetryPolicy};
use crate::state::TaskState;
use crate::url::validate_probe_url;
use crate::ScanError;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Everything a pipeline borrows from its scheduler
pub(crate) struct PipelineContext<'a> {
    pub probe: &'a dyn ProbeExecutor,
    pub policy: &'a RetryPolicy,
    pub attempt_timeout: Duration,
    pub cancel_grace: Duration,
    pub cancel: &'a CancellationToken,
}

/// Runs one task to its result
///
/// Never fails: a state machine violation is logged and reported as a
/// cancelled result so the task still yields exactly one result.
pub(crate) async fn run_task(ctx: &PipelineContext<'_>, task: UrlTask) -> ProbeResult {
    let admitted_at = Instant::now();
    let original = task.clone();

    match drive(ctx, task).await {
        Ok(mut result) => {
            result.elapsed = admitted_at.elapsed();
            result
        }
        Err(e) => {
            tracing::error!("Pipeline for {} aborted: {}", original.url, e);
            ProbeResult::new(original, 0, Outcome::Cancelled)
                .with_timing(None, admitted_at.elapsed())
        }
    }
}

async fn drive(ctx: &PipelineContext<'_>, task: UrlTask) -> Result<ProbeResult, ScanError> {
    let primary = probe_series(ctx, &task.url).await?;

    if let Some(fallback) = task.fallback.clone() {
        if is_unreachable(&primary.outcome) && !ctx.cancel.is_cancelled() {
            tracing::debug!(
                "{} unreachable ({}), trying {}",
                task.url,
                primary.outcome,
                fallback
            );
            let second = probe_series(ctx, &fallback).await?;

            // A fallback cancelled before its first attempt keeps the primary outcome
            if second.attempts > 0 {
                let mut result = ProbeResult::new(
                    task,
                    primary.attempts + second.attempts,
                    second.outcome,
                )
                .with_timing(second.response_time, Duration::ZERO);
                result.url = fallback;
                return Ok(result);
            }
        }
    }

    Ok(ProbeResult::new(task, primary.attempts, primary.outcome)
        .with_timing(primary.response_time, Duration::ZERO))
}

/// Returns true for outcomes that mean the scheme could not be reached
fn is_unreachable(outcome: &Outcome) -> bool {
    matches!(
        outcome.kind(),
        OutcomeKind::Timeout | OutcomeKind::ConnectionError
    )
}

/// Attempts made against one URL and the last outcome
struct Series {
    attempts: u32,
    outcome: Outcome,
    response_time: Option<Duration>,
}

impl Series {
    fn new(attempts: u32, outcome: Outcome, response_time: Option<Duration>) -> Self {
        Self {
            attempts,
            outcome,
            response_time,
        }
    }
}

/// Walks one URL through the task state machine until the retry policy stops
async fn probe_series(ctx: &PipelineContext<'_>, raw: &str) -> Result<Series, ScanError> {
    let mut state = TaskState::Pending;

    // Invalid URLs count as one local attempt and never reach the network
    let url = match validate_probe_url(raw) {
        Ok(url) => url,
        Err(e) => {
            tracing::debug!("Invalid URL {:?}: {}", raw, e);
            state.transition_to(TaskState::Done)?;
            return Ok(Series::new(1, Outcome::InvalidUrl, None));
        }
    };

    if ctx.cancel.is_cancelled() {
        state.transition_to(TaskState::Done)?;
        return Ok(Series::new(0, Outcome::Cancelled, None));
    }

    let mut index = 0;
    loop {
        state.transition_to(TaskState::Attempting(index))?;

        let mut attempt = Attempt::start(index);
        tracing::trace!("Attempt {} for {}", index, url);
        attempt.finish(attempt_once(ctx, &url).await);
        let (outcome, response_time) = attempt.into_outcome();
        let attempts_made = index + 1;

        let decision = if ctx.cancel.is_cancelled() {
            RetryDecision::Stop
        } else {
            ctx.policy.decide(attempts_made, &outcome)
        };

        match decision {
            RetryDecision::Stop => {
                state.transition_to(TaskState::Done)?;
                return Ok(Series::new(attempts_made, outcome, response_time));
            }
            RetryDecision::Retry(delay) => {
                state.transition_to(TaskState::WaitingBackoff(index))?;
                tracing::debug!(
                    "Retrying {} after {} ({:?} backoff)",
                    url,
                    outcome,
                    delay
                );

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = ctx.cancel.cancelled() => {
                        state.transition_to(TaskState::Done)?;
                        return Ok(Series::new(attempts_made, Outcome::Cancelled, response_time));
                    }
                }

                index += 1;
            }
        }
    }
}

/// Issues one attempt under the per-attempt deadline
///
/// If cancellation arrives while the attempt is in flight, the attempt gets
/// the grace period to finish on its own; past that it is dropped (releasing
/// its connection) and reported as cancelled.
async fn attempt_once(ctx: &PipelineContext<'_>, url: &Url) -> Outcome {
    let request = tokio::time::timeout(ctx.attempt_timeout, guarded_probe(ctx.probe, url));
    tokio::pin!(request);

    tokio::select! {
        biased;
        finished = &mut request => finished.unwrap_or(Outcome::Timeout),
        _ = ctx.cancel.cancelled() => {
            match tokio::time::timeout(ctx.cancel_grace, &mut request).await {
                Ok(finished) => finished.unwrap_or(Outcome::Timeout),
                Err(_) => {
                    tracing::debug!("Attempt for {} did not finish within grace period", url);
                    Outcome::Cancelled
                }
            }
        }
    }
}

/// Runs the executor, turning a panic into a cancelled outcome
async fn guarded_probe(probe: &dyn ProbeExecutor, url: &Url) -> Outcome {
    match AssertUnwindSafe(probe.probe(url)).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(_) => {
            tracing::error!("Probe executor panicked for {}", url);
            Outcome::Cancelled
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::retry::Backoff;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Scripted {
        outcomes: Vec<Outcome>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(outcomes: Vec<Outcome>) -> Self {
            Self {
                outcomes,
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProbeExecutor for Scripted {
        async fn probe(&self, _url: &Url) -> Outcome {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            self.outcomes
                .get(n)
                .or_else(|| self.outcomes.last())
                .cloned()
                .unwrap_or(Outcome::Cancelled)
        }
    }

    struct Hangs;

    #[async_trait]
    impl ProbeExecutor for Hangs {
        async fn probe(&self, _url: &Url) -> Outcome {
            futures::future::pending::<()>().await;
            Outcome::Cancelled
        }
    }

    struct Panics;

    #[async_trait]
    impl ProbeExecutor for Panics {
        async fn probe(&self, _url: &Url) -> Outcome {
            panic!("executor bug");
        }
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(
            max_attempts,
            [OutcomeKind::Timeout, OutcomeKind::ConnectionError],
            Backoff::Fixed(Duration::from_millis(100)),
        )
    }

    fn context<'a>(
        probe: &'a dyn ProbeExecutor,
        policy: &'a RetryPolicy,
        cancel: &'a CancellationToken,
    ) -> PipelineContext<'a> {
        PipelineContext {
            probe,
            policy,
            attempt_timeout: Duration::from_secs(2),
            cancel_grace: Duration::from_millis(500),
            cancel,
        }
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let probe = Scripted::new(vec![Outcome::Success { status_code: 200 }]);
        let policy = policy(3);
        let cancel = CancellationToken::new();
        let ctx = context(&probe, &policy, &cancel);

        let result = run_task(&ctx, UrlTask::new(0, "https://example.com")).await;
        assert_eq!(result.outcome, Outcome::Success { status_code: 200 });
        assert_eq!(result.attempts, 1);
        assert_eq!(probe.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_succeeds() {
        let probe = Scripted::new(vec![
            Outcome::Timeout,
            Outcome::ConnectionError {
                detail: "reset".to_string(),
            },
            Outcome::Success { status_code: 404 },
        ]);
        let policy = policy(3);
        let cancel = CancellationToken::new();
        let ctx = context(&probe, &policy, &cancel);

        let result = run_task(&ctx, UrlTask::new(0, "https://example.com")).await;
        assert_eq!(result.outcome, Outcome::Success { status_code: 404 });
        assert_eq!(result.attempts, 3);
        assert_eq!(probe.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_attempts_on_timeouts() {
        let probe = Scripted::new(vec![Outcome::Timeout]);
        let policy = policy(4);
        let cancel = CancellationToken::new();
        let ctx = context(&probe, &policy, &cancel);

        let result = run_task(&ctx, UrlTask::new(0, "https://example.com")).await;
        assert_eq!(result.outcome, Outcome::Timeout);
        assert_eq!(result.attempts, 4);
        assert_eq!(probe.calls(), 4);
    }

    #[tokio::test]
    async fn test_invalid_url_never_probes() {
        let probe = Scripted::new(vec![Outcome::Success { status_code: 200 }]);
        let policy = policy(3);
        let cancel = CancellationToken::new();
        let ctx = context(&probe, &policy, &cancel);

        for raw in ["not-a-url", "", "ftp://example.com"] {
            let result = run_task(&ctx, UrlTask::new(0, raw)).await;
            assert_eq!(result.outcome, Outcome::InvalidUrl);
            assert_eq!(result.attempts, 1);
        }
        assert_eq!(probe.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_probe_times_out() {
        let policy = policy(2);
        let cancel = CancellationToken::new();
        let ctx = context(&Hangs, &policy, &cancel);

        let result = run_task(&ctx, UrlTask::new(0, "https://10.255.255.1")).await;
        assert_eq!(result.outcome, Outcome::Timeout);
        assert_eq!(result.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_attempt_forces_cancelled_after_grace() {
        let policy = policy(3);
        let cancel = CancellationToken::new();
        let ctx = context(&Hangs, &policy, &cancel);

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let result = run_task(&ctx, UrlTask::new(0, "https://example.com")).await;
        assert_eq!(result.outcome, Outcome::Cancelled);
        assert_eq!(result.attempts, 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let probe = Scripted::new(vec![Outcome::Success { status_code: 200 }]);
        let policy = policy(3);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let ctx = context(&probe, &policy, &cancel);

        let result = run_task(&ctx, UrlTask::new(0, "https://example.com")).await;
        assert_eq!(result.outcome, Outcome::Cancelled);
        assert_eq!(result.attempts, 0);
        assert_eq!(probe.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let probe = Scripted::new(vec![Outcome::Timeout]);
        let policy = RetryPolicy::new(
            3,
            [OutcomeKind::Timeout],
            Backoff::Fixed(Duration::from_secs(60)),
        );
        let cancel = CancellationToken::new();
        let ctx = context(&probe, &policy, &cancel);

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let result = run_task(&ctx, UrlTask::new(0, "https://example.com")).await;
        assert_eq!(result.outcome, Outcome::Cancelled);
        assert_eq!(result.attempts, 1);
        assert_eq!(probe.calls(), 1);
    }

    #[tokio::test]
    async fn test_panicking_probe_reports_cancelled() {
        let policy = policy(3);
        let cancel = CancellationToken::new();
        let ctx = context(&Panics, &policy, &cancel);

        let result = run_task(&ctx, UrlTask::new(0, "https://example.com")).await;
        assert_eq!(result.outcome, Outcome::Cancelled);
        assert_eq!(result.attempts, 1);
    }

    /// Refuses plain http and answers over https
    struct HttpsOnly {
        schemes: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ProbeExecutor for HttpsOnly {
        async fn probe(&self, url: &Url) -> Outcome {
            if let Ok(mut schemes) = self.schemes.lock() {
                schemes.push(url.scheme().to_string());
            }
            match url.scheme() {
                "https" => Outcome::Success { status_code: 200 },
                _ => Outcome::ConnectionError {
                    detail: "connection refused".to_string(),
                },
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_primary_tries_fallback_scheme() {
        let probe = HttpsOnly {
            schemes: std::sync::Mutex::new(Vec::new()),
        };
        let policy = policy(2);
        let cancel = CancellationToken::new();
        let ctx = context(&probe, &policy, &cancel);

        let task = UrlTask::new(3, "http://example.com")
            .with_fallback(Some("https://example.com".to_string()));
        let result = run_task(&ctx, task).await;

        assert_eq!(result.outcome, Outcome::Success { status_code: 200 });
        assert_eq!(result.url, "https://example.com");
        assert_eq!(result.seq, Some(3));
        assert_eq!(result.attempts, 3);
        assert_eq!(
            *probe.schemes.lock().unwrap(),
            vec!["http", "http", "https"]
        );
    }

    #[tokio::test]
    async fn test_reachable_primary_skips_fallback() {
        let probe = Scripted::new(vec![Outcome::Success { status_code: 503 }]);
        let policy = policy(2);
        let cancel = CancellationToken::new();
        let ctx = context(&probe, &policy, &cancel);

        let task = UrlTask::new(0, "http://example.com")
            .with_fallback(Some("https://example.com".to_string()));
        let result = run_task(&ctx, task).await;

        assert_eq!(result.outcome, Outcome::Success { status_code: 503 });
        assert_eq!(result.url, "http://example.com");
        assert_eq!(result.attempts, 1);
        assert_eq!(probe.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_that_also_fails_reports_its_outcome() {
        let probe = Scripted::new(vec![Outcome::Timeout]);
        let policy = policy(1);
        let cancel = CancellationToken::new();
        let ctx = context(&probe, &policy, &cancel);

        let task = UrlTask::new(0, "http://example.com")
            .with_fallback(Some("https://example.com".to_string()));
        let result = run_task(&ctx, task).await;

        assert_eq!(result.outcome, Outcome::Timeout);
        assert_eq!(result.url, "https://example.com");
        assert_eq!(result.attempts, 2);
    }
}
