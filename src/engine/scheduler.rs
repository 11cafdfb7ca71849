//! Concurrency scheduler
//!
//! This module handles:
//! - Sliding-window admission of tasks under a fixed concurrency ceiling
//! - Fan-in of completed results to a single sink, in completion order
//! - Run timeout and cancellation (interrupts, sink and source failures)
//! - Marking never-started tasks as cancelled so every task yields a result
//!
//! The source is an async stream polled alongside the in-flight pipelines,
//! and only while a slot in the admission window is free. A source that is
//! slow to produce its next task never holds back completed results. The
//! source is never materialized, so memory and open sockets stay bounded by
//! the ceiling regardless of input size.

use crate::config::{validate_concurrency, Config};
use crate::engine::fetcher::{HttpProber, ProbeExecutor};
use crate::engine::model::{ProbeResult, UrlTask};
use crate::engine::pipeline::{run_task, PipelineContext};
use crate::engine::retry::RetryPolicy;
use crate::output::{ResultSink, ScanStats};
use crate::state::RunState;
use crate::ScanError;
use futures::stream::{FuturesUnordered, Stream, StreamExt};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Scheduler tuning knobs
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Maximum number of tasks in the admission window
    pub concurrency: usize,

    /// Whole-run deadline; behaves like an interrupt when it elapses
    pub run_timeout: Option<Duration>,

    /// How long an in-flight attempt may keep running after cancellation
    pub cancel_grace: Duration,

    /// Deadline for a single attempt
    pub attempt_timeout: Duration,

    /// Number of results between progress log lines (0 disables)
    pub progress_interval: u64,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl SchedulerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            concurrency: config.engine.concurrency,
            run_timeout: config.engine.run_timeout(),
            cancel_grace: config.engine.cancel_grace(),
            attempt_timeout: config.probe.timeout(),
            progress_interval: config.engine.progress_interval,
        }
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Statistics over every result, including ones the sink filtered out
    pub stats: ScanStats,

    /// True if the run was cancelled (interrupt or run timeout)
    pub cancelled: bool,

    /// True if cancellation came from the run timeout
    pub timed_out: bool,

    /// Largest number of tasks that were in flight at once
    pub peak_in_flight: usize,
}

impl RunSummary {
    /// Short status label for reports
    pub fn status(&self) -> &'static str {
        if self.timed_out {
            "timed out"
        } else if self.cancelled {
            "cancelled"
        } else {
            "completed"
        }
    }
}

/// Bounded-concurrency scheduler
///
/// A scheduler drives one run: its [`RunState`] counters and cancellation
/// token are not reset between calls to [`Scheduler::run`].
pub struct Scheduler {
    probe: Arc<dyn ProbeExecutor>,
    policy: RetryPolicy,
    options: SchedulerOptions,
    state: Arc<RunState>,
}

impl Scheduler {
    /// Creates a new scheduler
    ///
    /// # Returns
    ///
    /// * `Ok(Scheduler)` - Successfully created scheduler
    /// * `Err(ScanError::Config)` - The concurrency ceiling is not positive
    pub fn new(
        probe: Arc<dyn ProbeExecutor>,
        policy: RetryPolicy,
        options: SchedulerOptions,
    ) -> Result<Self, ScanError> {
        validate_concurrency(options.concurrency)?;

        Ok(Self {
            probe,
            policy,
            options,
            state: Arc::new(RunState::new()),
        })
    }

    /// Creates a scheduler probing over HTTP as described by `config`
    pub fn from_config(config: &Config) -> Result<Self, ScanError> {
        let prober = HttpProber::from_config(&config.probe)?;
        Self::new(
            Arc::new(prober),
            RetryPolicy::from_config(&config.retry),
            SchedulerOptions::from_config(config),
        )
    }

    /// Returns the token that cancels this scheduler's run
    pub fn cancellation_token(&self) -> CancellationToken {
        self.state.token()
    }

    pub fn run_state(&self) -> Arc<RunState> {
        Arc::clone(&self.state)
    }

    pub fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    /// Runs every task from `source` and hands each result to `sink`
    ///
    /// Results reach the sink in completion order, one `write` per task, all
    /// from this call's task. The sink is flushed once at the end, including
    /// when the run aborts.
    ///
    /// # Returns
    ///
    /// * `Ok(RunSummary)` - The source was exhausted or the run was cancelled
    /// * `Err(ScanError::Source)` - Reading the source failed
    /// * `Err(ScanError::Output)` - Writing to the sink failed
    pub async fn run<S>(&self, source: S, sink: &mut dyn ResultSink) -> Result<RunSummary, ScanError>
    where
        S: Stream<Item = io::Result<UrlTask>>,
    {
        let cancel = self.state.token();
        let ctx = PipelineContext {
            probe: self.probe.as_ref(),
            policy: &self.policy,
            attempt_timeout: self.options.attempt_timeout,
            cancel_grace: self.options.cancel_grace,
            cancel: &cancel,
        };

        let started = Instant::now();
        let mut delivery = Delivery {
            sink,
            stats: ScanStats::new(),
            failure: None,
            sink_failed: false,
            progress_interval: self.options.progress_interval,
            started,
        };

        tracing::info!(
            "Starting scan with concurrency {} and {} attempt(s) per URL",
            self.options.concurrency,
            self.policy.max_attempts()
        );

        tokio::pin!(source);
        let mut source_done = false;
        let mut timed_out = false;
        let mut pending = FuturesUnordered::new();

        let run_timeout = self.options.run_timeout;
        let deadline = async move {
            match run_timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => futures::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        loop {
            let can_admit =
                !source_done && !cancel.is_cancelled() && pending.len() < self.options.concurrency;
            if !can_admit && pending.is_empty() {
                break;
            }

            tokio::select! {
                Some(result) = pending.next() => {
                    self.state.complete();
                    delivery.deliver(&result, &self.state, &cancel);
                }
                item = source.next(), if can_admit => match item {
                    Some(Ok(task)) => {
                        self.state.admit();
                        pending.push(run_task(&ctx, task));
                    }
                    Some(Err(e)) => {
                        tracing::error!("URL source failed: {}", e);
                        delivery.fail(ScanError::Source(e));
                        cancel.cancel();
                        source_done = true;
                    }
                    None => source_done = true,
                },
                _ = &mut deadline, if !timed_out => {
                    tracing::warn!("Run timeout reached, cancelling remaining work");
                    timed_out = true;
                    cancel.cancel();
                }
                else => break,
            }
        }

        // Tasks the source still holds were never started
        if cancel.is_cancelled() && !source_done && delivery.failure.is_none() {
            let mut unstarted = 0u64;
            while let Some(item) = source.next().await {
                match item {
                    Ok(task) => {
                        self.state.complete_unstarted();
                        delivery.deliver(&ProbeResult::not_started(task), &self.state, &cancel);
                        unstarted += 1;
                        if delivery.failure.is_some() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!("URL source failed while draining: {}", e);
                        delivery.fail(ScanError::Source(e));
                        break;
                    }
                }
            }
            if unstarted > 0 {
                tracing::info!("{} URLs were never started and are marked cancelled", unstarted);
            }
        }

        let Delivery {
            sink,
            mut stats,
            mut failure,
            sink_failed,
            ..
        } = delivery;

        if !sink_failed {
            if let Err(e) = sink.flush() {
                tracing::error!("Failed to flush results: {}", e);
                failure.get_or_insert(ScanError::Output(e));
            }
        }

        stats.finish(started.elapsed());
        let snapshot = self.state.snapshot();

        if let Some(e) = failure {
            tracing::error!(
                "Scan aborted after {} results: {}",
                snapshot.completed,
                e
            );
            return Err(e);
        }

        tracing::info!(
            "Scan finished: {} results in {:?} (peak {} in flight)",
            stats.total,
            stats.elapsed,
            snapshot.peak_in_flight
        );

        Ok(RunSummary {
            stats,
            cancelled: snapshot.cancelled,
            timed_out,
            peak_in_flight: snapshot.peak_in_flight,
        })
    }
}

/// The single consumption point for results
struct Delivery<'s> {
    sink: &'s mut dyn ResultSink,
    stats: ScanStats,
    failure: Option<ScanError>,
    sink_failed: bool,
    progress_interval: u64,
    started: Instant,
}

impl Delivery<'_> {
    fn deliver(&mut self, result: &ProbeResult, state: &RunState, cancel: &CancellationToken) {
        self.stats.record(result);
        tracing::debug!("{} ({} attempts)", result, result.attempts);

        if !self.sink_failed {
            if let Err(e) = self.sink.write(result) {
                tracing::error!("Failed to write result for {}: {}", result.url, e);
                self.sink_failed = true;
                self.fail(ScanError::Output(e));
                cancel.cancel();
            }
        }

        if self.progress_interval > 0 && self.stats.total % self.progress_interval == 0 {
            let elapsed = self.started.elapsed();
            let rate = self.stats.total as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
            tracing::info!(
                "Progress: {} URLs done, {} in flight, {:.2} URLs/sec",
                self.stats.total,
                state.in_flight(),
                rate
            );
        }
    }

    /// Keeps the first fatal error
    fn fail(&mut self, error: ScanError) {
        if self.failure.is_none() {
            self.failure = Some(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::model::{Outcome, OutcomeKind};
    use crate::engine::retry::Backoff;
    use crate::input::tasks_from_urls;
    use crate::output::{CollectSink, OutputError, OutputResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;

    /// Answers 200 after a delay (`/slow` paths take longer, `/hang` never
    /// answers) and records how many probes overlap
    #[derive(Default)]
    struct Tracking {
        current: AtomicUsize,
        max: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProbeExecutor for Tracking {
        async fn probe(&self, url: &Url) -> Outcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.max.fetch_max(now, Ordering::SeqCst);

            match url.path() {
                "/hang" => futures::future::pending::<()>().await,
                "/slow" => tokio::time::sleep(Duration::from_millis(500)).await,
                _ => tokio::time::sleep(Duration::from_millis(10)).await,
            }

            self.current.fetch_sub(1, Ordering::SeqCst);
            Outcome::Success { status_code: 200 }
        }
    }

    struct FailingSink;

    impl ResultSink for FailingSink {
        fn write(&mut self, _result: &ProbeResult) -> OutputResult<()> {
            Err(OutputError::Write("disk full".to_string()))
        }
    }

    fn options(concurrency: usize) -> SchedulerOptions {
        SchedulerOptions {
            concurrency,
            run_timeout: None,
            cancel_grace: Duration::from_millis(200),
            attempt_timeout: Duration::from_secs(5),
            progress_interval: 0,
        }
    }

    fn scheduler(probe: Arc<Tracking>, options: SchedulerOptions) -> Scheduler {
        let policy = RetryPolicy::new(
            2,
            [OutcomeKind::Timeout, OutcomeKind::ConnectionError],
            Backoff::Fixed(Duration::from_millis(50)),
        );
        Scheduler::new(probe, policy, options).unwrap()
    }

    fn urls(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://host{}.example.com/", i)).collect()
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let result = Scheduler::new(
            Arc::new(Tracking::default()),
            RetryPolicy::default(),
            options(0),
        );
        assert!(matches!(result, Err(ScanError::Config(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_task_yields_one_result_within_ceiling() {
        let probe = Arc::new(Tracking::default());
        let scheduler = scheduler(Arc::clone(&probe), options(4));
        let mut sink = CollectSink::new();

        let summary = scheduler
            .run(tasks_from_urls(urls(25)), &mut sink)
            .await
            .unwrap();

        let results = sink.into_results();
        assert_eq!(results.len(), 25);
        let mut seqs: Vec<u64> = results.iter().filter_map(|r| r.seq).collect();
        seqs.sort_unstable();
        assert_eq!(seqs, (0..25).collect::<Vec<_>>());

        assert_eq!(summary.stats.total, 25);
        assert!(!summary.cancelled);
        assert_eq!(summary.status(), "completed");
        assert!(summary.peak_in_flight <= 4);
        assert_eq!(summary.peak_in_flight, 4);
        assert!(probe.max.load(Ordering::SeqCst) <= 4);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 25);
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_arrive_in_completion_order() {
        let probe = Arc::new(Tracking::default());
        let scheduler = scheduler(probe, options(2));
        let mut sink = CollectSink::new();

        scheduler
            .run(
                tasks_from_urls(vec![
                    "https://a.example.com/slow".to_string(),
                    "https://b.example.com/".to_string(),
                ]),
                &mut sink,
            )
            .await
            .unwrap();

        let seqs: Vec<_> = sink.into_results().iter().map(|r| r.seq).collect();
        assert_eq!(seqs, vec![Some(1), Some(0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_urls_never_reach_executor() {
        let probe = Arc::new(Tracking::default());
        let scheduler = scheduler(Arc::clone(&probe), options(2));
        let mut sink = CollectSink::new();

        let summary = scheduler
            .run(
                tasks_from_urls(vec![
                    "https://example.com/".to_string(),
                    "not-a-url".to_string(),
                    String::new(),
                ]),
                &mut sink,
            )
            .await
            .unwrap();

        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
        assert_eq!(summary.stats.count(OutcomeKind::InvalidUrl), 2);
        for result in sink.into_results() {
            assert_eq!(result.attempts, 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_timeout_cancels_remaining_tasks() {
        let probe = Arc::new(Tracking::default());
        let mut opts = options(1);
        opts.run_timeout = Some(Duration::from_secs(1));
        let scheduler = scheduler(Arc::clone(&probe), opts);
        let mut sink = CollectSink::new();

        let summary = scheduler
            .run(
                tasks_from_urls(vec![
                    "https://a.example.com/hang".to_string(),
                    "https://b.example.com/".to_string(),
                    "https://c.example.com/".to_string(),
                ]),
                &mut sink,
            )
            .await
            .unwrap();

        assert!(summary.cancelled);
        assert!(summary.timed_out);
        assert_eq!(summary.status(), "timed out");
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);

        let results = sink.into_results();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.outcome == Outcome::Cancelled));
        assert_eq!(results[0].seq, Some(0));
        assert_eq!(results[0].attempts, 1);
        assert_eq!(results[1].attempts, 0);
        assert_eq!(results[2].attempts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_cancel_keeps_completed_results() {
        let probe = Arc::new(Tracking::default());
        let scheduler = scheduler(Arc::clone(&probe), options(1));
        let token = scheduler.cancellation_token();
        let mut sink = CollectSink::new();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            token.cancel();
        });

        let summary = scheduler
            .run(
                tasks_from_urls(vec![
                    "https://a.example.com/".to_string(),
                    "https://b.example.com/hang".to_string(),
                    "https://c.example.com/".to_string(),
                ]),
                &mut sink,
            )
            .await
            .unwrap();

        assert!(summary.cancelled);
        assert!(!summary.timed_out);

        let results = sink.into_results();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].outcome, Outcome::Success { status_code: 200 });
        assert_eq!(results[1].outcome, Outcome::Cancelled);
        assert_eq!(results[1].attempts, 1);
        assert_eq!(results[2].outcome, Outcome::Cancelled);
        assert_eq!(results[2].attempts, 0);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_error_aborts_after_flushing() {
        let probe = Arc::new(Tracking::default());
        let scheduler = scheduler(probe, options(1));
        let mut sink = CollectSink::new();

        let source = futures::stream::iter(vec![
            Ok(UrlTask::new(0, "https://a.example.com/")),
            Err(io::Error::new(io::ErrorKind::InvalidData, "bad input")),
            Ok(UrlTask::new(1, "https://b.example.com/")),
        ]);

        let result = scheduler.run(source, &mut sink).await;
        assert!(matches!(result, Err(ScanError::Source(_))));
        assert_eq!(sink.into_results().len(), 1);
    }

    /// Records when each result reached it
    struct TimedSink {
        written: Vec<(Option<u64>, tokio::time::Instant)>,
    }

    impl ResultSink for TimedSink {
        fn write(&mut self, result: &ProbeResult) -> OutputResult<()> {
            self.written.push((result.seq, tokio::time::Instant::now()));
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_source_does_not_hold_back_results() {
        let probe = Arc::new(Tracking::default());
        let scheduler = scheduler(probe, options(2));
        let mut sink = TimedSink { written: Vec::new() };

        // The second line shows up a second after the first
        let source = futures::stream::iter(vec![Ok(UrlTask::new(0, "https://a.example.com/"))])
            .chain(futures::stream::once(async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(UrlTask::new(1, "https://b.example.com/"))
            }));

        let started = tokio::time::Instant::now();
        let summary = scheduler.run(source, &mut sink).await.unwrap();

        assert_eq!(summary.stats.total, 2);
        assert_eq!(sink.written.len(), 2);
        assert_eq!(sink.written[0].0, Some(0));
        assert!(sink.written[0].1 - started < Duration::from_millis(500));
        assert!(sink.written[1].1 - started >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_timeout_while_waiting_on_source() {
        let probe = Arc::new(Tracking::default());
        let mut opts = options(2);
        opts.run_timeout = Some(Duration::from_secs(1));
        let scheduler = scheduler(probe, opts);
        let mut sink = CollectSink::new();

        let source = futures::stream::iter(vec![Ok(UrlTask::new(0, "https://a.example.com/"))])
            .chain(futures::stream::once(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(UrlTask::new(1, "https://b.example.com/"))
            }));

        let summary = scheduler.run(source, &mut sink).await.unwrap();

        assert!(summary.timed_out);
        let results = sink.into_results();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].outcome, Outcome::Success { status_code: 200 });
        assert_eq!(results[1].outcome, Outcome::Cancelled);
        assert_eq!(results[1].attempts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sink_failure_aborts_run() {
        let probe = Arc::new(Tracking::default());
        let scheduler = scheduler(Arc::clone(&probe), options(1));

        let result = scheduler
            .run(tasks_from_urls(urls(10)), &mut FailingSink)
            .await;

        assert!(matches!(result, Err(ScanError::Output(_))));
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
        assert!(scheduler.run_state().is_cancelled());
    }
}
