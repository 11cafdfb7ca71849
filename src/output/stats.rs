//! Run statistics
//!
//! Statistics are recorded by the scheduler for every result, before any
//! output filtering, so they always describe the whole run.

use crate::engine::{OutcomeKind, ProbeResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Aggregated statistics for one scan run
#[derive(Debug, Clone, Serialize)]
pub struct ScanStats {
    /// Total number of results recorded
    pub total: u64,

    /// Count of results by outcome kind
    pub by_kind: HashMap<OutcomeKind, u64>,

    /// Count of `Success` results by status code
    pub status_distribution: BTreeMap<u16, u64>,

    /// Sum of attempts over all results
    pub total_attempts: u64,

    /// Number of results that needed more than one attempt
    pub retried_tasks: u64,

    pub started_at: DateTime<Utc>,

    pub finished_at: Option<DateTime<Utc>>,

    /// Wall-clock duration of the run, set by [`ScanStats::finish`]
    #[serde(skip)]
    pub elapsed: Duration,
}

impl Default for ScanStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanStats {
    /// Creates empty statistics stamped with the current time
    pub fn new() -> Self {
        Self {
            total: 0,
            by_kind: HashMap::new(),
            status_distribution: BTreeMap::new(),
            total_attempts: 0,
            retried_tasks: 0,
            started_at: Utc::now(),
            finished_at: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Records one result
    pub fn record(&mut self, result: &ProbeResult) {
        self.total += 1;
        *self.by_kind.entry(result.outcome.kind()).or_insert(0) += 1;
        if let Some(code) = result.outcome.status_code() {
            *self.status_distribution.entry(code).or_insert(0) += 1;
        }
        self.total_attempts += u64::from(result.attempts);
        if result.attempts > 1 {
            self.retried_tasks += 1;
        }
    }

    /// Stamps the end of the run
    pub fn finish(&mut self, elapsed: Duration) {
        self.finished_at = Some(Utc::now());
        self.elapsed = elapsed;
    }

    /// Number of results with the given outcome kind
    pub fn count(&self, kind: OutcomeKind) -> u64 {
        self.by_kind.get(&kind).copied().unwrap_or(0)
    }

    /// Number of results that obtained a status code
    pub fn live(&self) -> u64 {
        self.count(OutcomeKind::Success)
    }

    /// Number of results without a status code
    pub fn failed(&self) -> u64 {
        self.total - self.live()
    }

    /// Percentage of results that obtained a status code
    pub fn live_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.live() as f64 / self.total as f64) * 100.0
        }
    }

    /// Results per second over the run
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total as f64 / secs
        } else {
            0.0
        }
    }

    /// Status classes (2xx, 3xx, ...) with their counts
    pub fn status_classes(&self) -> BTreeMap<u16, u64> {
        let mut classes = BTreeMap::new();
        for (code, count) in &self.status_distribution {
            *classes.entry(code / 100).or_insert(0) += count;
        }
        classes
    }
}

/// Prints statistics to stderr in a formatted manner
///
/// Stdout is reserved for results, so the report goes to stderr.
pub fn print_statistics(stats: &ScanStats) {
    eprintln!("=== Scan Statistics ===\n");

    eprintln!("Overview:");
    eprintln!("  Total URLs: {}", stats.total);
    eprintln!("  Total attempts: {}", stats.total_attempts);
    eprintln!("  Retried URLs: {}", stats.retried_tasks);
    eprintln!(
        "  Elapsed: {:.2}s ({:.1} URLs/sec)",
        stats.elapsed.as_secs_f64(),
        stats.throughput()
    );
    eprintln!();

    eprintln!("Results by Outcome:");
    for kind in OutcomeKind::all() {
        let count = stats.count(kind);
        if count == 0 {
            continue;
        }
        let percentage = if stats.total > 0 {
            (count as f64 / stats.total as f64) * 100.0
        } else {
            0.0
        };
        eprintln!("  {}: {} ({:.1}%)", kind.token(), count, percentage);
    }
    eprintln!();

    if !stats.status_distribution.is_empty() {
        eprintln!("Status Codes:");
        for (code, count) in &stats.status_distribution {
            eprintln!("  {}: {}", code, count);
        }
        eprintln!();
    }

    eprintln!(
        "Live Rate: {:.1}% ({} / {} URLs answered)",
        stats.live_rate(),
        stats.live(),
        stats.total
    );
}
