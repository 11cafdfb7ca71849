//! Status code reporting policy
//!
//! Every obtained status code is a `Success` outcome; whether it is worth
//! reporting (is a 404 "live"?) is decided here, at the output edge.

use crate::config::OutputConfig;
use crate::engine::ProbeResult;
use crate::output::traits::{OutputResult, ResultSink};
use std::collections::HashSet;

/// Decides which results are reported
#[derive(Debug, Clone, Default)]
pub struct StatusFilter {
    match_codes: HashSet<u16>,
    exclude_codes: HashSet<u16>,
    report_failures: bool,
}

impl StatusFilter {
    /// A filter that reports everything
    pub fn allow_all() -> Self {
        Self {
            report_failures: true,
            ..Self::default()
        }
    }

    pub fn new(
        match_codes: impl IntoIterator<Item = u16>,
        exclude_codes: impl IntoIterator<Item = u16>,
        report_failures: bool,
    ) -> Self {
        Self {
            match_codes: match_codes.into_iter().collect(),
            exclude_codes: exclude_codes.into_iter().collect(),
            report_failures,
        }
    }

    pub fn from_config(config: &OutputConfig) -> Self {
        Self::new(
            config.match_codes.iter().copied(),
            config.exclude_codes.iter().copied(),
            config.report_failures,
        )
    }

    /// Returns true if a status code passes the match/exclude lists
    ///
    /// Exclusion wins over matching; an empty match list matches everything.
    pub fn accepts_status(&self, status_code: u16) -> bool {
        if self.exclude_codes.contains(&status_code) {
            return false;
        }
        self.match_codes.is_empty() || self.match_codes.contains(&status_code)
    }

    /// Returns true if the result should be written
    pub fn accepts(&self, result: &ProbeResult) -> bool {
        match result.outcome.status_code() {
            Some(code) => self.accepts_status(code),
            None => self.report_failures,
        }
    }

    /// Returns true when the filter can drop anything
    pub fn is_pass_through(&self) -> bool {
        self.report_failures && self.match_codes.is_empty() && self.exclude_codes.is_empty()
    }
}

/// Sink wrapper that only forwards results accepted by a [`StatusFilter`]
#[derive(Debug)]
pub struct FilteredSink<S> {
    inner: S,
    filter: StatusFilter,
    dropped: u64,
}

impl<S: ResultSink> FilteredSink<S> {
    pub fn new(inner: S, filter: StatusFilter) -> Self {
        Self {
            inner,
            filter,
            dropped: 0,
        }
    }

    /// Number of results withheld by the filter
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: ResultSink> ResultSink for FilteredSink<S> {
    fn write(&mut self, result: &ProbeResult) -> OutputResult<()> {
        if self.filter.accepts(result) {
            self.inner.write(result)
        } else {
            self.dropped += 1;
            Ok(())
        }
    }

    fn flush(&mut self) -> OutputResult<()> {
        self.inner.flush()
    }
}
