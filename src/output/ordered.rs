//! Input-order reconstruction
//!
//! The scheduler delivers results in completion order. `OrderedSink` buffers
//! out-of-order results by sequence number and releases them as soon as the
//! next expected sequence number arrives. The buffer only holds results that
//! completed ahead of a slower predecessor, so its size tracks the spread of
//! completion times rather than the input size.

use crate::engine::ProbeResult;
use crate::output::traits::{OutputResult, ResultSink};
use std::collections::BTreeMap;

/// Sink wrapper that writes results in sequence order
#[derive(Debug)]
pub struct OrderedSink<S> {
    inner: S,
    next_seq: u64,
    pending: BTreeMap<u64, ProbeResult>,
    peak_buffered: usize,
}

impl<S: ResultSink> OrderedSink<S> {
    /// Creates an ordered sink expecting sequence numbers from 0
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            next_seq: 0,
            pending: BTreeMap::new(),
            peak_buffered: 0,
        }
    }

    /// Number of results currently held back
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    /// Largest number of results held back at once
    pub fn peak_buffered(&self) -> usize {
        self.peak_buffered
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn release_ready(&mut self) -> OutputResult<()> {
        while let Some(result) = self.pending.remove(&self.next_seq) {
            self.inner.write(&result)?;
            self.next_seq += 1;
        }
        Ok(())
    }
}

impl<S: ResultSink> ResultSink for OrderedSink<S> {
    fn write(&mut self, result: &ProbeResult) -> OutputResult<()> {
        let seq = match result.seq {
            Some(seq) => seq,
            None => return self.inner.write(result),
        };

        if seq < self.next_seq {
            tracing::warn!("Result for {} arrived with stale sequence {}", result.url, seq);
            return self.inner.write(result);
        }

        self.pending.insert(seq, result.clone());
        self.peak_buffered = self.peak_buffered.max(self.pending.len());
        self.release_ready()
    }

    /// Writes anything still buffered (gaps left by an aborted run) in order
    fn flush(&mut self) -> OutputResult<()> {
        self.release_ready()?;
        if !self.pending.is_empty() {
            tracing::warn!(
                "Flushing {} results past a sequence gap at {}",
                self.pending.len(),
                self.next_seq
            );
            for (_, result) in std::mem::take(&mut self.pending) {
                self.inner.write(&result)?;
            }
        }
        self.inner.flush()
    }
}
