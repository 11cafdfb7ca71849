//! Line-oriented result writers
//!
//! - `TextSink`: `<classification> - <url>` lines, e.g. `200 - https://example.com`
//! - `JsonLinesSink`: one JSON object per result

use crate::engine::ProbeResult;
use crate::output::traits::{OutputResult, ResultSink};
use serde::Serialize;
use std::io::Write;

/// Writes `<classification> - <url>` lines
#[derive(Debug)]
pub struct TextSink<W: Write> {
    writer: W,
}

impl<W: Write> TextSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ResultSink for TextSink<W> {
    fn write(&mut self, result: &ProbeResult) -> OutputResult<()> {
        writeln!(self.writer, "{}", result)?;
        Ok(())
    }

    fn flush(&mut self) -> OutputResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// JSON record written per result
#[derive(Debug, Serialize)]
struct JsonRecord<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    seq: Option<u64>,
    url: &'a str,
    classification: String,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<&'a str>,
    attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_time_ms: Option<u128>,
    elapsed_ms: u128,
}

impl<'a> From<&'a ProbeResult> for JsonRecord<'a> {
    fn from(result: &'a ProbeResult) -> Self {
        let detail = match &result.outcome {
            crate::engine::Outcome::ConnectionError { detail } => Some(detail.as_str()),
            _ => None,
        };

        Self {
            seq: result.seq,
            url: &result.url,
            classification: result.classification(),
            kind: result.outcome.kind().as_str(),
            status_code: result.outcome.status_code(),
            detail,
            attempts: result.attempts,
            response_time_ms: result.response_time.map(|d| d.as_millis()),
            elapsed_ms: result.elapsed.as_millis(),
        }
    }
}

/// Writes one JSON object per line
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ResultSink for JsonLinesSink<W> {
    fn write(&mut self, result: &ProbeResult) -> OutputResult<()> {
        serde_json::to_writer(&mut self.writer, &JsonRecord::from(result))?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> OutputResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}
