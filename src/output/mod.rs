//! Output module for result sinks and run reports
//!
//! This module handles:
//! - Writing results as text lines or JSON lines
//! - Filtering results by status code and restoring input order
//! - Recording run statistics and generating markdown reports

mod filter;
mod markdown;
mod ordered;
pub mod stats;
mod text;
mod traits;

pub use filter::{FilteredSink, StatusFilter};
pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use ordered::OrderedSink;
pub use stats::{print_statistics, ScanStats};
pub use text::{JsonLinesSink, TextSink};
pub use traits::{CollectSink, OutputError, OutputResult, ResultSink};

use crate::config::{OutputConfig, OutputFormat};
use std::io::Write;

/// Builds the sink chain described by the output configuration
///
/// The base writer is wrapped in the status filter, then (if requested) the
/// reorder buffer. The reorder buffer sits outermost so it sees every
/// sequence number, including results the filter later drops.
pub fn build_sink<W: Write + 'static>(writer: W, config: &OutputConfig) -> Box<dyn ResultSink> {
    let base: Box<dyn ResultSink> = match config.format {
        OutputFormat::Text => Box::new(TextSink::new(writer)),
        OutputFormat::Jsonl => Box::new(JsonLinesSink::new(writer)),
    };

    let filter = StatusFilter::from_config(config);
    let filtered: Box<dyn ResultSink> = if filter.is_pass_through() {
        base
    } else {
        Box::new(FilteredSink::new(base, filter))
    };

    if config.ordered {
        Box::new(OrderedSink::new(filtered))
    } else {
        filtered
    }
}
