//! Markdown run report
//!
//! This module generates a human-readable markdown report of a scan run:
//! run information, outcome breakdown and status code distribution.

use crate::engine::{OutcomeKind, RunSummary};
use crate::output::traits::OutputResult;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Generates a markdown report of a finished run
///
/// # Arguments
///
/// * `summary` - The run summary
/// * `config_hash` - Hash of the configuration file, if one was loaded
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote the report
/// * `Err(OutputError)` - Failed to write the report
pub fn generate_markdown_summary(
    summary: &RunSummary,
    config_hash: Option<&str>,
    output_path: &Path,
) -> OutputResult<()> {
    let markdown = format_markdown_summary(summary, config_hash);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run summary as markdown
pub fn format_markdown_summary(summary: &RunSummary, config_hash: Option<&str>) -> String {
    let stats = &summary.stats;
    let mut md = String::new();

    md.push_str("# livehttpx Scan Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Started**: {}\n", stats.started_at.to_rfc3339()));
    if let Some(finished) = &stats.finished_at {
        md.push_str(&format!("- **Finished**: {}\n", finished.to_rfc3339()));
    }
    md.push_str(&format!(
        "- **Duration**: {:.2} seconds\n",
        stats.elapsed.as_secs_f64()
    ));
    md.push_str(&format!("- **Status**: {}\n", summary.status()));
    md.push_str(&format!(
        "- **Peak In-Flight**: {}\n",
        summary.peak_in_flight
    ));
    if let Some(hash) = config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    md.push('\n');

    // Overall statistics
    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Total URLs**: {}\n", stats.total));
    md.push_str(&format!("- **Answered**: {}\n", stats.live()));
    md.push_str(&format!("- **Failed**: {}\n", stats.failed()));
    md.push_str(&format!("- **Total Attempts**: {}\n", stats.total_attempts));
    md.push_str(&format!("- **Retried URLs**: {}\n", stats.retried_tasks));
    md.push_str(&format!("- **Live Rate**: {:.2}%\n", stats.live_rate()));
    md.push_str(&format!(
        "- **Throughput**: {:.1} URLs/sec\n\n",
        stats.throughput()
    ));

    // Outcome breakdown
    md.push_str("## Outcome Breakdown\n\n");
    md.push_str("| Outcome | Count |\n");
    md.push_str("|---------|-------|\n");
    for kind in OutcomeKind::all() {
        md.push_str(&format!("| {} | {} |\n", kind.token(), stats.count(kind)));
    }
    md.push('\n');

    // Status codes
    if !stats.status_distribution.is_empty() {
        md.push_str("## Status Code Distribution\n\n");
        md.push_str("| Status | Count |\n");
        md.push_str("|--------|-------|\n");
        for (code, count) in &stats.status_distribution {
            md.push_str(&format!("| {} | {} |\n", code, count));
        }
        md.push('\n');
    }

    md.push_str("---\n\n");
    md.push_str(&format!(
        "*Generated by livehttpx {}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    md
}
