use std::io::Write;

use anyhow::Result;

use crate::{
    cli::OutputOptions,
    scan::{ScanReport, SkippedRepo},
};

pub fn format_count(count: usize) -> String {
    match count {
        0 => "no open pull requests".to_string(),
        1 => "1 open pull request".to_string(),
        n => format!("{n} open pull requests"),
    }
}

/// Writes each repository header and count, followed by one line per pull
/// request unless `count_only` is set.
pub fn render<W: Write>(report: &ScanReport, count_only: bool, writer: &mut W) -> Result<()> {
    for result in &report.results {
        writeln!(writer, "=== {} ===", result.repo)?;
        writeln!(writer, "  {}", format_count(result.count))?;

        if count_only {
            continue;
        }

        for pr in result.pulls.iter().flatten() {
            writeln!(writer, "  {} - {}", pr.url, pr.title)?;
        }
    }
    Ok(())
}

/// One diagnostic line per repository that could not be evaluated.
pub fn render_skipped<W: Write>(skipped: &[SkippedRepo], writer: &mut W) -> Result<()> {
    for entry in skipped {
        writeln!(
            writer,
            "Unable to fetch pull requests for {}: {}",
            entry.repo, entry.reason
        )?;
    }
    Ok(())
}

/// Writes the report to `out`. Skipped repositories are reported on `diag`
/// only in verbose mode.
pub fn render_report<W: Write, D: Write>(
    report: &ScanReport,
    output: &OutputOptions,
    out: &mut W,
    diag: &mut D,
) -> Result<()> {
    if output.verbose {
        render_skipped(&report.skipped, diag)?;
    }
    render(report, output.count_only, out)
}
