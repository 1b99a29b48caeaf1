//! Run-level CLI output with colors.
//!
//! Colors auto-disable when stderr is not a TTY.

use crate::pipeline::{FileReport, FileStatus};
use comfy_table::{Table, presets::UTF8_FULL_CONDENSED};
use owo_colors::OwoColorize;
use std::fmt::Display;
use std::path::Path;

/// Check if stderr supports colors (TTY detection)
pub fn use_colors() -> bool {
    supports_color::on(supports_color::Stream::Stderr).is_some()
}

// =============================================================================
// Color Helpers
// =============================================================================

/// Format a run-level error
pub fn error(msg: impl Display) {
    if use_colors() {
        eprintln!("{} {}", "error:".red().bold(), msg);
    } else {
        eprintln!("error: {}", msg);
    }
}

/// Announce the next file
pub fn checking(path: &Path) {
    if use_colors() {
        eprintln!("{} {}", "Checking:".yellow().bold(), path.display());
    } else {
        eprintln!("Checking: {}", path.display());
    }
}

/// Final verdict of one file
pub fn verdict(clean: bool) {
    match (clean, use_colors()) {
        (true, true) => eprintln!("{}", "File has passed all checks".green()),
        (true, false) => eprintln!("File has passed all checks"),
        (false, true) => eprintln!("{}", "File did not pass all checks".red()),
        (false, false) => eprintln!("File did not pass all checks"),
    }
}

/// A file skipped for its suffix
pub fn wrong_suffix(path: &Path, expected: &str) {
    error(format!(
        "{} has wrong suffix. Use \"{}\" for this simulation round",
        path.display(),
        expected
    ));
}

/// A clean file moved or copied
pub fn transferred(action: &str, to: &Path) {
    if use_colors() {
        eprintln!("{} file to {}", action, to.display().cyan());
    } else {
        eprintln!("{} file to {}", action, to.display());
    }
}

/// The run stopped early
pub fn stopped(reason: &str) {
    if use_colors() {
        eprintln!("{} {}", "Stopped:".yellow().bold(), reason);
    } else {
        eprintln!("Stopped: {}", reason);
    }
}

// =============================================================================
// Summary
// =============================================================================

fn status_cell(status: FileStatus) -> String {
    let text = status.as_ref();
    if !use_colors() {
        return text.to_string();
    }
    match status {
        FileStatus::Clean => text.green().to_string(),
        FileStatus::Dirty => text.yellow().to_string(),
        FileStatus::Rejected | FileStatus::Failed => text.red().to_string(),
    }
}

/// Print one row per processed file
pub fn summary(reports: &[FileReport]) {
    if reports.is_empty() {
        eprintln!("No files checked");
        return;
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec![
        "file", "status", "info", "warnings", "errors", "criticals", "fixed",
    ]);
    for report in reports {
        table.add_row(vec![
            report.path.display().to_string(),
            status_cell(report.status),
            report.counts.info.to_string(),
            report.counts.warnings.to_string(),
            report.counts.errors.to_string(),
            report.counts.criticals.to_string(),
            report.fixed.to_string(),
        ]);
    }
    eprintln!();
    eprintln!("{table}");
}
