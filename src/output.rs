//! CLI output formatting for batch runs and content checks.
//!
//! # Output Format
//!
//! ## Batch run
//!
//! ```text
//! Processing 3 rows...
//! Written
//! 001 presenters/jane-doe.md
//! 002 presenters/joe-bloggs.md
//!
//! Failed
//! 001 row 2 (validation)
//!     Error: validation error: field `Name` must be a string
//!     Record:
//!         {
//!           "Name": 42
//!         }
//!
//! Processed 3 rows: 2 written, 0 skipped, 1 failed
//! ```
//!
//! Written paths are shown relative to the content root when possible.
//!
//! ## Check
//!
//! ```text
//! organizer  _organizers   4 files
//! presenter  presenters   31 files
//! schedule   schedule     58 files
//!
//! Invalid
//! 001 schedule/talks/bad.md (validation)
//!     Error: `category` must be one of ...
//!
//! Checked 93 files, 1 invalid
//! ```
//!
//! # Architecture
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that does the writing. Format
//! functions are pure.

use crate::check::CheckReport;
use crate::pipeline::BatchReport;
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn relative_to<'a>(path: &'a Path, base: Option<&Path>) -> &'a Path {
    base.and_then(|base| path.strip_prefix(base).ok())
        .unwrap_or(path)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

// ============================================================================
// Batch run
// ============================================================================

pub fn format_processing_header(total: usize) -> String {
    format!("Processing {total} rows...")
}

/// Format the summary of one batch run.
///
/// `content_root` shortens written paths; pass `None` in emit mode.
pub fn format_batch_report(report: &BatchReport, content_root: Option<&Path>) -> Vec<String> {
    let mut lines = Vec::new();

    if !report.written.is_empty() {
        lines.push("Written".to_string());
        for (i, path) in report.written.iter().enumerate() {
            lines.push(format!(
                "{} {}",
                format_index(i + 1),
                relative_to(path, content_root).display()
            ));
        }
        lines.push(String::new());
    }

    if !report.failures.is_empty() {
        lines.push("Failed".to_string());
        for (i, failure) in report.failures.iter().enumerate() {
            lines.push(format!(
                "{} row {} ({})",
                format_index(i + 1),
                failure.index,
                failure.error.kind()
            ));
            lines.push(format!("    Error: {}", failure.error));
            lines.push("    Record:".to_string());
            lines.extend(failure.record.lines().map(|l| format!("        {l}")));
        }
        lines.push(String::new());
    }

    let delivered = if report.emitted > 0 {
        format!("{} emitted", report.emitted)
    } else {
        format!("{} written", report.written.len())
    };
    lines.push(format!(
        "Processed {}: {}, {} skipped, {} failed",
        plural(report.total, "row", "rows"),
        delivered,
        report.skipped,
        report.failures.len()
    ));
    lines
}

/// Print a batch summary. In emit mode stdout carries the documents, so the
/// summary goes to stderr instead.
pub fn print_batch_report(report: &BatchReport, content_root: Option<&Path>) {
    for line in format_batch_report(report, content_root) {
        if content_root.is_some() {
            println!("{}", line);
        } else {
            eprintln!("{}", line);
        }
    }
}

// ============================================================================
// Check
// ============================================================================

pub fn format_check_report(report: &CheckReport, content_root: &Path) -> Vec<String> {
    let mut lines = Vec::new();

    for summary in &report.kinds {
        lines.push(format!(
            "{:<10} {:<12} {}",
            summary.kind.to_string(),
            relative_to(&summary.dir, Some(content_root)).display().to_string(),
            plural(summary.checked, "file", "files")
        ));
    }

    if !report.failures.is_empty() {
        lines.push(String::new());
        lines.push("Invalid".to_string());
        for (i, failure) in report.failures.iter().enumerate() {
            lines.push(format!(
                "{} {} ({})",
                format_index(i + 1),
                relative_to(&failure.path, Some(content_root)).display(),
                failure.error.kind()
            ));
            lines.push(format!("    Error: {}", failure.error));
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "Checked {}, {} invalid",
        plural(report.checked(), "file", "files"),
        report.failures.len()
    ));
    lines
}

pub fn print_check_report(report: &CheckReport, content_root: &Path) {
    for line in format_check_report(report, content_root) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
