//! CLI output formatting for every command.
//!
//! # Information-First Display
//!
//! Output is **information-centric, not file-centric**. Every job and
//! candidate leads with its positional index and title; filesystem paths are
//! secondary context on indented `Source:` lines.
//!
//! # Output Format
//!
//! ## Check
//!
//! ```text
//! REJECT: PSNR, color delta out of tolerance
//!     PSNR: 28.13 dB (min 30.00)
//!     MSE: 100.00 (max 200.00)
//!     Color delta: 10.00 (max 6.00)
//!     Compared: 16 pixels at 4x4
//! ```
//!
//! ## Scan
//!
//! ```text
//! Jobs
//! 001 red sneaker (2 candidates)
//!     Source: 010-red-sneaker/
//!     Original: original.jpg
//!     Mask: mask.png
//!     001 studio
//!         Source: 001-studio.png
//!     002 beach
//!         Source: 002-beach.png
//!
//! Config
//!     config.toml
//! ```
//!
//! ## Batch
//!
//! ```text
//! red sneaker (2 candidates)
//!     001 studio
//!         Source: 010-red-sneaker/001-studio.png
//!         rejected: PSNR (verified)
//!     002 beach
//!         Source: 010-red-sneaker/002-beach.png
//!         accepted: PSNR 34.15 dB, MSE 25.00, color delta 5.00 (cached)
//!
//! Selected
//!     red sneaker → 010-red-sneaker/002-beach.png
//!
//! 1 of 1 jobs accepted
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::batch::{BatchEvent, BatchReport, CandidateReport, CandidateResult};
use crate::config::ConfigSource;
use crate::fidelity::{FidelityVerdict, Outcome, Thresholds};
use crate::scan::BatchManifest;
use crate::verify::VerificationReport;
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// ```text
/// 001 red sneaker (2 candidates)
/// red sneaker (2 candidates)
/// ```
fn job_header(index: Option<usize>, title: &str, candidates: usize) -> String {
    let noun = if candidates == 1 {
        "candidate"
    } else {
        "candidates"
    };
    match index {
        Some(i) => format!("{} {} ({} {})", format_index(i), title, candidates, noun),
        None => format!("{} ({} {})", title, candidates, noun),
    }
}

/// Titled candidates show the title, untitled ones the filename in parens.
fn candidate_line(index: usize, title: &str, filename: &str) -> String {
    if title.is_empty() {
        format!("{} ({})", format_index(index), filename)
    } else {
        format!("{} {}", format_index(index), title)
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// One-line reason for a verdict.
fn verdict_summary(verdict: &FidelityVerdict) -> String {
    match &verdict.outcome {
        Outcome::Accepted => format!(
            "PSNR {:.2} dB, MSE {:.2}, color delta {:.2}",
            verdict.metrics.psnr, verdict.metrics.mse, verdict.metrics.avg_color_delta
        ),
        Outcome::EmptyMask => "mask selects no pixels".to_string(),
        Outcome::OutOfTolerance { failed } => failed
            .iter()
            .map(|m| m.to_string())
            .collect::<Vec<_>>()
            .join(", "),
    }
}

// ============================================================================
// check
// ============================================================================

/// Format a single verification with its thresholds.
pub fn format_verdict(report: &VerificationReport, thresholds: &Thresholds) -> Vec<String> {
    let verdict = &report.verdict;
    let header = match &verdict.outcome {
        Outcome::Accepted => "ACCEPT".to_string(),
        Outcome::EmptyMask => "REJECT: mask selects no pixels".to_string(),
        Outcome::OutOfTolerance { .. } => {
            format!("REJECT: {} out of tolerance", verdict_summary(verdict))
        }
    };

    let m = &verdict.metrics;
    vec![
        header,
        format!("    PSNR: {:.2} dB (min {:.2})", m.psnr, thresholds.min_psnr),
        format!("    MSE: {:.2} (max {:.2})", m.mse, thresholds.max_mse),
        format!(
            "    Color delta: {:.2} (max {:.2})",
            m.avg_color_delta, thresholds.max_color_delta
        ),
        format!(
            "    Compared: {} pixels at {}",
            verdict.compared_pixels, report.working
        ),
    ]
}

pub fn print_verdict(report: &VerificationReport, thresholds: &Thresholds) {
    for line in format_verdict(report, thresholds) {
        println!("{}", line);
    }
}

// ============================================================================
// scan
// ============================================================================

/// Format discovered jobs and their candidates in processing order.
/// `config_source` is the file layer the manifest's config was built from;
/// files under `source_root` are shown relative to it.
pub fn format_scan_output(
    manifest: &BatchManifest,
    source_root: &Path,
    config_source: &ConfigSource,
) -> Vec<String> {
    let mut lines = vec!["Jobs".to_string()];

    if manifest.jobs.is_empty() {
        lines.push(format!("{}(none)", indent(1)));
    }

    for (i, job) in manifest.jobs.iter().enumerate() {
        lines.push(job_header(Some(i + 1), &job.title, job.candidates.len()));
        lines.push(format!("{}Source: {}/", indent(1), job.path));
        lines.push(format!("{}Original: {}", indent(1), file_name(&job.original)));
        lines.push(format!("{}Mask: {}", indent(1), file_name(&job.mask)));
        for (j, candidate) in job.candidates.iter().enumerate() {
            lines.push(format!(
                "{}{}",
                indent(1),
                candidate_line(j + 1, &candidate.title, &candidate.filename)
            ));
            lines.push(format!("{}Source: {}", indent(2), candidate.filename));
        }
    }

    lines.push(String::new());
    lines.push("Config".to_string());
    match config_source {
        ConfigSource::File(path) => {
            let shown = path.strip_prefix(source_root).unwrap_or(path);
            lines.push(format!("{}{}", indent(1), shown.display()));
        }
        ConfigSource::Stock => lines.push(format!("{}(defaults)", indent(1))),
    }

    lines
}

pub fn print_scan_output(
    manifest: &BatchManifest,
    source_root: &Path,
    config_source: &ConfigSource,
) {
    for line in format_scan_output(manifest, source_root, config_source) {
        println!("{}", line);
    }
}

// ============================================================================
// batch
// ============================================================================

fn candidate_status(candidate: &CandidateReport) -> String {
    match &candidate.result {
        CandidateResult::Verified { cached, report } => {
            let how = if *cached { "cached" } else { "verified" };
            let what = if report.verdict.accepted {
                "accepted"
            } else {
                "rejected"
            };
            format!("{}: {} ({})", what, verdict_summary(&report.verdict), how)
        }
        CandidateResult::Failed { error } => format!("failed: {}", error),
    }
}

/// Format a single batch progress event as display lines.
pub fn format_batch_event(event: &BatchEvent) -> Vec<String> {
    match event {
        BatchEvent::JobStarted {
            title,
            candidate_count,
        } => vec![job_header(None, title, *candidate_count)],
        BatchEvent::CandidateChecked { index, candidate } => vec![
            format!(
                "{}{}",
                indent(1),
                candidate_line(*index, &candidate.title, file_name(&candidate.source_path))
            ),
            format!("{}Source: {}", indent(2), candidate.source_path),
            format!("{}{}", indent(2), candidate_status(candidate)),
        ],
    }
}

/// Format the per-job selection and the overall tally.
pub fn format_batch_summary(report: &BatchReport) -> Vec<String> {
    let mut lines = vec![String::new(), "Selected".to_string()];
    for job in &report.jobs {
        let selected = job.selected.as_deref().unwrap_or("none");
        lines.push(format!("{}{} \u{2192} {}", indent(1), job.title, selected));
    }
    lines.push(String::new());
    lines.push(format!(
        "{} of {} jobs accepted",
        report.accepted_jobs(),
        report.jobs.len()
    ));
    lines
}

pub fn print_batch_summary(report: &BatchReport) {
    for line in format_batch_summary(report) {
        println!("{}", line);
    }
}
