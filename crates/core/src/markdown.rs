//! Markdown summaries of drill and SLO reports.

use std::fmt::Write;

use crate::evidence::truncate;
use crate::report::{DrillReport, SloReport};

/// Characters of row detail shown in summary tables.
const DETAIL_PREVIEW_CHARS: usize = 80;

fn verdict(passed: bool) -> &'static str {
    if passed {
        "PASS"
    } else {
        "FAIL"
    }
}

/// Table cells must not contain raw pipes or newlines.
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

/// Render a scenario sweep as a markdown summary.
pub fn render_drill_report(report: &DrillReport) -> String {
    let mut out = String::new();

    // Writing to a String cannot fail.
    let _ = writeln!(out, "# Scenario Drill: {}", verdict(report.passed));
    let _ = writeln!(out);
    let _ = writeln!(out, "Run: `{}`  ", report.run_id);
    let _ = writeln!(out, "Generated: {}", report.generated_at.to_rfc3339());
    let _ = writeln!(out);
    let _ = writeln!(out, "| Scenario | Result | Elapsed (ms) | Detail |");
    let _ = writeln!(out, "|----------|--------|--------------|--------|");

    for row in &report.scenarios {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} |",
            cell(&row.name),
            verdict(row.passed),
            row.elapsed_ms,
            cell(&truncate(&row.detail, DETAIL_PREVIEW_CHARS)),
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{} of {} scenarios failed.",
        report.failed.len(),
        report.scenarios.len()
    );
    out
}

/// Render an SLO evaluation as a markdown summary.
pub fn render_slo_report(report: &SloReport) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# SLO Evaluation: {}", verdict(report.passed));
    let _ = writeln!(out);
    let _ = writeln!(out, "Run: `{}`  ", report.run_id);
    let _ = writeln!(out, "Profile: `{}`  ", report.profile);
    let _ = writeln!(out, "Generated: {}", report.generated_at.to_rfc3339());
    let _ = writeln!(out);
    let _ = writeln!(out, "| Objective | Metric | Check | Actual | Result |");
    let _ = writeln!(out, "|-----------|--------|-------|--------|--------|");

    for result in &report.objectives {
        let _ = writeln!(
            out,
            "| {} | {} | {} {} | {} | {} |",
            cell(&result.name),
            cell(&result.metric),
            result.op.as_str(),
            result.target,
            result.actual,
            verdict(result.passed),
        );
    }

    if let Some(run) = &report.run {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{} requests against {} in {} ms.",
            run.requests, run.base_url, run.elapsed_ms
        );
        let counts: Vec<String> = run
            .status_counts
            .iter()
            .map(|(status, count)| format!("{status}: {count}"))
            .collect();
        let _ = writeln!(out, "Status codes: {}", counts.join(", "));
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
