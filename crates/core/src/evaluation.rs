//! Objective evaluation engine.
//!
//! Pure logic: the caller fetches the snapshot and resolves the profile,
//! this module only compares numbers.

use serde::{Deserialize, Serialize};

use crate::metrics::{DerivedMetrics, MetricsSnapshot};
use crate::objectives::{Objective, Operator};

/// Decimal places kept for `actual` values in reports.
const REPORT_PRECISION: i32 = 6;

/// Outcome of a single objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveResult {
    pub name: String,
    pub metric: String,
    pub op: Operator,
    pub target: f64,
    /// Rounded to six decimal places.
    pub actual: f64,
    pub passed: bool,
}

/// Aggregate verdict over an objective list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub passed: bool,
    pub metrics: DerivedMetrics,
    pub results: Vec<ObjectiveResult>,
    pub failed: Vec<ObjectiveResult>,
}

/// Evaluate every objective against the metrics derived from `snapshot`.
///
/// An objective naming an unknown metric is compared against `0.0` rather
/// than rejected. An empty objective list passes.
pub fn evaluate(snapshot: &MetricsSnapshot, objectives: &[Objective]) -> EvaluationReport {
    let metrics = DerivedMetrics::derive(snapshot);

    let results: Vec<ObjectiveResult> = objectives
        .iter()
        .map(|objective| {
            let actual = metrics.get(&objective.metric).unwrap_or(0.0);
            ObjectiveResult {
                name: objective.name.clone(),
                metric: objective.metric.clone(),
                op: objective.op,
                target: objective.target,
                actual: round_for_report(actual),
                passed: objective.op.apply(actual, objective.target),
            }
        })
        .collect();

    let failed: Vec<ObjectiveResult> = results.iter().filter(|r| !r.passed).cloned().collect();

    EvaluationReport {
        passed: failed.is_empty(),
        metrics,
        results,
        failed,
    }
}

/// Round to the fixed report precision so reports diff cleanly.
pub fn round_for_report(value: f64) -> f64 {
    let scale = 10f64.powi(REPORT_PRECISION);
    (value * scale).round() / scale
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
