//! Drill report model.
//!
//! Reports are built fresh per invocation and never persisted here; the
//! CLI decides where (and whether) to write them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::CoreError;
use crate::evaluation::{evaluate, EvaluationReport, ObjectiveResult};
use crate::metrics::{DerivedMetrics, MetricsSnapshot};
use crate::objectives::ObjectivesConfig;
use crate::profile::resolve;

// ---------------------------------------------------------------------------
// Scenario sweep
// ---------------------------------------------------------------------------

/// Outcome of one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrillRow {
    pub name: String,
    pub description: String,
    pub passed: bool,
    pub detail: String,
    pub elapsed_ms: u64,
    pub evidence: Value,
}

/// Aggregate result of a scenario sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrillReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    /// `true` when no row failed.
    pub passed: bool,
    pub scenarios: Vec<DrillRow>,
    pub failed: Vec<DrillRow>,
}

impl DrillReport {
    /// Aggregate rows in the order given.
    pub fn from_rows(rows: Vec<DrillRow>) -> Self {
        let failed: Vec<DrillRow> = rows.iter().filter(|row| !row.passed).cloned().collect();
        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            passed: failed.is_empty(),
            scenarios: rows,
            failed,
        }
    }
}

// ---------------------------------------------------------------------------
// Load / SLO mode
// ---------------------------------------------------------------------------

/// Metadata about the load generated before the snapshot was taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SloRunMeta {
    pub base_url: String,
    pub requests: u32,
    /// Status code (or `"error"` for transport failures) to count.
    pub status_counts: BTreeMap<String, u64>,
    pub elapsed_ms: u64,
    pub profile: String,
}

/// Aggregate result of a load/SLO run or an offline evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SloReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub passed: bool,
    pub profile: String,
    pub derived: DerivedMetrics,
    pub objectives: Vec<ObjectiveResult>,
    pub failed: Vec<ObjectiveResult>,
    /// Absent for offline evaluations of a saved snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<SloRunMeta>,
}

impl SloReport {
    pub fn new(profile: impl Into<String>, evaluation: EvaluationReport, run: Option<SloRunMeta>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            passed: evaluation.passed,
            profile: profile.into(),
            derived: evaluation.metrics,
            objectives: evaluation.results,
            failed: evaluation.failed,
            run,
        }
    }

    /// Resolve `requested` against `config`, then evaluate `snapshot`.
    /// The report carries no run metadata.
    pub fn from_snapshot(
        snapshot: &MetricsSnapshot,
        config: &ObjectivesConfig,
        requested: &str,
    ) -> Result<Self, CoreError> {
        let resolved = resolve(snapshot, config, requested)?;
        let evaluation = evaluate(snapshot, &resolved.objectives);
        Ok(Self::new(resolved.name, evaluation, None))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
