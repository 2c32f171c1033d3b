//! Metrics snapshot model and the derived scalars computed from it.
//!
//! [`MetricsSnapshot`] wraps the loosely-typed JSON object served by the
//! drilled service. [`DerivedMetrics::derive`] reduces it to the five
//! scalars objectives are written against. Missing or non-numeric fields
//! count as `0.0`; numeric strings are accepted.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::metric_names::{
    DEGRADE_LEVEL_L0, DEGRADE_LEVEL_L3, METRIC_L0_RATIO, METRIC_L3_RATIO, METRIC_P95_LATENCY_MS,
    METRIC_SUCCESS_RATE, METRIC_TOOL_ERROR_RATE, SNAPSHOT_DEGRADE_COUNTS, SNAPSHOT_P95_LATENCY_MS,
    SNAPSHOT_SUCCESS_RATE, SNAPSHOT_TOOL_CALLS, SNAPSHOT_TOTAL_REQUESTS, TOOL_CALL_COUNT,
    TOOL_CALL_ERROR,
};

// ---------------------------------------------------------------------------
// MetricsSnapshot
// ---------------------------------------------------------------------------

/// Raw `/metrics` payload, kept as an opaque JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricsSnapshot(Map<String, Value>);

impl MetricsSnapshot {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Accept any JSON value, rejecting everything but an object.
    pub fn from_value(value: Value) -> Result<Self, CoreError> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(CoreError::MalformedMetricsSnapshot(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Top-level scalar, `0.0` when absent or non-numeric.
    pub fn scalar(&self, key: &str) -> f64 {
        self.get(key).and_then(as_number).unwrap_or(0.0)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// DerivedMetrics
// ---------------------------------------------------------------------------

/// The fixed set of scalars objectives are evaluated against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    pub success_rate: f64,
    pub p95_latency_ms: f64,
    pub l0_ratio: f64,
    pub l3_ratio: f64,
    pub tool_error_rate: f64,
}

impl DerivedMetrics {
    /// Compute every derived metric from a snapshot.
    pub fn derive(snapshot: &MetricsSnapshot) -> Self {
        Self {
            success_rate: snapshot.scalar(SNAPSHOT_SUCCESS_RATE),
            p95_latency_ms: snapshot.scalar(SNAPSHOT_P95_LATENCY_MS),
            l0_ratio: degrade_ratio(snapshot, DEGRADE_LEVEL_L0),
            l3_ratio: degrade_ratio(snapshot, DEGRADE_LEVEL_L3),
            tool_error_rate: tool_error_rate(snapshot),
        }
    }

    /// Look up a derived metric by its objective-facing name.
    pub fn get(&self, metric: &str) -> Option<f64> {
        match metric {
            METRIC_SUCCESS_RATE => Some(self.success_rate),
            METRIC_P95_LATENCY_MS => Some(self.p95_latency_ms),
            METRIC_L0_RATIO => Some(self.l0_ratio),
            METRIC_L3_RATIO => Some(self.l3_ratio),
            METRIC_TOOL_ERROR_RATE => Some(self.tool_error_rate),
            _ => None,
        }
    }
}

/// `degrade_counts[level] / max(1, total_requests)`.
pub fn degrade_ratio(snapshot: &MetricsSnapshot, level: &str) -> f64 {
    let count = snapshot
        .get(SNAPSHOT_DEGRADE_COUNTS)
        .and_then(|counts| counts.get(level))
        .and_then(as_number)
        .unwrap_or(0.0);
    let total = snapshot.scalar(SNAPSHOT_TOTAL_REQUESTS).max(1.0);
    count / total
}

/// Summed tool errors over summed tool calls; `0.0` with no recorded calls.
pub fn tool_error_rate(snapshot: &MetricsSnapshot) -> f64 {
    let Some(Value::Object(tools)) = snapshot.get(SNAPSHOT_TOOL_CALLS) else {
        return 0.0;
    };

    let (calls, errors) = tools.values().fold((0.0, 0.0), |(calls, errors), entry| {
        let count = entry.get(TOOL_CALL_COUNT).and_then(as_number).unwrap_or(0.0);
        let error = entry.get(TOOL_CALL_ERROR).and_then(as_number).unwrap_or(0.0);
        (calls + count, errors + error)
    });

    if calls <= 0.0 {
        0.0
    } else {
        errors / calls
    }
}

/// Lenient numeric read: JSON numbers and numeric strings.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
