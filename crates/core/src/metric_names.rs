//! Well-known metric key constants.
//!
//! Snapshot keys must match the field names the drilled service exposes on
//! `GET /metrics`. Derived keys are the names objectives reference in their
//! `metric` field.

// ---------------------------------------------------------------------------
// Raw snapshot keys
// ---------------------------------------------------------------------------

/// Fraction of requests that completed successfully (0.0-1.0).
pub const SNAPSHOT_SUCCESS_RATE: &str = "success_rate";

/// 95th percentile request latency in milliseconds.
pub const SNAPSHOT_P95_LATENCY_MS: &str = "p95_latency_ms";

/// Total number of requests served since startup.
pub const SNAPSHOT_TOTAL_REQUESTS: &str = "total_requests";

/// Per degrade level request counts, e.g. `{"L0": 50, "L3": 2}`.
pub const SNAPSHOT_DEGRADE_COUNTS: &str = "degrade_counts";

/// Per tool call counters, e.g. `{"geocode": {"count": 10, "error": 1}}`.
pub const SNAPSHOT_TOOL_CALLS: &str = "tool_calls";

/// Per tool call attempt counter inside a `tool_calls` entry.
pub const TOOL_CALL_COUNT: &str = "count";

/// Per tool call error counter inside a `tool_calls` entry.
pub const TOOL_CALL_ERROR: &str = "error";

/// Full-quality degrade level.
pub const DEGRADE_LEVEL_L0: &str = "L0";

/// Lowest-quality degrade level.
pub const DEGRADE_LEVEL_L3: &str = "L3";

// ---------------------------------------------------------------------------
// Derived metric keys
// ---------------------------------------------------------------------------

pub const METRIC_SUCCESS_RATE: &str = "success_rate";
pub const METRIC_P95_LATENCY_MS: &str = "p95_latency_ms";
pub const METRIC_L0_RATIO: &str = "l0_ratio";
pub const METRIC_L3_RATIO: &str = "l3_ratio";
pub const METRIC_TOOL_ERROR_RATE: &str = "tool_error_rate";

/// All derived metric keys, in report order.
pub const DERIVED_METRICS: &[&str] = &[
    METRIC_SUCCESS_RATE,
    METRIC_P95_LATENCY_MS,
    METRIC_L0_RATIO,
    METRIC_L3_RATIO,
    METRIC_TOOL_ERROR_RATE,
];
