//! Optional span hooks around each scenario.
//!
//! The runner reports the start and end of every scenario to a
//! [`SpanSink`]. The default sink writes structured `tracing` events;
//! [`NoopSpanSink`] discards them.

use serde_json::Value;

/// Receives scenario span boundaries. Implementations must not fail.
pub trait SpanSink: Send + Sync {
    fn span_start(&self, name: &str, attributes: &Value);

    fn span_end(&self, name: &str, passed: bool, elapsed_ms: u64);
}

/// Emits span boundaries as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSpanSink;

impl SpanSink for TracingSpanSink {
    fn span_start(&self, name: &str, attributes: &Value) {
        tracing::info!(scenario = %name, attributes = %attributes, "Scenario started");
    }

    fn span_end(&self, name: &str, passed: bool, elapsed_ms: u64) {
        if passed {
            tracing::info!(scenario = %name, elapsed_ms, "Scenario passed");
        } else {
            tracing::warn!(scenario = %name, elapsed_ms, "Scenario failed");
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSpanSink;

impl SpanSink for NoopSpanSink {
    fn span_start(&self, _name: &str, _attributes: &Value) {}

    fn span_end(&self, _name: &str, _passed: bool, _elapsed_ms: u64) {}
}
