//! Scenario registry.
//!
//! A scenario is a name, an environment overlay, and a check run against a
//! freshly health-gated instance. The built-in table is closed and static;
//! callers (and tests) may still build their own [`Scenario`]s around any
//! [`ScenarioCheck`] implementation.

pub mod checks;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::env::{
    overlay, EnvOverlay, ENV_ENABLE_DIAGNOSTICS, ENV_ENABLE_TOOL_FAULT_INJECTION,
    ENV_RATE_LIMIT_MAX, ENV_RATE_LIMIT_WINDOW, ENV_ROUTING_PROVIDER, ENV_STRICT_EXTERNAL_DATA,
    ENV_TOOL_FAULT_INJECTION, ENV_TOOL_FAULT_RATE, PROVIDER_LIVE,
};
use crate::error::HarnessError;
use crate::probe::ProbeClient;

use self::checks::{BuiltinCheck, DIAGNOSTICS_EXPECTED_FLAGS};

pub const SCENARIO_BASELINE_PLAN: &str = "baseline_plan";
pub const SCENARIO_TOOL_TIMEOUT_FAULT: &str = "tool_timeout_fault";
pub const SCENARIO_TOOL_RATE_LIMIT_FAULT: &str = "tool_rate_limit_fault";
pub const SCENARIO_STRICT_WITHOUT_CREDENTIALS: &str = "strict_external_data_without_credentials";
pub const SCENARIO_RATE_LIMIT_BURST: &str = "request_rate_limit_burst";
pub const SCENARIO_DIAGNOSTICS_FLAGS: &str = "diagnostics_runtime_flags";

/// Requests fired back-to-back by the burst scenario.
pub const BURST_ATTEMPTS: u32 = 6;

// ---------------------------------------------------------------------------
// Check capability
// ---------------------------------------------------------------------------

/// Result of one scenario check.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub passed: bool,
    /// Human-readable one-line summary.
    pub detail: String,
    /// Compact response snapshot for the report.
    pub evidence: Value,
}

impl CheckOutcome {
    pub fn pass(detail: impl Into<String>, evidence: Value) -> Self {
        Self {
            passed: true,
            detail: detail.into(),
            evidence,
        }
    }

    pub fn fail(detail: impl Into<String>, evidence: Value) -> Self {
        Self {
            passed: false,
            detail: detail.into(),
            evidence,
        }
    }
}

/// Probes a running instance and classifies the outcome.
///
/// Returning `Err` (or panicking) marks the scenario failed with a
/// `ScenarioCheckError` detail; it never aborts the sweep.
#[async_trait]
pub trait ScenarioCheck: Send + Sync {
    async fn check(&self, probe: &ProbeClient) -> Result<CheckOutcome, HarnessError>;
}

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

/// One named fault or behavior condition.
#[derive(Clone)]
pub struct Scenario {
    pub name: String,
    pub description: String,
    pub env_overrides: EnvOverlay,
    pub check: Arc<dyn ScenarioCheck>,
}

impl Scenario {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        check: impl ScenarioCheck + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            env_overrides: EnvOverlay::new(),
            check: Arc::new(check),
        }
    }

    pub fn with_env(mut self, overrides: EnvOverlay) -> Self {
        self.env_overrides.extend(overrides);
        self
    }

    /// Serializable view for listings (the check itself is opaque).
    pub fn summary(&self) -> ScenarioSummary<'_> {
        ScenarioSummary {
            name: &self.name,
            description: &self.description,
            env_overrides: &self.env_overrides,
        }
    }
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("env_overrides", &self.env_overrides)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
pub struct ScenarioSummary<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub env_overrides: &'a EnvOverlay,
}

// ---------------------------------------------------------------------------
// Built-in table
// ---------------------------------------------------------------------------

/// The built-in scenarios, in declaration order.
pub fn builtin_scenarios() -> Vec<Scenario> {
    vec![
        Scenario::new(
            SCENARIO_BASELINE_PLAN,
            "Default configuration completes a plan request",
            BuiltinCheck::PlanCompletes,
        ),
        Scenario::new(
            SCENARIO_TOOL_TIMEOUT_FAULT,
            "Injected tool timeouts surface as a structured 4xx, never a 5xx",
            BuiltinCheck::ControlledFault,
        )
        .with_env(overlay([
            (ENV_ENABLE_TOOL_FAULT_INJECTION, "true"),
            (ENV_TOOL_FAULT_INJECTION, "timeout"),
            (ENV_TOOL_FAULT_RATE, "1.0"),
        ])),
        Scenario::new(
            SCENARIO_TOOL_RATE_LIMIT_FAULT,
            "Injected upstream rate limits surface as a structured 4xx, never a 5xx",
            BuiltinCheck::ControlledFault,
        )
        .with_env(overlay([
            (ENV_ENABLE_TOOL_FAULT_INJECTION, "true"),
            (ENV_TOOL_FAULT_INJECTION, "rate_limit"),
            (ENV_TOOL_FAULT_RATE, "1.0"),
        ])),
        Scenario::new(
            SCENARIO_STRICT_WITHOUT_CREDENTIALS,
            "Strict external data without credentials fails fast with a detail",
            BuiltinCheck::StrictFailFast,
        )
        .with_env(overlay([
            (ENV_STRICT_EXTERNAL_DATA, "true"),
            (ENV_ROUTING_PROVIDER, PROVIDER_LIVE),
        ])),
        Scenario::new(
            SCENARIO_RATE_LIMIT_BURST,
            "A burst against a tight request limiter yields 429s and no 5xx",
            BuiltinCheck::RateLimitBurst {
                attempts: BURST_ATTEMPTS,
            },
        )
        .with_env(overlay([
            (ENV_RATE_LIMIT_MAX, "2"),
            (ENV_RATE_LIMIT_WINDOW, "60"),
        ])),
        Scenario::new(
            SCENARIO_DIAGNOSTICS_FLAGS,
            "Diagnostics expose runtime feature flags when enabled",
            BuiltinCheck::DiagnosticsFlags {
                expect: DIAGNOSTICS_EXPECTED_FLAGS,
            },
        )
        .with_env(overlay([
            (ENV_ENABLE_DIAGNOSTICS, "true"),
            (ENV_ENABLE_TOOL_FAULT_INJECTION, "true"),
        ])),
    ]
}

/// Reject filter names that match no scenario.
pub fn validate_filter(scenarios: &[Scenario], names: &[String]) -> Result<(), HarnessError> {
    let unknown: Vec<&str> = names
        .iter()
        .filter(|name| !scenarios.iter().any(|s| &s.name == *name))
        .map(String::as_str)
        .collect();

    if unknown.is_empty() {
        Ok(())
    } else {
        let known: Vec<&str> = scenarios.iter().map(|s| s.name.as_str()).collect();
        Err(HarnessError::Config(format!(
            "unknown scenario(s): {}. Known scenarios: {}",
            unknown.join(", "),
            known.join(", ")
        )))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
