//! Built-in scenario checks.
//!
//! Each check issues its requests through [`ProbeClient`] and hands the
//! responses to a pure classifier, so the classification rules are testable
//! without a running service.

use async_trait::async_trait;
use serde_json::{json, Value};

use opsdrill_core::evidence::{structured_detail, truncate, EVIDENCE_TEXT_LIMIT};

use crate::error::HarnessError;
use crate::probe::{ProbeClient, ProbeResponse, DIAGNOSTICS_PATH, PLAN_PATH};

use super::{CheckOutcome, ScenarioCheck};

/// Plan statuses that count as a completed request.
pub const COMPLETED_PLAN_STATUSES: &[&str] = &["done", "clarifying"];

/// Runtime flags the diagnostics scenario's overlay must switch on.
pub const DIAGNOSTICS_EXPECTED_FLAGS: &[(&str, bool)] = &[("tool_fault_injection", true)];

/// Fixed request body used by every plan-issuing check.
pub fn plan_payload() -> Value {
    json!({
        "message": "Plan a two-day trip from Lisbon to Porto by train",
        "constraints": {
            "budget": "moderate",
            "travelers": 2,
        },
    })
}

/// The closed set of checks used by the built-in scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinCheck {
    /// `POST /plan` returns 200 with a completed status.
    PlanCompletes,
    /// An injected upstream fault surfaces as a structured 4xx.
    ControlledFault,
    /// Strict mode without credentials fails with a structured detail.
    StrictFailFast,
    /// Back-to-back requests trip the limiter without any 5xx.
    RateLimitBurst { attempts: u32 },
    /// `GET /diagnostics` reports each expected runtime flag with the
    /// expected value.
    DiagnosticsFlags {
        expect: &'static [(&'static str, bool)],
    },
}

#[async_trait]
impl ScenarioCheck for BuiltinCheck {
    async fn check(&self, probe: &ProbeClient) -> Result<CheckOutcome, HarnessError> {
        match *self {
            Self::PlanCompletes => {
                let response = probe.post_json(PLAN_PATH, &plan_payload()).await?;
                Ok(classify_plan_completes(&response))
            }
            Self::ControlledFault => {
                let response = probe.post_json(PLAN_PATH, &plan_payload()).await?;
                Ok(classify_controlled_fault(&response))
            }
            Self::StrictFailFast => {
                let response = probe.post_json(PLAN_PATH, &plan_payload()).await?;
                Ok(classify_strict_fail_fast(&response))
            }
            Self::RateLimitBurst { attempts } => {
                let payload = plan_payload();
                let mut responses = Vec::with_capacity(attempts as usize);
                for _ in 0..attempts {
                    responses.push(probe.post_json(PLAN_PATH, &payload).await?);
                }
                Ok(classify_rate_limit_burst(&responses))
            }
            Self::DiagnosticsFlags { expect } => {
                let response = probe.get(DIAGNOSTICS_PATH).await?;
                Ok(classify_diagnostics(&response, expect))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Classifiers
// ---------------------------------------------------------------------------

pub fn classify_plan_completes(response: &ProbeResponse) -> CheckOutcome {
    let evidence = response.evidence();
    if response.status != 200 {
        return CheckOutcome::fail(format!("expected 200, got {}", response.status), evidence);
    }

    let status = response
        .body
        .as_ref()
        .and_then(|body| body.get("status"))
        .and_then(Value::as_str);

    match status {
        Some(s) if COMPLETED_PLAN_STATUSES.contains(&s) => {
            CheckOutcome::pass(format!("plan completed with status '{s}'"), evidence)
        }
        Some(s) => CheckOutcome::fail(format!("unexpected plan status '{s}'"), evidence),
        None => CheckOutcome::fail("response carries no plan status", evidence),
    }
}

/// A fault must come back as a client error with a structured detail.
pub fn classify_controlled_fault(response: &ProbeResponse) -> CheckOutcome {
    let evidence = response.evidence();
    if response.is_server_error() {
        return CheckOutcome::fail(
            format!("fault leaked as server error {}", response.status),
            evidence,
        );
    }
    if !response.is_client_error() {
        return CheckOutcome::fail(
            format!("expected a controlled 4xx, got {}", response.status),
            evidence,
        );
    }

    match response.body.as_ref() {
        None => CheckOutcome::fail(
            format!("{} response body is not JSON", response.status),
            evidence,
        ),
        Some(body) => match structured_detail(body) {
            Some(detail) => CheckOutcome::pass(
                format!("controlled {} with detail: {detail}", response.status),
                evidence,
            ),
            None => CheckOutcome::fail(
                format!("{} response has no detail field", response.status),
                evidence,
            ),
        },
    }
}

/// Strict mode may answer 4xx or 5xx, but the detail must be present.
pub fn classify_strict_fail_fast(response: &ProbeResponse) -> CheckOutcome {
    let evidence = response.evidence();
    if response.status < 400 {
        return CheckOutcome::fail(
            format!("expected a failure without credentials, got {}", response.status),
            evidence,
        );
    }

    match response.body.as_ref().and_then(structured_detail) {
        Some(detail) => CheckOutcome::pass(
            format!("failed fast with {}: {detail}", response.status),
            evidence,
        ),
        None => CheckOutcome::fail(
            format!("{} response carries no structured detail", response.status),
            evidence,
        ),
    }
}

/// At least one 429 and no server errors across the burst.
pub fn classify_rate_limit_burst(responses: &[ProbeResponse]) -> CheckOutcome {
    let codes: Vec<u16> = responses.iter().map(|r| r.status).collect();
    let throttled = codes.iter().filter(|&&code| code == 429).count();
    let server_errors = codes.iter().filter(|&&code| code >= 500).count();

    let mut evidence = json!({
        "attempts": codes.len(),
        "status_codes": codes,
    });
    if let Some(first_throttled) = responses.iter().find(|r| r.status == 429) {
        evidence["first_throttled"] = first_throttled.evidence();
    }

    if server_errors > 0 {
        CheckOutcome::fail(
            format!("{server_errors} server error(s) during burst"),
            evidence,
        )
    } else if throttled == 0 {
        CheckOutcome::fail(
            format!("no 429 across {} attempts", responses.len()),
            evidence,
        )
    } else {
        CheckOutcome::pass(
            format!("{throttled} of {} attempts throttled", responses.len()),
            evidence,
        )
    }
}

/// The instance must report every flag in `expected` with that value, which
/// shows the scenario overlay actually reached it.
pub fn classify_diagnostics(response: &ProbeResponse, expected: &[(&str, bool)]) -> CheckOutcome {
    let flags = response
        .body
        .as_ref()
        .and_then(|body| body.get("runtime_flags"))
        .and_then(Value::as_object);

    let mut evidence = response.evidence();
    if let Some(flags) = flags {
        let observed: serde_json::Map<String, Value> = expected
            .iter()
            .map(|(name, _)| (name.to_string(), flag_evidence(flags.get(*name))))
            .collect();
        evidence["runtime_flags"] = Value::Object(observed);
    }

    if response.status != 200 {
        return CheckOutcome::fail(format!("expected 200, got {}", response.status), evidence);
    }
    let Some(flags) = flags else {
        return CheckOutcome::fail("diagnostics carry no runtime_flags object", evidence);
    };

    let mismatched: Vec<String> = expected
        .iter()
        .filter(|(name, want)| flags.get(*name).and_then(Value::as_bool) != Some(*want))
        .map(|(name, want)| match flags.get(*name) {
            None => format!("{name} missing (expected {want})"),
            Some(actual) => format!("{name}={} (expected {want})", flag_text(actual)),
        })
        .collect();

    if mismatched.is_empty() {
        CheckOutcome::pass(
            format!("{} runtime flag(s) match the overlay", expected.len()),
            evidence,
        )
    } else {
        CheckOutcome::fail(
            format!("runtime flags do not match the overlay: {}", mismatched.join(", ")),
            evidence,
        )
    }
}

fn flag_evidence(value: Option<&Value>) -> Value {
    match value {
        None => Value::Null,
        Some(Value::Bool(flag)) => Value::Bool(*flag),
        Some(other) => Value::String(flag_text(other)),
    }
}

fn flag_text(value: &Value) -> String {
    let raw = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    truncate(&raw, EVIDENCE_TEXT_LIMIT)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
