//! Drill runner: scenario sweeps and load/SLO runs.
//!
//! Every scenario gets its own instance on its own port. Failures local to
//! one scenario (spawn, health gate, check error, check panic) become a
//! failed [`DrillRow`]; the sweep always continues. Shared setup failures
//! (bad filter, profile resolution, metrics fetch) are returned as errors.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::{stream, FutureExt, StreamExt};
use serde_json::json;

use opsdrill_core::metrics::MetricsSnapshot;
use opsdrill_core::objectives::ObjectivesConfig;
use opsdrill_core::profile::{resolve, PROFILE_AUTO};
use opsdrill_core::report::{DrillReport, DrillRow, SloReport, SloRunMeta};

use crate::config::DrillTimeouts;
use crate::env::{overlay, EnvOverlay, ENV_RATE_LIMIT_MAX, ENV_RATE_LIMIT_WINDOW};
use crate::error::HarnessError;
use crate::probe::{wait_healthy, ProbeClient, PLAN_PATH};
use crate::process::{LaunchRequest, ServiceLauncher};
use crate::scenarios::checks::plan_payload;
use crate::scenarios::{validate_filter, CheckOutcome, Scenario};
use crate::span::{SpanSink, TracingSpanSink};

/// Taxonomy name for errors and panics raised by a scenario check.
pub const SCENARIO_CHECK_ERROR: &str = "ScenarioCheckError";

/// Histogram key for load requests that never got a response.
pub const TRANSPORT_ERROR_KEY: &str = "error";

/// Label (and log file name) of the SLO-mode instance.
pub const SLO_RUN_LABEL: &str = "slo_load";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_BASE_PORT: u16 = 8300;
pub const DEFAULT_SLO_PORT: u16 = 8400;
pub const DEFAULT_SLO_REQUESTS: u32 = 40;

/// Sweep parameters.
#[derive(Debug, Clone)]
pub struct SweepOptions {
    pub host: String,
    /// Scenario `i` (declaration index) binds `base_port + i`.
    pub base_port: u16,
    /// Scenarios in flight at once; `1` runs strictly sequentially.
    pub parallelism: usize,
    /// Restrict to these scenario names; empty runs everything.
    pub only: Vec<String>,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            base_port: DEFAULT_BASE_PORT,
            parallelism: 1,
            only: Vec::new(),
        }
    }
}

/// Load/SLO run parameters.
#[derive(Debug, Clone)]
pub struct SloOptions {
    pub host: String,
    pub port: u16,
    pub requests: u32,
    /// Profile name, or `auto`.
    pub profile: String,
}

impl Default for SloOptions {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_SLO_PORT,
            requests: DEFAULT_SLO_REQUESTS,
            profile: PROFILE_AUTO.to_string(),
        }
    }
}

/// Limiter settings high enough that load never trips it.
pub fn slo_overlay() -> EnvOverlay {
    overlay([
        (ENV_RATE_LIMIT_MAX, "1000000"),
        (ENV_RATE_LIMIT_WINDOW, "60"),
    ])
}

// ---------------------------------------------------------------------------
// DrillRunner
// ---------------------------------------------------------------------------

pub struct DrillRunner<L> {
    launcher: L,
    client: reqwest::Client,
    timeouts: DrillTimeouts,
    sink: Arc<dyn SpanSink>,
}

impl<L: ServiceLauncher> DrillRunner<L> {
    /// Build a runner sharing one HTTP connection pool across instances.
    pub fn new(launcher: L, timeouts: DrillTimeouts) -> Result<Self, HarnessError> {
        let client = reqwest::Client::builder().timeout(timeouts.request).build()?;
        Ok(Self {
            launcher,
            client,
            timeouts,
            sink: Arc::new(TracingSpanSink),
        })
    }

    pub fn with_sink(mut self, sink: Arc<dyn SpanSink>) -> Self {
        self.sink = sink;
        self
    }

    // -- Scenario sweep ------------------------------------------------------

    /// Run `scenarios` and collect one row per selected scenario, in
    /// declaration order.
    pub async fn run_sweep(
        &self,
        scenarios: &[Scenario],
        options: &SweepOptions,
    ) -> Result<DrillReport, HarnessError> {
        validate_filter(scenarios, &options.only)?;

        let mut planned = Vec::new();
        for (index, scenario) in scenarios.iter().enumerate() {
            if !options.only.is_empty() && !options.only.contains(&scenario.name) {
                continue;
            }
            let port = u16::try_from(index)
                .ok()
                .and_then(|offset| options.base_port.checked_add(offset))
                .ok_or_else(|| {
                    HarnessError::Config(format!(
                        "base port {} leaves no port for scenario #{index} '{}'",
                        options.base_port, scenario.name
                    ))
                })?;
            planned.push((scenario, port));
        }

        tracing::info!(
            scenarios = planned.len(),
            parallelism = options.parallelism.max(1),
            base_port = options.base_port,
            "Starting scenario sweep",
        );

        let rows: Vec<DrillRow> = stream::iter(
            planned
                .into_iter()
                .map(|(scenario, port)| self.run_scenario(scenario, &options.host, port)),
        )
        .buffered(options.parallelism.max(1))
        .collect()
        .await;

        let report = DrillReport::from_rows(rows);
        tracing::info!(
            passed = report.passed,
            failed = report.failed.len(),
            "Scenario sweep finished",
        );
        Ok(report)
    }

    async fn run_scenario(&self, scenario: &Scenario, host: &str, port: u16) -> DrillRow {
        let request = LaunchRequest {
            label: scenario.name.clone(),
            host: host.to_string(),
            port,
            env_overrides: scenario.env_overrides.clone(),
        };
        let base_url = request.base_url();
        self.sink.span_start(
            &scenario.name,
            &json!({
                "base_url": base_url,
                "port": port,
                "env_overrides": scenario.env_overrides,
            }),
        );

        let started = Instant::now();
        let result = self.drill(scenario, &request).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let row = match result {
            Ok(outcome) => DrillRow {
                name: scenario.name.clone(),
                description: scenario.description.clone(),
                passed: outcome.passed,
                detail: outcome.detail,
                elapsed_ms,
                evidence: outcome.evidence,
            },
            Err(detail) => {
                tracing::warn!(scenario = %scenario.name, detail = %detail, "Scenario errored");
                DrillRow {
                    name: scenario.name.clone(),
                    description: scenario.description.clone(),
                    passed: false,
                    detail,
                    elapsed_ms,
                    evidence: json!({ "base_url": base_url }),
                }
            }
        };

        self.sink.span_end(&scenario.name, row.passed, elapsed_ms);
        row
    }

    /// Spawn, health-gate, check, and always stop.
    async fn drill(&self, scenario: &Scenario, request: &LaunchRequest) -> Result<CheckOutcome, String> {
        let mut handle = self
            .launcher
            .spawn(request)
            .await
            .map_err(|e| failure_detail(&e))?;

        let result = self.gated_check(scenario, request).await;
        handle.stop().await;
        result
    }

    async fn gated_check(&self, scenario: &Scenario, request: &LaunchRequest) -> Result<CheckOutcome, String> {
        let probe = ProbeClient::with_client(self.client.clone(), request.base_url());
        wait_healthy(&probe, self.timeouts.health, self.timeouts.poll_interval)
            .await
            .map_err(|e| failure_detail(&e))?;

        match AssertUnwindSafe(scenario.check.check(&probe)).catch_unwind().await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(e)) => Err(format!("{SCENARIO_CHECK_ERROR}: {}: {e}", e.kind())),
            Err(payload) => Err(format!(
                "{SCENARIO_CHECK_ERROR}: panic: {}",
                panic_message(payload.as_ref())
            )),
        }
    }

    // -- Load / SLO ----------------------------------------------------------

    /// Spawn one instance, generate sequential load, then evaluate its
    /// metrics snapshot against `objectives`.
    pub async fn run_slo(
        &self,
        objectives: &ObjectivesConfig,
        options: &SloOptions,
    ) -> Result<SloReport, HarnessError> {
        objectives.validate()?;
        // Explicit profile names can be checked before any load is generated.
        if options.profile != PROFILE_AUTO {
            resolve(&MetricsSnapshot::default(), objectives, &options.profile)?;
        }

        let request = LaunchRequest {
            label: SLO_RUN_LABEL.to_string(),
            host: options.host.clone(),
            port: options.port,
            env_overrides: slo_overlay(),
        };
        self.sink.span_start(
            SLO_RUN_LABEL,
            &json!({
                "base_url": request.base_url(),
                "requests": options.requests,
                "profile": options.profile,
            }),
        );

        let started = Instant::now();
        let result = self.spawn_and_evaluate(objectives, options, &request, started).await;

        let passed = matches!(&result, Ok(report) if report.passed);
        self.sink
            .span_end(SLO_RUN_LABEL, passed, started.elapsed().as_millis() as u64);
        result
    }

    async fn spawn_and_evaluate(
        &self,
        objectives: &ObjectivesConfig,
        options: &SloOptions,
        request: &LaunchRequest,
        started: Instant,
    ) -> Result<SloReport, HarnessError> {
        let mut handle = self.launcher.spawn(request).await?;
        let result = self.load_and_evaluate(objectives, options, request, started).await;
        handle.stop().await;
        result
    }

    async fn load_and_evaluate(
        &self,
        objectives: &ObjectivesConfig,
        options: &SloOptions,
        request: &LaunchRequest,
        started: Instant,
    ) -> Result<SloReport, HarnessError> {
        let probe = ProbeClient::with_client(self.client.clone(), request.base_url());
        wait_healthy(&probe, self.timeouts.health, self.timeouts.poll_interval).await?;

        let payload = plan_payload();
        let mut status_counts: BTreeMap<String, u64> = BTreeMap::new();
        for _ in 0..options.requests {
            let key = match probe.post_json(PLAN_PATH, &payload).await {
                Ok(response) => response.status.to_string(),
                Err(e) => {
                    tracing::debug!(error = %e, "Load request failed");
                    TRANSPORT_ERROR_KEY.to_string()
                }
            };
            *status_counts.entry(key).or_insert(0) += 1;
        }

        let snapshot = probe.metrics_snapshot().await?;
        let mut report = SloReport::from_snapshot(&snapshot, objectives, &options.profile)?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            profile = %report.profile,
            passed = report.passed,
            requests = options.requests,
            elapsed_ms,
            "SLO run evaluated",
        );

        report.run = Some(SloRunMeta {
            base_url: probe.base_url().to_string(),
            requests: options.requests,
            status_counts,
            elapsed_ms,
            profile: report.profile.clone(),
        });
        Ok(report)
    }
}

/// `"<Kind>: <message>"` for a failed row.
pub fn failure_detail(error: &HarnessError) -> String {
    format!("{}: {error}", error.kind())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
