//! Integration tests for scenario-sweep mode against the in-process fake
//! service.

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use serde_json::json;

use common::{free_port_block, test_timeouts, FakeLauncher, RecordingSink, FAKE_FAULT_SHAPE, FAKE_NEVER_HEALTHY};
use opsdrill_harness::config::DrillTimeouts;
use opsdrill_harness::error::HarnessError;
use opsdrill_harness::probe::ProbeClient;
use opsdrill_harness::runner::{DrillRunner, SweepOptions};
use opsdrill_harness::scenarios::checks::BuiltinCheck;
use opsdrill_harness::scenarios::{
    builtin_scenarios, CheckOutcome, Scenario, ScenarioCheck, SCENARIO_RATE_LIMIT_BURST,
    SCENARIO_TOOL_TIMEOUT_FAULT,
};

fn sweep_options(base_port: u16) -> SweepOptions {
    SweepOptions {
        base_port,
        ..SweepOptions::default()
    }
}

struct PanickingCheck;

#[async_trait]
impl ScenarioCheck for PanickingCheck {
    async fn check(&self, _probe: &ProbeClient) -> Result<CheckOutcome, HarnessError> {
        panic!("check exploded");
    }
}

struct FailingCheck;

#[async_trait]
impl ScenarioCheck for FailingCheck {
    async fn check(&self, _probe: &ProbeClient) -> Result<CheckOutcome, HarnessError> {
        Err(HarnessError::Config("probe budget exhausted".to_string()))
    }
}

// ---------------------------------------------------------------------------
// Test: every built-in scenario passes against a well-behaved service
// ---------------------------------------------------------------------------

#[tokio::test]
async fn builtin_sweep_passes_against_well_behaved_service() {
    let scenarios = builtin_scenarios();
    let base_port = free_port_block(scenarios.len() as u16);
    let launcher = FakeLauncher::new();
    let sink = Arc::new(RecordingSink::default());
    let runner = DrillRunner::new(launcher.clone(), test_timeouts())
        .expect("runner")
        .with_sink(sink.clone());

    let report = runner
        .run_sweep(&scenarios, &sweep_options(base_port))
        .await
        .expect("sweep");

    assert!(report.passed, "failed rows: {:#?}", report.failed);
    let names: Vec<_> = report.scenarios.iter().map(|r| r.name.as_str()).collect();
    let expected: Vec<_> = scenarios.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, expected);

    // Scenario i binds base_port + i.
    let ports: Vec<u16> = launcher.ports().into_iter().map(|(_, port)| port).collect();
    let expected_ports: Vec<u16> = (0..scenarios.len() as u16).map(|i| base_port + i).collect();
    assert_eq!(ports, expected_ports);

    assert_eq!(launcher.spawn_count(), scenarios.len());
    assert_eq!(launcher.stop_count(), scenarios.len());

    let events = sink.events();
    assert_eq!(events.len(), scenarios.len() * 2);
    assert_eq!(events[0], "start:baseline_plan");
    assert_eq!(events[1], "end:baseline_plan:true");
}

// ---------------------------------------------------------------------------
// Test: scenario overlays reach the instance on top of safe defaults
// ---------------------------------------------------------------------------

#[tokio::test]
async fn overlays_are_isolated_per_scenario() {
    let scenarios = builtin_scenarios();
    let base_port = free_port_block(scenarios.len() as u16);
    let launcher = FakeLauncher::new();
    let runner = DrillRunner::new(launcher.clone(), test_timeouts()).expect("runner");

    runner
        .run_sweep(&scenarios, &sweep_options(base_port))
        .await
        .expect("sweep");

    let baseline = launcher.env_for("baseline_plan").expect("baseline env");
    assert_eq!(baseline["ENABLE_TOOL_FAULT_INJECTION"], "false");
    assert_eq!(baseline["ROUTING_PROVIDER"], "fixture");
    assert!(!baseline.contains_key("RATE_LIMIT_MAX"));

    let fault = launcher.env_for(SCENARIO_TOOL_TIMEOUT_FAULT).expect("fault env");
    assert_eq!(fault["ENABLE_TOOL_FAULT_INJECTION"], "true");
    assert_eq!(fault["TOOL_FAULT_INJECTION"], "timeout");
    assert_eq!(fault["PORT"], (base_port + 1).to_string());
}

// ---------------------------------------------------------------------------
// Test: a leaked 5xx fails the controlled-fault scenario with evidence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn leaked_server_error_fails_fault_scenarios() {
    let scenarios = builtin_scenarios();
    let base_port = free_port_block(scenarios.len() as u16);
    let launcher = FakeLauncher::new().with_env(FAKE_FAULT_SHAPE, "server_error");
    let runner = DrillRunner::new(launcher.clone(), test_timeouts()).expect("runner");

    let report = runner
        .run_sweep(&scenarios, &sweep_options(base_port))
        .await
        .expect("sweep");

    assert!(!report.passed);
    let failed: Vec<_> = report.failed.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(failed, ["tool_timeout_fault", "tool_rate_limit_fault"]);

    let row = &report.failed[0];
    assert!(row.detail.contains("server error"), "{}", row.detail);
    assert_eq!(row.evidence["status_code"], 500);
    assert_eq!(row.evidence["json"], false);
}

// ---------------------------------------------------------------------------
// Test: a never-healthy service yields HealthCheckTimeout rows, not a crash
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_timeout_is_recorded_per_scenario() {
    let scenarios: Vec<Scenario> = builtin_scenarios().into_iter().take(2).collect();
    let base_port = free_port_block(2);
    let launcher = FakeLauncher::new().with_env(FAKE_NEVER_HEALTHY, "true");
    let timeouts = DrillTimeouts {
        health: Duration::from_millis(300),
        ..test_timeouts()
    };
    let runner = DrillRunner::new(launcher.clone(), timeouts).expect("runner");

    let report = runner
        .run_sweep(&scenarios, &sweep_options(base_port))
        .await
        .expect("sweep");

    assert!(!report.passed);
    assert_eq!(report.failed.len(), 2);
    for row in &report.scenarios {
        assert!(row.detail.starts_with("HealthCheckTimeout: "), "{}", row.detail);
        assert!(row.elapsed_ms >= 300);
    }
    assert_eq!(launcher.stop_count(), 2);
}

// ---------------------------------------------------------------------------
// Test: check errors and panics become ScenarioCheckError rows
// ---------------------------------------------------------------------------

#[tokio::test]
async fn check_errors_and_panics_do_not_abort_the_sweep() {
    let scenarios = vec![
        Scenario::new("exploding", "Check panics", PanickingCheck),
        Scenario::new("erroring", "Check returns an error", FailingCheck),
        Scenario::new("healthy", "Baseline still runs", BuiltinCheck::PlanCompletes),
    ];
    let base_port = free_port_block(3);
    let launcher = FakeLauncher::new();
    let runner = DrillRunner::new(launcher.clone(), test_timeouts()).expect("runner");

    let report = runner
        .run_sweep(&scenarios, &sweep_options(base_port))
        .await
        .expect("sweep");

    assert_eq!(report.scenarios.len(), 3);
    assert_eq!(
        report.scenarios[0].detail,
        "ScenarioCheckError: panic: check exploded"
    );
    assert_eq!(
        report.scenarios[1].detail,
        "ScenarioCheckError: ConfigError: Invalid configuration: probe budget exhausted"
    );
    assert!(report.scenarios[2].passed);
    assert_eq!(launcher.stop_count(), 3);
}

// ---------------------------------------------------------------------------
// Test: spawn failures are recorded as failed rows
// ---------------------------------------------------------------------------

#[tokio::test]
async fn spawn_failure_is_recorded() {
    let scenarios: Vec<Scenario> = builtin_scenarios().into_iter().take(1).collect();
    let runner = DrillRunner::new(FakeLauncher::failing(), test_timeouts()).expect("runner");

    let report = runner
        .run_sweep(&scenarios, &sweep_options(free_port_block(1)))
        .await
        .expect("sweep");

    assert!(!report.passed);
    assert!(report.scenarios[0].detail.starts_with("SpawnError: "));
    assert!(report.scenarios[0].evidence["base_url"].is_string());
}

// ---------------------------------------------------------------------------
// Test: the filter keeps declaration-index ports
// ---------------------------------------------------------------------------

#[tokio::test]
async fn filter_runs_named_scenarios_on_their_declared_port() {
    let scenarios = builtin_scenarios();
    let base_port = free_port_block(scenarios.len() as u16);
    let launcher = FakeLauncher::new();
    let runner = DrillRunner::new(launcher.clone(), test_timeouts()).expect("runner");
    let options = SweepOptions {
        base_port,
        only: vec![SCENARIO_RATE_LIMIT_BURST.to_string()],
        ..SweepOptions::default()
    };

    let report = runner.run_sweep(&scenarios, &options).await.expect("sweep");

    assert!(report.passed, "{:#?}", report.failed);
    assert_eq!(report.scenarios.len(), 1);
    assert_eq!(
        report.scenarios[0].evidence["status_codes"],
        json!([200, 200, 429, 429, 429, 429])
    );
    assert_eq!(
        launcher.ports(),
        vec![(SCENARIO_RATE_LIMIT_BURST.to_string(), base_port + 4)]
    );
}

#[tokio::test]
async fn unknown_filter_name_is_fatal() {
    let launcher = FakeLauncher::new();
    let runner = DrillRunner::new(launcher.clone(), test_timeouts()).expect("runner");
    let options = SweepOptions {
        only: vec!["chaos_monkey".to_string()],
        ..SweepOptions::default()
    };

    let result = runner.run_sweep(&builtin_scenarios(), &options).await;

    assert_matches!(result, Err(HarnessError::Config(_)));
    assert_eq!(launcher.spawn_count(), 0);
}

// ---------------------------------------------------------------------------
// Test: bounded parallel sweep keeps declaration order
// ---------------------------------------------------------------------------

#[tokio::test]
async fn parallel_sweep_reports_in_declaration_order() {
    let scenarios = builtin_scenarios();
    let base_port = free_port_block(scenarios.len() as u16);
    let launcher = FakeLauncher::new();
    let runner = DrillRunner::new(launcher.clone(), test_timeouts()).expect("runner");
    let options = SweepOptions {
        base_port,
        parallelism: 3,
        ..SweepOptions::default()
    };

    let report = runner.run_sweep(&scenarios, &options).await.expect("sweep");

    assert!(report.passed, "{:#?}", report.failed);
    let names: Vec<_> = report.scenarios.iter().map(|r| r.name.clone()).collect();
    let expected: Vec<_> = scenarios.iter().map(|s| s.name.clone()).collect();
    assert_eq!(names, expected);
    assert_eq!(launcher.stop_count(), scenarios.len());
}
