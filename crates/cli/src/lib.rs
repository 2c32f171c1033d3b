//! `opsdrill` command implementations.
//!
//! [`execute`] runs one parsed command and reports whether the resulting
//! report passed. Setup failures come back as errors; `main` maps both to
//! the process exit code with [`exit_code`].

pub mod args;
pub mod output;

use std::path::Path;

use anyhow::Context;

use opsdrill_core::markdown::{render_drill_report, render_slo_report};
use opsdrill_core::metrics::MetricsSnapshot;
use opsdrill_core::objectives::ObjectivesConfig;
use opsdrill_core::report::SloReport;
use opsdrill_harness::process::ProcessHarness;
use opsdrill_harness::runner::{DrillRunner, SloOptions, SweepOptions};
use opsdrill_harness::scenarios::{builtin_scenarios, Scenario};

use crate::args::{Cli, Commands, EvaluateArgs, SloArgs, SweepArgs};
use crate::output::{write_markdown, write_report};

/// Every objective or scenario passed.
pub const EXIT_PASSED: u8 = 0;
/// The run completed and at least one objective or scenario failed.
pub const EXIT_FAILED: u8 = 1;
/// The run could not be set up (bad config, unknown profile, metrics fetch).
pub const EXIT_FATAL: u8 = 2;

pub fn exit_code(result: &anyhow::Result<bool>) -> u8 {
    match result {
        Ok(true) => EXIT_PASSED,
        Ok(false) => EXIT_FAILED,
        Err(_) => EXIT_FATAL,
    }
}

/// Run the parsed command. `Ok(passed)` once a report was produced.
pub async fn execute(cli: &Cli) -> anyhow::Result<bool> {
    match &cli.command {
        Commands::Sweep(args) => sweep(args, builtin_scenarios()).await,
        Commands::Slo(args) => slo(args).await,
        Commands::Evaluate(args) => evaluate(args),
        Commands::Scenarios => list_scenarios(&builtin_scenarios()),
    }
}

async fn sweep(args: &SweepArgs, scenarios: Vec<Scenario>) -> anyhow::Result<bool> {
    let config = args.service.harness_config()?;
    let runner = DrillRunner::new(ProcessHarness::new(&config), config.timeouts)?;
    let options = SweepOptions {
        host: args.service.host.clone(),
        base_port: args.base_port,
        parallelism: usize::from(args.parallel),
        only: args.scenarios.clone(),
    };

    let report = runner
        .run_sweep(&scenarios, &options)
        .await
        .context("scenario sweep could not start")?;

    write_report(&report, args.output.output.as_deref())?;
    if let Some(path) = &args.output.markdown {
        write_markdown(path, &render_drill_report(&report))?;
    }
    Ok(report.passed)
}

async fn slo(args: &SloArgs) -> anyhow::Result<bool> {
    let objectives = load_objectives(args.objectives.objectives.as_deref())?;
    let config = args.service.harness_config()?;
    let runner = DrillRunner::new(ProcessHarness::new(&config), config.timeouts)?;
    let options = SloOptions {
        host: args.service.host.clone(),
        port: args.port,
        requests: args.requests,
        profile: args.objectives.profile.clone(),
    };

    let report = runner
        .run_slo(&objectives, &options)
        .await
        .context("SLO run failed")?;

    emit_slo_report(&report, &args.output)?;
    Ok(report.passed)
}

fn evaluate(args: &EvaluateArgs) -> anyhow::Result<bool> {
    let objectives = load_objectives(args.objectives.objectives.as_deref())?;
    let snapshot = load_snapshot(&args.metrics)?;

    let report = SloReport::from_snapshot(&snapshot, &objectives, &args.objectives.profile)?;
    tracing::info!(
        profile = %report.profile,
        passed = report.passed,
        failed = report.failed.len(),
        "Snapshot evaluated",
    );

    emit_slo_report(&report, &args.output)?;
    Ok(report.passed)
}

fn list_scenarios(scenarios: &[Scenario]) -> anyhow::Result<bool> {
    let summaries: Vec<_> = scenarios.iter().map(Scenario::summary).collect();
    println!("{}", serde_json::to_string_pretty(&summaries)?);
    Ok(true)
}

fn emit_slo_report(report: &SloReport, output: &args::OutputArgs) -> anyhow::Result<()> {
    write_report(report, output.output.as_deref())?;
    if let Some(path) = &output.markdown {
        write_markdown(path, &render_slo_report(report))?;
    }
    Ok(())
}

/// Objectives from `path`, or the built-in profile set.
pub fn load_objectives(path: Option<&Path>) -> anyhow::Result<ObjectivesConfig> {
    let Some(path) = path else {
        return Ok(ObjectivesConfig::builtin());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read objectives file {}", path.display()))?;
    let config = ObjectivesConfig::from_json_str(&raw)
        .with_context(|| format!("invalid objectives file {}", path.display()))?;
    Ok(config)
}

pub fn load_snapshot(path: &Path) -> anyhow::Result<MetricsSnapshot> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read metrics snapshot {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("metrics snapshot {} is not JSON", path.display()))?;
    let snapshot = MetricsSnapshot::from_value(value)
        .with_context(|| format!("invalid metrics snapshot {}", path.display()))?;
    Ok(snapshot)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
