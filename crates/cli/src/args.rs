//! Command-line arguments.
//!
//! Every flag has an `OPSDRILL_*` environment twin; a `.env` file in the
//! working directory is loaded before parsing.
//!
//! | Variable                        | Default     |
//! |---------------------------------|-------------|
//! | `OPSDRILL_SERVICE_CMD`          | (required)  |
//! | `OPSDRILL_HOST`                 | `127.0.0.1` |
//! | `OPSDRILL_BASE_PORT`            | `8300`      |
//! | `OPSDRILL_PORT`                 | `8400`      |
//! | `OPSDRILL_HEALTH_TIMEOUT_SECS`  | `45`        |
//! | `OPSDRILL_REQUEST_TIMEOUT_SECS` | `30`        |
//! | `OPSDRILL_STOP_GRACE_SECS`      | `8`         |
//! | `OPSDRILL_LOG_DIR`              | --          |
//! | `OPSDRILL_LOG_FORMAT`           | `text`      |
//! | `OPSDRILL_PROFILE`              | `auto`      |
//! | `OPSDRILL_REQUESTS`             | `40`        |
//! | `OPSDRILL_PARALLEL`             | `1`         |

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use opsdrill_core::profile::PROFILE_AUTO;
use opsdrill_harness::config::{DrillTimeouts, HarnessConfig, ServiceCommand, DEFAULT_POLL_INTERVAL};
use opsdrill_harness::error::HarnessError;
use opsdrill_harness::runner::{DEFAULT_BASE_PORT, DEFAULT_HOST, DEFAULT_SLO_PORT, DEFAULT_SLO_REQUESTS};

/// Operational fault drills and SLO checks for an HTTP planning service.
#[derive(Parser, Debug)]
#[command(name = "opsdrill", author, version, about, long_about = None)]
pub struct Cli {
    /// Log output format (logs go to stderr).
    #[arg(long, global = true, env = "OPSDRILL_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run every fault scenario against its own fresh instance.
    Sweep(SweepArgs),

    /// Generate load against one instance and evaluate its objectives.
    Slo(SloArgs),

    /// Evaluate a saved metrics snapshot without spawning anything.
    Evaluate(EvaluateArgs),

    /// Print the scenario registry as JSON.
    Scenarios,
}

// ---------------------------------------------------------------------------
// Shared argument groups
// ---------------------------------------------------------------------------

#[derive(Args, Debug, Clone)]
pub struct ServiceArgs {
    /// Service command line; `{host}` and `{port}` are substituted.
    #[arg(long, env = "OPSDRILL_SERVICE_CMD")]
    pub service_cmd: String,

    #[arg(long, env = "OPSDRILL_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    #[arg(long, env = "OPSDRILL_HEALTH_TIMEOUT_SECS", default_value_t = 45)]
    pub health_timeout_secs: u64,

    #[arg(long, env = "OPSDRILL_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Seconds between SIGTERM and SIGKILL.
    #[arg(long, env = "OPSDRILL_STOP_GRACE_SECS", default_value_t = 8)]
    pub stop_grace_secs: u64,

    /// Capture each instance's output to `<dir>/<scenario>.log`.
    #[arg(long, env = "OPSDRILL_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

impl ServiceArgs {
    pub fn harness_config(&self) -> Result<HarnessConfig, HarnessError> {
        let mut config = HarnessConfig::new(ServiceCommand::parse(&self.service_cmd)?);
        config.timeouts = DrillTimeouts {
            health: Duration::from_secs(self.health_timeout_secs),
            poll_interval: DEFAULT_POLL_INTERVAL,
            request: Duration::from_secs(self.request_timeout_secs),
        };
        config.stop_grace = Duration::from_secs(self.stop_grace_secs);
        config.log_dir = self.log_dir.clone();
        Ok(config)
    }
}

#[derive(Args, Debug, Clone)]
pub struct ObjectiveArgs {
    /// Objectives file (flat list or profile set); built-in profiles when absent.
    #[arg(long, env = "OPSDRILL_OBJECTIVES")]
    pub objectives: Option<PathBuf>,

    /// Profile name, or `auto` to infer it from the traffic mix.
    #[arg(long, env = "OPSDRILL_PROFILE", default_value = PROFILE_AUTO)]
    pub profile: String,
}

#[derive(Args, Debug, Clone)]
pub struct OutputArgs {
    /// JSON report path; stdout when absent.
    #[arg(short, long, env = "OPSDRILL_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Also render a markdown summary to this path.
    #[arg(long, env = "OPSDRILL_MARKDOWN")]
    pub markdown: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

#[derive(Args, Debug, Clone)]
pub struct SweepArgs {
    #[command(flatten)]
    pub service: ServiceArgs,

    /// Scenario `i` binds `base_port + i`.
    #[arg(long, env = "OPSDRILL_BASE_PORT", default_value_t = DEFAULT_BASE_PORT)]
    pub base_port: u16,

    /// Scenarios run at once.
    #[arg(long, env = "OPSDRILL_PARALLEL", default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
    pub parallel: u16,

    /// Only run these scenarios (repeatable).
    #[arg(long = "scenario", env = "OPSDRILL_SCENARIOS", value_delimiter = ',')]
    pub scenarios: Vec<String>,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug, Clone)]
pub struct SloArgs {
    #[command(flatten)]
    pub service: ServiceArgs,

    #[arg(long, env = "OPSDRILL_PORT", default_value_t = DEFAULT_SLO_PORT)]
    pub port: u16,

    /// Sequential `POST /plan` requests before the snapshot.
    #[arg(long, env = "OPSDRILL_REQUESTS", default_value_t = DEFAULT_SLO_REQUESTS)]
    pub requests: u32,

    #[command(flatten)]
    pub objectives: ObjectiveArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    /// Saved `/metrics` snapshot (JSON object).
    #[arg(long, env = "OPSDRILL_METRICS")]
    pub metrics: PathBuf,

    #[command(flatten)]
    pub objectives: ObjectiveArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
