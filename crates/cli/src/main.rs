//! `opsdrill` -- operational fault drills and SLO checks.
//!
//! Exit codes: `0` every scenario or objective passed, `1` at least one
//! failed, `2` the run could not be set up.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use opsdrill_cli::args::{Cli, LogFormat};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let json_logs = cli.log_format == LogFormat::Json;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "opsdrill=info".into()),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();

    let result = opsdrill_cli::execute(&cli).await;
    if let Err(e) = &result {
        tracing::error!(error = %format!("{e:#}"), "Drill aborted");
    }
    ExitCode::from(opsdrill_cli::exit_code(&result))
}
