//! Harness configuration: how to launch the service and how long to wait.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::error::HarnessError;

/// Default deadline for an instance to become healthy.
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(45);

/// Default spacing between `/health` polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Default timeout for a single probe request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default grace period between SIGTERM and SIGKILL.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(8);

/// Placeholder substituted with the bind host at spawn time.
pub const HOST_PLACEHOLDER: &str = "{host}";

/// Placeholder substituted with the bind port at spawn time.
pub const PORT_PLACEHOLDER: &str = "{port}";

// ---------------------------------------------------------------------------
// ServiceCommand
// ---------------------------------------------------------------------------

/// Program and argument template used to start the drilled service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ServiceCommand {
    /// Split a whitespace-separated command line. No shell quoting is
    /// interpreted.
    pub fn parse(raw: &str) -> Result<Self, HarnessError> {
        let mut parts = raw.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| HarnessError::Config("service command must not be empty".to_string()))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    /// Arguments with `{host}` and `{port}` substituted.
    pub fn render_args(&self, host: &str, port: u16) -> Vec<String> {
        let port = port.to_string();
        self.args
            .iter()
            .map(|arg| {
                arg.replace(HOST_PLACEHOLDER, host)
                    .replace(PORT_PLACEHOLDER, &port)
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Timeouts
// ---------------------------------------------------------------------------

/// Bounded waits used while drilling one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrillTimeouts {
    pub health: Duration,
    pub poll_interval: Duration,
    pub request: Duration,
}

impl Default for DrillTimeouts {
    fn default() -> Self {
        Self {
            health: DEFAULT_HEALTH_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            request: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

// ---------------------------------------------------------------------------
// HarnessConfig
// ---------------------------------------------------------------------------

/// Everything the process harness needs to run drills.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub service: ServiceCommand,
    pub timeouts: DrillTimeouts,
    pub stop_grace: Duration,
    /// When set, each instance's stdout/stderr go to `<dir>/<label>.log`.
    pub log_dir: Option<PathBuf>,
}

impl HarnessConfig {
    /// Config with default timeouts and no log capture.
    pub fn new(service: ServiceCommand) -> Self {
        Self {
            service,
            timeouts: DrillTimeouts::default(),
            stop_grace: DEFAULT_STOP_GRACE,
            log_dir: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
