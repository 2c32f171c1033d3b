//! Service process lifecycle: spawn with an environment overlay, stop with
//! SIGTERM and escalate to SIGKILL after a grace period.
//!
//! [`ServiceLauncher`] is the seam the drill runner depends on.
//! [`ProcessHarness`] is the OS-process implementation; tests substitute an
//! in-process fake service.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};

use crate::config::{HarnessConfig, ServiceCommand};
use crate::env::{build_environment, EnvOverlay};
use crate::error::HarnessError;

/// Parameters for one instance.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    /// Scenario name or run label; names the log file when capture is on.
    pub label: String,
    pub host: String,
    pub port: u16,
    pub env_overrides: EnvOverlay,
}

impl LaunchRequest {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// A running instance owned by exactly one scenario or drill run.
#[async_trait]
pub trait ServiceHandle: Send {
    /// OS process id, if the instance is a child process.
    fn id(&self) -> Option<u32>;

    /// Stop the instance. Idempotent and best-effort: never fails.
    async fn stop(&mut self);
}

/// Starts isolated service instances.
#[async_trait]
pub trait ServiceLauncher: Send + Sync {
    async fn spawn(&self, request: &LaunchRequest) -> Result<Box<dyn ServiceHandle>, HarnessError>;
}

// ---------------------------------------------------------------------------
// ProcessHarness
// ---------------------------------------------------------------------------

/// Launches the drilled service as a child process.
#[derive(Debug, Clone)]
pub struct ProcessHarness {
    command: ServiceCommand,
    stop_grace: Duration,
    log_dir: Option<PathBuf>,
}

impl ProcessHarness {
    pub fn new(config: &HarnessConfig) -> Self {
        Self {
            command: config.service.clone(),
            stop_grace: config.stop_grace,
            log_dir: config.log_dir.clone(),
        }
    }

    /// Start one instance bound to `host:port`.
    pub fn spawn_process(&self, request: &LaunchRequest) -> Result<ProcessHandle, HarnessError> {
        let env = build_environment(
            std::env::vars(),
            &request.host,
            request.port,
            &request.env_overrides,
        );
        let args = self.command.render_args(&request.host, request.port);

        let mut cmd = Command::new(&self.command.program);
        cmd.args(&args)
            .env_clear()
            .envs(&env)
            .stdin(Stdio::null())
            // A dropped handle must not leave the instance running.
            .kill_on_drop(true);

        match &self.log_dir {
            Some(dir) => {
                let log = open_log(dir, &request.label)?;
                let err_log = log.try_clone()?;
                cmd.stdout(Stdio::from(log)).stderr(Stdio::from(err_log));
            }
            None => {
                cmd.stdout(Stdio::null()).stderr(Stdio::null());
            }
        }

        let child = cmd.spawn().map_err(|source| HarnessError::Spawn {
            program: self.command.program.clone(),
            source,
        })?;

        tracing::info!(
            label = %request.label,
            pid = child.id(),
            host = %request.host,
            port = request.port,
            "Service instance spawned",
        );

        Ok(ProcessHandle {
            child,
            label: request.label.clone(),
            stop_grace: self.stop_grace,
            stopped: false,
        })
    }
}

#[async_trait]
impl ServiceLauncher for ProcessHarness {
    async fn spawn(&self, request: &LaunchRequest) -> Result<Box<dyn ServiceHandle>, HarnessError> {
        Ok(Box::new(self.spawn_process(request)?))
    }
}

/// Open (append) the per-instance log file, creating the directory.
fn open_log(dir: &Path, label: &str) -> Result<File, HarnessError> {
    std::fs::create_dir_all(dir)?;
    let file_name: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(format!("{file_name}.log")))?;
    Ok(file)
}

// ---------------------------------------------------------------------------
// ProcessHandle
// ---------------------------------------------------------------------------

/// Exclusive handle on one spawned service process.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    label: String,
    stop_grace: Duration,
    stopped: bool,
}

impl ProcessHandle {
    /// `true` once the process has exited (or was stopped).
    pub fn has_exited(&mut self) -> bool {
        self.stopped || matches!(self.child.try_wait(), Ok(Some(_)))
    }

    /// SIGTERM, wait up to the grace period, then SIGKILL.
    pub async fn terminate(&mut self) {
        if self.stopped {
            return;
        }

        match self.child.try_wait() {
            Ok(Some(status)) => {
                tracing::debug!(label = %self.label, %status, "Service already exited");
                self.stopped = true;
                return;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(label = %self.label, error = %e, "Failed to poll service status");
            }
        }

        if !send_terminate(&mut self.child) {
            tracing::debug!(label = %self.label, "SIGTERM not delivered");
        }

        match tokio::time::timeout(self.stop_grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::info!(label = %self.label, %status, "Service stopped");
            }
            Ok(Err(e)) => {
                tracing::warn!(label = %self.label, error = %e, "Failed waiting for service exit");
            }
            Err(_) => {
                tracing::warn!(
                    label = %self.label,
                    grace_ms = self.stop_grace.as_millis() as u64,
                    "Service ignored SIGTERM, sending SIGKILL",
                );
                if let Err(e) = self.child.kill().await {
                    tracing::warn!(label = %self.label, error = %e, "SIGKILL failed");
                }
            }
        }

        self.stopped = true;
    }
}

#[async_trait]
impl ServiceHandle for ProcessHandle {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn stop(&mut self) {
        self.terminate().await;
    }
}

/// Ask the child to shut down gracefully.
#[cfg(unix)]
fn send_terminate(child: &mut Child) -> bool {
    let Some(pid) = child.id() else {
        return false;
    };
    // Safety: `pid` belongs to a child we spawned and have not reaped yet
    // (`id()` returns `None` after reaping), so it cannot name a recycled pid.
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    rc == 0
}

/// No graceful signal on this platform; the grace wait falls through to kill.
#[cfg(not(unix))]
fn send_terminate(child: &mut Child) -> bool {
    child.start_kill().is_ok()
}
