use std::time::Duration;

use opsdrill_core::error::CoreError;

/// Errors from spawning, health-gating, probing, and evaluating.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// The service process could not be started.
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The service never answered `/health` with `{"status": "ok"}`.
    #[error("Service at {base_url} not healthy after {}ms", .timeout.as_millis())]
    HealthCheckTimeout { base_url: String, timeout: Duration },

    /// A probe request failed at the transport level.
    #[error("HTTP request failed: {0}")]
    Probe(#[from] reqwest::Error),

    /// `/metrics` was unreachable, non-200, or not a JSON object.
    #[error("Metrics fetch failed: {0}")]
    MetricsFetch(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    /// Stable taxonomy name used as the prefix of failed-row details.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Spawn { .. } => "SpawnError",
            Self::HealthCheckTimeout { .. } => "HealthCheckTimeout",
            Self::Probe(_) => "ProbeError",
            Self::MetricsFetch(_) => "MetricsFetchFailure",
            Self::Core(err) => err.kind(),
            Self::Config(_) => "ConfigError",
            Self::Io(_) => "IoError",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_health_timeout() {
        let err = HarnessError::HealthCheckTimeout {
            base_url: "http://127.0.0.1:8301".to_string(),
            timeout: Duration::from_secs(45),
        };
        assert_eq!(
            err.to_string(),
            "Service at http://127.0.0.1:8301 not healthy after 45000ms"
        );
        assert_eq!(err.kind(), "HealthCheckTimeout");
    }

    #[test]
    fn core_errors_keep_their_kind() {
        let err = HarnessError::from(CoreError::UnknownProfile {
            requested: "batch".to_string(),
            available: vec!["degraded".to_string()],
        });
        assert_eq!(err.kind(), "UnknownProfile");
        assert!(err.to_string().contains("batch"));
    }

    #[test]
    fn spawn_error_has_source() {
        let err = HarnessError::Spawn {
            program: "missing-binary".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().starts_with("Failed to spawn 'missing-binary'"));
    }
}
