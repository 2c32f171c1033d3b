//! HTTP client for probing a drilled service instance.
//!
//! Wraps the service endpoints the harness consumes (`/health`, `/plan`,
//! `/metrics`, `/diagnostics`) using [`reqwest`]. Unlike a typical API
//! client, non-2xx responses are not errors here: scenario checks classify
//! them. Only transport failures surface as [`HarnessError::Probe`].

use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

use opsdrill_core::evidence::compact_response;
use opsdrill_core::metrics::MetricsSnapshot;

use crate::error::HarnessError;

pub const HEALTH_PATH: &str = "/health";
pub const PLAN_PATH: &str = "/plan";
pub const METRICS_PATH: &str = "/metrics";
pub const DIAGNOSTICS_PATH: &str = "/diagnostics";

/// Per-attempt timeout while polling `/health`, further capped by the time
/// left before the health deadline.
const HEALTH_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(2);

/// A response reduced to what checks need.
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub status: u16,
    /// Parsed body, `None` when the body is not valid JSON.
    pub body: Option<Value>,
}

impl ProbeResponse {
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }

    /// Compact evidence snapshot for reports.
    pub fn evidence(&self) -> Value {
        compact_response(self.status, self.body.as_ref())
    }
}

/// HTTP client bound to one instance's base URL.
#[derive(Debug, Clone)]
pub struct ProbeClient {
    client: reqwest::Client,
    base_url: String,
}

impl ProbeClient {
    /// Create a client whose requests time out after `request_timeout`.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, HarnessError> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Reuse an existing [`reqwest::Client`] (shares its connection pool).
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, path: &str) -> Result<ProbeResponse, HarnessError> {
        let response = self.client.get(self.url(path)).send().await?;
        Self::read(response).await
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> Result<ProbeResponse, HarnessError> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        Self::read(response).await
    }

    /// Fetch `/metrics` as a snapshot. Any failure is a
    /// [`HarnessError::MetricsFetch`].
    pub async fn metrics_snapshot(&self) -> Result<MetricsSnapshot, HarnessError> {
        let response = self
            .get(METRICS_PATH)
            .await
            .map_err(|e| HarnessError::MetricsFetch(e.to_string()))?;

        if response.status != 200 {
            return Err(HarnessError::MetricsFetch(format!(
                "GET {METRICS_PATH} returned {}",
                response.status
            )));
        }

        let body = response.body.ok_or_else(|| {
            HarnessError::MetricsFetch(format!("GET {METRICS_PATH} returned a non-JSON body"))
        })?;

        MetricsSnapshot::from_value(body).map_err(|e| HarnessError::MetricsFetch(e.to_string()))
    }

    /// One `/health` attempt: `true` only for 200 with `{"status": "ok"}`.
    pub async fn is_healthy(&self, attempt_timeout: Duration) -> bool {
        let request = self
            .client
            .get(self.url(HEALTH_PATH))
            .timeout(attempt_timeout);

        match request.send().await {
            Ok(response) if response.status().as_u16() == 200 => {
                match response.json::<Value>().await {
                    Ok(body) => body.get("status").and_then(Value::as_str) == Some("ok"),
                    Err(e) => {
                        tracing::debug!(error = %e, "Health body is not JSON");
                        false
                    }
                }
            }
            Ok(response) => {
                tracing::debug!(status = response.status().as_u16(), "Health not ready");
                false
            }
            Err(e) => {
                tracing::debug!(error = %e, "Health poll failed");
                false
            }
        }
    }

    async fn read(response: reqwest::Response) -> Result<ProbeResponse, HarnessError> {
        let status = response.status().as_u16();
        let text = response.text().await?;
        let body = serde_json::from_str(&text).ok();
        Ok(ProbeResponse { status, body })
    }
}

/// Poll `/health` until it reports ok or `timeout` elapses.
///
/// Transport errors and non-ready responses are swallowed and retried
/// every `poll_interval`.
pub async fn wait_healthy(
    probe: &ProbeClient,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<(), HarnessError> {
    let deadline = Instant::now() + timeout;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let remaining = deadline.saturating_duration_since(Instant::now());
        let attempt_timeout = HEALTH_ATTEMPT_TIMEOUT.min(remaining.max(Duration::from_millis(1)));
        if probe.is_healthy(attempt_timeout).await {
            tracing::debug!(base_url = %probe.base_url(), attempts, "Service healthy");
            return Ok(());
        }

        let now = Instant::now();
        if now >= deadline {
            tracing::warn!(base_url = %probe.base_url(), attempts, "Health check timed out");
            return Err(HarnessError::HealthCheckTimeout {
                base_url: probe.base_url().to_string(),
                timeout,
            });
        }

        tokio::time::sleep(poll_interval.min(deadline - now)).await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
