use std::collections::BTreeMap;
use std::net::TcpListener as StdTcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use opsdrill_harness::config::DrillTimeouts;
use opsdrill_harness::env::{
    build_environment, is_credential_key, EnvOverlay, ENV_ENABLE_DIAGNOSTICS,
    ENV_ENABLE_TOOL_FAULT_INJECTION, ENV_RATE_LIMIT_MAX, ENV_RATE_LIMIT_WINDOW,
    ENV_ROUTING_PROVIDER, ENV_STRICT_EXTERNAL_DATA, ENV_TOOL_FAULT_INJECTION, PROVIDER_LIVE,
};
use opsdrill_harness::error::HarnessError;
use opsdrill_harness::process::{LaunchRequest, ServiceHandle, ServiceLauncher};
use opsdrill_harness::span::SpanSink;

/// `/health` answers 503 forever.
pub const FAKE_NEVER_HEALTHY: &str = "FAKE_NEVER_HEALTHY";
/// `server_error` turns injected faults into a bare 500; `plain_text`
/// answers 424 with a non-JSON body.
pub const FAKE_FAULT_SHAPE: &str = "FAKE_FAULT_SHAPE";
/// `broken` makes `/metrics` answer 500.
pub const FAKE_METRICS_MODE: &str = "FAKE_METRICS_MODE";
/// Degrade level recorded for successful plans (default `L0`).
pub const FAKE_DEGRADE_LEVEL: &str = "FAKE_DEGRADE_LEVEL";
/// Delay before answering `POST /plan`.
pub const FAKE_PLAN_DELAY_MS: &str = "FAKE_PLAN_DELAY_MS";

const FAKE_P95_LATENCY_MS: u64 = 120;

pub fn test_timeouts() -> DrillTimeouts {
    DrillTimeouts {
        health: Duration::from_secs(5),
        poll_interval: Duration::from_millis(20),
        request: Duration::from_secs(5),
    }
}

/// Find `count` consecutive free loopback ports.
pub fn free_port_block(count: u16) -> u16 {
    for _ in 0..50 {
        let Ok(probe) = StdTcpListener::bind("127.0.0.1:0") else {
            continue;
        };
        let Ok(addr) = probe.local_addr() else {
            continue;
        };
        let base = addr.port();
        drop(probe);

        if base.checked_add(count).is_none() {
            continue;
        }
        let all_free = (0..count).all(|i| StdTcpListener::bind(("127.0.0.1", base + i)).is_ok());
        if all_free {
            return base;
        }
    }
    panic!("no block of {count} free ports found");
}

// ---------------------------------------------------------------------------
// Launcher
// ---------------------------------------------------------------------------

/// Launches the fake service in-process on the requested port.
#[derive(Clone, Default)]
pub struct FakeLauncher {
    extra_env: EnvOverlay,
    fail_spawn: bool,
    pub spawned: Arc<AtomicUsize>,
    pub stopped: Arc<AtomicUsize>,
    /// `(label, port, env)` per spawn, in spawn order.
    pub launches: Arc<Mutex<Vec<(String, u16, EnvOverlay)>>>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extra variables applied on top of every scenario overlay.
    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.extra_env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn failing() -> Self {
        Self {
            fail_spawn: true,
            ..Self::default()
        }
    }

    pub fn spawn_count(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn ports(&self) -> Vec<(String, u16)> {
        self.launches
            .lock()
            .unwrap()
            .iter()
            .map(|(label, port, _)| (label.clone(), *port))
            .collect()
    }

    pub fn env_for(&self, label: &str) -> Option<EnvOverlay> {
        self.launches
            .lock()
            .unwrap()
            .iter()
            .find(|(l, _, _)| l == label)
            .map(|(_, _, env)| env.clone())
    }
}

#[async_trait]
impl ServiceLauncher for FakeLauncher {
    async fn spawn(&self, request: &LaunchRequest) -> Result<Box<dyn ServiceHandle>, HarnessError> {
        if self.fail_spawn {
            return Err(HarnessError::Spawn {
                program: "fake-service".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such binary"),
            });
        }

        let mut overrides = request.env_overrides.clone();
        overrides.extend(self.extra_env.clone());
        let env = build_environment(Vec::new(), &request.host, request.port, &overrides);

        let listener = tokio::net::TcpListener::bind((request.host.as_str(), request.port)).await?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let router = fake_router(env.clone());
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        self.spawned.fetch_add(1, Ordering::SeqCst);
        self.launches
            .lock()
            .unwrap()
            .push((request.label.clone(), request.port, env));

        Ok(Box::new(FakeHandle {
            shutdown: Some(shutdown_tx),
            task: Some(task),
            stopped: Arc::clone(&self.stopped),
        }))
    }
}

pub struct FakeHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    stopped: Arc<AtomicUsize>,
}

#[async_trait]
impl ServiceHandle for FakeHandle {
    fn id(&self) -> Option<u32> {
        None
    }

    async fn stop(&mut self) {
        let Some(shutdown) = self.shutdown.take() else {
            return;
        };
        let _ = shutdown.send(());
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(Duration::from_secs(2), &mut task).await.is_err() {
                task.abort();
            }
        }
        self.stopped.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Fake service
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeStats {
    total: u64,
    successes: u64,
    degrade_counts: BTreeMap<String, u64>,
    tool_calls: u64,
    tool_errors: u64,
}

struct FakeState {
    env: EnvOverlay,
    hits: Mutex<Vec<Instant>>,
    stats: Mutex<FakeStats>,
}

impl FakeState {
    fn flag(&self, key: &str) -> bool {
        self.env.get(key).map(|v| v == "true").unwrap_or(false)
    }

    fn var(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }

    /// Sliding-window limiter over `POST /plan`.
    fn admit(&self) -> bool {
        let Some(max) = self.var(ENV_RATE_LIMIT_MAX).and_then(|v| v.parse::<usize>().ok()) else {
            return true;
        };
        let window = self
            .var(ENV_RATE_LIMIT_WINDOW)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(60);

        let now = Instant::now();
        let mut hits = self.hits.lock().unwrap();
        hits.retain(|t| now.duration_since(*t) < Duration::from_secs(window));
        if hits.len() >= max {
            return false;
        }
        hits.push(now);
        true
    }
}

fn fake_router(env: EnvOverlay) -> Router {
    let state = Arc::new(FakeState {
        env,
        hits: Mutex::new(Vec::new()),
        stats: Mutex::new(FakeStats::default()),
    });

    Router::new()
        .route("/health", get(health))
        .route("/plan", post(plan))
        .route("/metrics", get(metrics))
        .route("/diagnostics", get(diagnostics))
        .with_state(state)
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

async fn health(State(state): State<Arc<FakeState>>) -> Response {
    if state.flag(FAKE_NEVER_HEALTHY) {
        return detail(StatusCode::SERVICE_UNAVAILABLE, "warming up");
    }
    Json(json!({ "status": "ok" })).into_response()
}

async fn plan(State(state): State<Arc<FakeState>>) -> Response {
    if let Some(delay) = state.var(FAKE_PLAN_DELAY_MS).and_then(|v| v.parse().ok()) {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    if !state.admit() {
        return detail(StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded");
    }

    let response = answer_plan(&state);

    let mut stats = state.stats.lock().unwrap();
    stats.total += 1;
    if response.status().is_success() {
        stats.successes += 1;
        let level = state.var(FAKE_DEGRADE_LEVEL).unwrap_or("L0").to_string();
        *stats.degrade_counts.entry(level).or_insert(0) += 1;
    }
    stats.tool_calls += 1;
    if state.flag(ENV_ENABLE_TOOL_FAULT_INJECTION) && state.var(ENV_TOOL_FAULT_INJECTION).is_some() {
        stats.tool_errors += 1;
    }
    response
}

fn answer_plan(state: &FakeState) -> Response {
    let has_credentials = state
        .env
        .iter()
        .any(|(key, value)| is_credential_key(key) && !value.is_empty());
    if state.flag(ENV_STRICT_EXTERNAL_DATA)
        && state.var(ENV_ROUTING_PROVIDER) == Some(PROVIDER_LIVE)
        && !has_credentials
    {
        return detail(
            StatusCode::SERVICE_UNAVAILABLE,
            "Live routing requires provider credentials",
        );
    }

    if state.flag(ENV_ENABLE_TOOL_FAULT_INJECTION) {
        if let Some(fault) = state.var(ENV_TOOL_FAULT_INJECTION) {
            match state.var(FAKE_FAULT_SHAPE) {
                Some("server_error") => {
                    return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
                }
                Some("plain_text") => {
                    return (StatusCode::FAILED_DEPENDENCY, "tool failed").into_response()
                }
                _ => {}
            }
            return match fault {
                "rate_limit" => detail(
                    StatusCode::TOO_MANY_REQUESTS,
                    "Upstream tool 'routing' is rate limited",
                ),
                _ => detail(StatusCode::FAILED_DEPENDENCY, "Upstream tool 'routing' timed out"),
            };
        }
    }

    let level = state.var(FAKE_DEGRADE_LEVEL).unwrap_or("L0");
    let run_mode = if level == "L0" { "realtime" } else { "fallback" };
    Json(json!({
        "status": "done",
        "message": "Itinerary ready",
        "degrade_level": level,
        "run_fingerprint": { "run_mode": run_mode },
    }))
    .into_response()
}

async fn metrics(State(state): State<Arc<FakeState>>) -> Response {
    if state.var(FAKE_METRICS_MODE) == Some("broken") {
        return detail(StatusCode::INTERNAL_SERVER_ERROR, "metrics unavailable");
    }

    let stats = state.stats.lock().unwrap();
    let success_rate = if stats.total == 0 {
        0.0
    } else {
        stats.successes as f64 / stats.total as f64
    };
    Json(json!({
        "success_rate": success_rate,
        "p95_latency_ms": FAKE_P95_LATENCY_MS,
        "total_requests": stats.total,
        "degrade_counts": stats.degrade_counts,
        "tool_calls": {
            "routing": { "count": stats.tool_calls, "error": stats.tool_errors },
        },
    }))
    .into_response()
}

async fn diagnostics(State(state): State<Arc<FakeState>>) -> Response {
    if !state.flag(ENV_ENABLE_DIAGNOSTICS) {
        return detail(StatusCode::NOT_FOUND, "Not Found");
    }
    Json(json!({
        "runtime_flags": {
            "tool_fault_injection": state.flag(ENV_ENABLE_TOOL_FAULT_INJECTION),
            "strict_external_data": state.flag(ENV_STRICT_EXTERNAL_DATA),
            "routing_provider": state.var(ENV_ROUTING_PROVIDER),
        },
    }))
    .into_response()
}

// ---------------------------------------------------------------------------
// Span recording
// ---------------------------------------------------------------------------

/// Records span boundaries as `start:<name>` / `end:<name>:<passed>`.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl SpanSink for RecordingSink {
    fn span_start(&self, name: &str, _attributes: &Value) {
        self.events.lock().unwrap().push(format!("start:{name}"));
    }

    fn span_end(&self, name: &str, passed: bool, _elapsed_ms: u64) {
        self.events.lock().unwrap().push(format!("end:{name}:{passed}"));
    }
}
