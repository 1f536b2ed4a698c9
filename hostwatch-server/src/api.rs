use axum::extract::{Path, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use hostwatch_core::metrics::MetricReading;
use hostwatch_core::{
    AlertSink, Config, Incident, MetricsSnapshot, MonitorError, ProcessDetail, ProcessEntry,
    SystemInfo, SystemProbe,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared handles for the HTTP handlers. Everything here is read-only from
/// the listeners' point of view except the two explicit mutating endpoints
/// (kill, acknowledge/resolve); the poll loop's timestamp table is not
/// reachable from here at all.
pub struct AppState {
    pub config: Arc<Config>,
    pub probe: Arc<SystemProbe>,
    pub sink: Option<Arc<dyn AlertSink>>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    ActionFailed(String),
    #[error("Alerting not configured")]
    SinkUnavailable,
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::ActionFailed(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::SinkUnavailable => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Alerting not configured".to_string(),
            ),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

impl From<MonitorError> for ApiError {
    fn from(err: MonitorError) -> Self {
        match err {
            MonitorError::ProcessVanished(_) => ApiError::NotFound(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/processes", get(processes))
        .route("/process/{pid}", get(process_detail))
        .route("/process/{pid}/kill", post(kill_process))
        .route("/alerts", get(alerts))
        .route("/alerts/{id}/acknowledge", post(acknowledge_alert))
        .route("/alerts/{id}/resolve", post(resolve_alert))
        .route("/system", get(system_info))
        .with_state(state)
}

pub async fn serve(
    state: Arc<AppState>,
    host: String,
    port: u16,
    allowed_origin: HeaderValue,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind((host.as_str(), port)).await?;
    info!("API listening on {host}:{port}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await?;

    info!("API listener stopped");
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

async fn metrics(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    state.probe.refresh();
    let cfg = &state.config.metrics;

    // A failed category degrades to a single error-status reading instead of
    // failing the whole response.
    let cpu = state
        .probe
        .check_cpu(&cfg.cpu)
        .unwrap_or_else(|e| degraded("CPU", e));
    let memory = state
        .probe
        .check_memory(&cfg.memory)
        .unwrap_or_else(|e| degraded("memory", e));
    let disk = state
        .probe
        .check_disk(&cfg.disk)
        .unwrap_or_else(|e| degraded("disk", e));

    let disk_io = match state.probe.disk_io() {
        Ok(io) => Some(io),
        Err(e) => {
            warn!("disk I/O counters unavailable: {e}");
            None
        }
    };

    Json(MetricsSnapshot {
        timestamp: chrono::Utc::now(),
        cpu,
        memory,
        disk,
        disk_io,
    })
}

fn degraded(category: &str, err: MonitorError) -> BTreeMap<String, MetricReading> {
    warn!("{category} check failed: {err}");
    let mut readings = BTreeMap::new();
    readings.insert(
        "error".to_string(),
        MetricReading::provider_error(format!("Failed to check {category} metrics: {err}")),
    );
    readings
}

async fn processes(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ProcessEntry>>, ApiError> {
    state.probe.refresh();
    Ok(Json(state.probe.processes()?))
}

async fn process_detail(
    State(state): State<Arc<AppState>>,
    Path(pid): Path<u32>,
) -> Result<Json<ProcessDetail>, ApiError> {
    state.probe.refresh();
    Ok(Json(state.probe.process(pid)?))
}

async fn kill_process(
    State(state): State<Arc<AppState>>,
    Path(pid): Path<u32>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.probe.refresh();
    state
        .probe
        .kill(pid)
        .map_err(|e| ApiError::ActionFailed(format!("Failed to kill process {pid}: {e}")))?;

    Ok(Json(json!({
        "status": "success",
        "message": format!("Process {pid} killed"),
    })))
}

async fn alerts(State(state): State<Arc<AppState>>) -> Json<Vec<Incident>> {
    match &state.sink {
        Some(sink) => Json(sink.list_open().await),
        None => Json(Vec::new()),
    }
}

async fn acknowledge_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let sink = state.sink.as_ref().ok_or(ApiError::SinkUnavailable)?;
    if sink.acknowledge(&id).await {
        Ok(Json(json!({
            "status": "success",
            "message": format!("Alert {id} acknowledged"),
        })))
    } else {
        Err(ApiError::ActionFailed(format!(
            "Failed to acknowledge alert {id}"
        )))
    }
}

async fn resolve_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let sink = state.sink.as_ref().ok_or(ApiError::SinkUnavailable)?;
    if sink.resolve(&id).await {
        Ok(Json(json!({
            "status": "success",
            "message": format!("Alert {id} resolved"),
        })))
    } else {
        Err(ApiError::ActionFailed(format!("Failed to resolve alert {id}")))
    }
}

async fn system_info(State(state): State<Arc<AppState>>) -> Json<SystemInfo> {
    state.probe.refresh();
    Json(state.probe.system_info())
}
