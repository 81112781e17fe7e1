//! Job control endpoints under `/api/v1/scheduler`.
//!
//! Jobs are addressed by name. Start and restart launch a fresh loop; stop
//! only sends the signal and answers before the loop has exited.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use super::error::ApiError;
use crate::app::AppState;

/// GET /api/v1/scheduler/jobs
pub async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "jobs": state.scheduler.list_jobs() }))
}

/// GET /api/v1/scheduler/jobs/{name}
pub async fn job_status(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let info = state.scheduler.job_info(&name)?;
    Ok(Json(json!({
        "job_name": info.name,
        "running": info.running,
        "interval_ms": info.interval_ms,
    })))
}

/// POST /api/v1/scheduler/jobs/{name}/start
pub async fn start_job(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.scheduler.start_job(&name)?;
    Ok(success(format!("job '{name}' started")))
}

/// POST /api/v1/scheduler/jobs/{name}/stop
pub async fn stop_job(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.scheduler.stop_job(&name)?;
    Ok(success(format!("job '{name}' stop signal sent")))
}

/// POST /api/v1/scheduler/jobs/{name}/restart
pub async fn restart_job(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.scheduler.restart_job(&name).await?;
    Ok(success(format!("job '{name}' restarted")))
}

/// POST /api/v1/scheduler/stop: waits for every job loop to exit.
pub async fn stop_all(State(state): State<Arc<AppState>>) -> Json<Value> {
    state.scheduler.stop().await;
    success("scheduler stopped".to_string())
}

fn success(message: String) -> Json<Value> {
    Json(json!({ "status": "success", "message": message }))
}
