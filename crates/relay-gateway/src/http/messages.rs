use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use relay_core::NewMessage;
use serde_json::{json, Value};
use std::sync::Arc;

use super::error::ApiError;
use crate::app::AppState;

/// GET /api/v1/messages: sent messages, most recently sent first.
pub async fn list_sent(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let messages = state.messages.fetch_sent().await?;
    Ok(Json(json!({
        "count": messages.len(),
        "messages": messages,
    })))
}

/// POST /api/v1/messages: queue a message for delivery.
pub async fn create(
    State(state): State<Arc<AppState>>,
    body: Result<Json<NewMessage>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(new) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let message = state.messages.insert(&new).await?;
    Ok((StatusCode::CREATED, Json(json!({ "message": message }))))
}
