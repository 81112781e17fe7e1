use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use relay_outbox::StoreError;
use relay_scheduler::SchedulerError;
use serde_json::json;
use tracing::error;

/// JSON error body: `{ "error": ..., "code": ... }`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "BAD_REQUEST",
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "error": self.message, "code": self.code })),
        )
            .into_response()
    }
}

impl From<SchedulerError> for ApiError {
    fn from(e: SchedulerError) -> Self {
        let status = match &e {
            SchedulerError::NotFound { .. } => StatusCode::NOT_FOUND,
            SchedulerError::AlreadyExists { .. }
            | SchedulerError::AlreadyRunning { .. }
            | SchedulerError::NotRunning { .. } => StatusCode::CONFLICT,
            SchedulerError::InvalidInterval { .. } => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            code: e.code(),
            message: e.to_string(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Validation(msg) => Self {
                status: StatusCode::BAD_REQUEST,
                code: "VALIDATION_ERROR",
                message: msg,
            },
            StoreError::Database(e) => {
                error!(error = %e, "message store failure");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    code: "DATABASE_ERROR",
                    message: "database error".to_string(),
                }
            }
        }
    }
}
