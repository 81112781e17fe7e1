use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use relay_core::RelayConfig;
use relay_outbox::SqliteMessageRepository;
use relay_scheduler::Scheduler;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::http;

/// Central shared state: passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: RelayConfig,
    pub scheduler: Scheduler,
    pub messages: Arc<SqliteMessageRepository>,
}

impl AppState {
    pub fn new(
        config: RelayConfig,
        scheduler: Scheduler,
        messages: Arc<SqliteMessageRepository>,
    ) -> Self {
        Self {
            config,
            scheduler,
            messages,
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    let api = Router::new()
        .route("/health", get(http::health::health_handler))
        .route("/scheduler/jobs", get(http::scheduler::list_jobs))
        .route("/scheduler/jobs/{name}", get(http::scheduler::job_status))
        .route("/scheduler/jobs/{name}/start", post(http::scheduler::start_job))
        .route("/scheduler/jobs/{name}/stop", post(http::scheduler::stop_job))
        .route(
            "/scheduler/jobs/{name}/restart",
            post(http::scheduler::restart_job),
        )
        .route("/scheduler/stop", post(http::scheduler::stop_all))
        .route(
            "/messages",
            get(http::messages::list_sent).post(http::messages::create),
        );

    Router::new()
        .route("/health", get(http::health::health_handler))
        .nest("/api/v1", api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
