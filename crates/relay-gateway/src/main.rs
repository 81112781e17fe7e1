use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use relay_core::RelayConfig;
use relay_outbox::{BatchProcessor, SqliteMessageRepository};
use relay_scheduler::Scheduler;
use tracing::info;

mod app;
mod http;
mod jobs;

#[derive(Parser, Debug)]
#[command(name = "relay-gateway", version, about = "Outbox delivery scheduler with an HTTP control surface")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // config path: --config > RELAY_CONFIG env > ./relay.toml
    let config_path = cli.config.or_else(|| std::env::var("RELAY_CONFIG").ok());
    let config = RelayConfig::load(config_path.as_deref())?;

    let level = &config.log.level;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "relay_gateway={level},relay_scheduler={level},relay_outbox={level},relay_delivery={level},tower_http=debug"
                )
                .into()
            }),
        )
        .init();

    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");
    let messages = Arc::new(SqliteMessageRepository::open(db_path)?);

    let sender = relay_delivery::from_config(&config.delivery)?;
    info!(sender = sender.name(), "delivery sender ready");

    let scheduler = Scheduler::new();
    let processor = BatchProcessor::new(messages.clone(), sender);
    scheduler.add_job(
        config.scheduler.job_name.clone(),
        Duration::from_millis(config.scheduler.interval_ms),
        jobs::DeliverMessagesJob::new(processor, config.scheduler.batch_limit),
    )?;

    let state = Arc::new(app::AppState::new(config, scheduler, messages));
    if state.config.scheduler.autostart {
        state.scheduler.start();
    }
    let router = app::build_router(Arc::clone(&state));

    let addr: SocketAddr = format!("{}:{}", state.config.http.bind, state.config.http.port).parse()?;
    info!("relay gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped, draining scheduler");
    state.scheduler.stop().await;
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl-C received, shutting down"),
        _ = terminate => info!("SIGTERM received, shutting down"),
    }
}

/// Create the database file's parent directory if it is missing.
fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!(path = %parent.display(), "could not create database directory: {e}");
            }
        }
    }
}
