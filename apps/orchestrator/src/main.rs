mod config;
mod db;
mod errors;
mod llm_client;
mod matching;
mod models;
mod optimization;
mod queue;
mod routes;
mod state;
mod store;
mod worker;

#[cfg(test)]
mod testing;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, Environment};
use crate::db::create_pool;
use crate::llm_client::build_backend;
use crate::optimization::optimizer::ResumeOptimizer;
use crate::queue::PgTaskQueue;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::PgResultStore;
use crate::worker::{Worker, WorkerSettings};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging (JSON in production)
    let json_logs = config.environment == Environment::Production;
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer()))
        .init();

    info!(
        environment = ?config.environment,
        "Starting orchestrator v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url, config.database_max_connections).await?;

    // Initialize generation backend
    let backend = build_backend(&config);
    info!(provider = backend.name(), "Generation backend initialized");

    let mut optimizer = ResumeOptimizer::new(backend.clone());
    if config.enable_embedding_score {
        optimizer = optimizer.with_similarity_scoring();
        info!("Embedding similarity scoring enabled");
    }

    let queue = Arc::new(PgTaskQueue::new(db.clone()));
    let store = Arc::new(PgResultStore::new(db.clone()));

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Health server listening on {addr}");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let worker = Worker::new(
        queue.clone(),
        store,
        optimizer,
        WorkerSettings::from(&config),
    );
    let worker_handle = tokio::spawn(worker.run(shutdown_rx));

    let state = AppState {
        db,
        queue,
        provider: backend.name(),
    };

    let app = build_router(state).layer(TraceLayer::new_for_http());

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    stop_worker(served, &shutdown_tx, worker_handle).await?;
    info!("Orchestrator stopped");

    Ok(())
}

/// Runs on every server exit, including an I/O error. An in-flight task
/// finishes before the server's result is returned.
async fn stop_worker(
    served: std::io::Result<()>,
    shutdown_tx: &watch::Sender<bool>,
    worker_handle: JoinHandle<()>,
) -> Result<()> {
    let _ = shutdown_tx.send(true);
    worker_handle.await?;
    served?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping worker and server");
}
