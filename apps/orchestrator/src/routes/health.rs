use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::warn;

use crate::models::task::TaskType;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub service: &'static str,
    pub provider: &'static str,
    pub checks: HealthChecks,
    /// Queued `optimize` tasks; absent when the count could not be read.
    pub queue_depth: Option<i64>,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub database: ComponentHealth,
}

#[derive(Serialize)]
pub struct ComponentHealth {
    pub status: &'static str,
    pub latency_ms: Option<u64>,
}

/// GET /health
/// 200 when the database answers, 503 `degraded` otherwise.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let start = std::time::Instant::now();

    let database = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => ComponentHealth {
            status: "ok",
            latency_ms: Some(start.elapsed().as_millis() as u64),
        },
        Err(e) => {
            warn!(error = %e, "Health check: database unreachable");
            ComponentHealth {
                status: "error",
                latency_ms: None,
            }
        }
    };

    let queue_depth = state.queue.depth(TaskType::Optimize).await.ok();

    let healthy = database.status == "ok";
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        service: env!("CARGO_PKG_NAME"),
        provider: state.provider,
        checks: HealthChecks { database },
        queue_depth,
    };

    (status_code, Json(response))
}
