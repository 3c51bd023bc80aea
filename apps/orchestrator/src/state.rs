use std::sync::Arc;

use sqlx::PgPool;

use crate::queue::TaskQueue;

/// Shared state injected into route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub queue: Arc<dyn TaskQueue>,
    /// Name of the generation backend the worker is using.
    pub provider: &'static str,
}
