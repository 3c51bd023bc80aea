//! Result persistence: writes a finished optimization and completes its job
//! and its queue task in one transaction.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::models::task::OptimizePayload;
use crate::optimization::schemas::{OptimizationResult, ReliabilityMetrics};

pub mod postgres;

pub use postgres::PgResultStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Task {0} not found in processing")]
    TaskNotFound(Uuid),
}

#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Inserts the optimization row and flips both the job and the claimed task
    /// to `complete`, all or nothing. Returns the new optimization id.
    async fn save_optimization(
        &self,
        task_id: Uuid,
        payload: &OptimizePayload,
        result: &OptimizationResult,
        metrics: &ReliabilityMetrics,
    ) -> Result<Uuid, StoreError>;
}

/// The persisted report: the result with the run's metrics under `reliability`.
pub fn report_json(
    result: &OptimizationResult,
    metrics: &ReliabilityMetrics,
) -> Result<Value, StoreError> {
    let mut report = serde_json::to_value(result)?;
    if let Value::Object(map) = &mut report {
        map.insert("reliability".to_string(), serde_json::to_value(metrics)?);
    }
    Ok(report)
}
