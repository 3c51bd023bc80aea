use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::{report_json, ResultStore, StoreError};
use crate::models::job::JobStatus;
use crate::models::task::{OptimizePayload, TaskStatus};
use crate::optimization::schemas::{OptimizationResult, ReliabilityMetrics};

/// Writes to `optimizations`, `jobs` and `task_queue`.
#[derive(Clone)]
pub struct PgResultStore {
    pool: PgPool,
}

impl PgResultStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResultStore for PgResultStore {
    async fn save_optimization(
        &self,
        task_id: Uuid,
        payload: &OptimizePayload,
        result: &OptimizationResult,
        metrics: &ReliabilityMetrics,
    ) -> Result<Uuid, StoreError> {
        let report = report_json(result, metrics)?;

        // Dropping `tx` before commit rolls back every write.
        let mut tx = self.pool.begin().await?;

        let optimization_id: Uuid = sqlx::query_scalar(
            "INSERT INTO optimizations
                (user_id, resume_id, resume_version_id, job_id, score, report_json, preview_md, change_log)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING id",
        )
        .bind(payload.user_id)
        .bind(payload.resume_id)
        .bind(payload.resume_version_id)
        .bind(payload.job_id)
        .bind(i32::try_from(result.score).unwrap_or(0))
        .bind(&report)
        .bind(&result.preview_text)
        .bind(Json(&result.change_log))
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE jobs SET status = $2, updated_at = now() WHERE id = $1")
            .bind(payload.job_id)
            .bind(JobStatus::Complete)
            .execute(&mut *tx)
            .await?;

        let completed = sqlx::query(
            "UPDATE task_queue SET status = $2, updated_at = now()
             WHERE id = $1 AND status = $3",
        )
        .bind(task_id)
        .bind(TaskStatus::Complete)
        .bind(TaskStatus::Processing)
        .execute(&mut *tx)
        .await?;

        if completed.rows_affected() == 0 {
            return Err(StoreError::TaskNotFound(task_id));
        }

        tx.commit().await?;

        info!(
            task_id = %task_id,
            job_id = %payload.job_id,
            optimization_id = %optimization_id,
            "Optimization saved"
        );
        Ok(optimization_id)
    }
}
