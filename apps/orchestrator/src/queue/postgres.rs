use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use super::{QueueError, TaskQueue, STALE_TASK_ERROR};
use crate::models::task::{QueueTask, TaskStatus, TaskType};

const TASK_COLUMNS: &str =
    "id, task_type, payload, status, attempts, last_error, created_at, updated_at";

/// Postgres-backed queue over the `task_queue` table.
#[derive(Clone)]
pub struct PgTaskQueue {
    pool: PgPool,
}

impl PgTaskQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskQueue for PgTaskQueue {
    async fn enqueue(&self, task_type: TaskType, payload: Value) -> Result<Uuid, QueueError> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO task_queue (task_type, payload, status, attempts)
             VALUES ($1, $2, $3, 0)
             RETURNING id",
        )
        .bind(task_type)
        .bind(&payload)
        .bind(TaskStatus::Queued)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// Atomically claim the oldest queued row using SELECT FOR UPDATE SKIP LOCKED.
    async fn claim_next(&self, task_type: TaskType) -> Result<Option<QueueTask>, QueueError> {
        let sql = format!(
            "UPDATE task_queue
             SET status = $1, attempts = attempts + 1, updated_at = now()
             WHERE id = (
                 SELECT id FROM task_queue
                 WHERE status = $2 AND task_type = $3
                 ORDER BY created_at ASC
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING {TASK_COLUMNS}"
        );

        Ok(sqlx::query_as::<_, QueueTask>(&sql)
            .bind(TaskStatus::Processing)
            .bind(TaskStatus::Queued)
            .bind(task_type)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn mark_complete(&self, id: Uuid) -> Result<(), QueueError> {
        let result = sqlx::query(
            "UPDATE task_queue SET status = $2, updated_at = now()
             WHERE id = $1",
        )
        .bind(id)
        .bind(TaskStatus::Complete)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(QueueError::NotFound(id));
        }
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), QueueError> {
        let result = sqlx::query(
            "UPDATE task_queue SET status = $2, last_error = $3, updated_at = now()
             WHERE id = $1",
        )
        .bind(id)
        .bind(TaskStatus::Failed)
        .bind(error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(QueueError::NotFound(id));
        }
        Ok(())
    }

    async fn fail_stale(&self, older_than: Duration) -> Result<u64, QueueError> {
        let result = sqlx::query(
            "UPDATE task_queue
             SET status = $1, last_error = $2, updated_at = now()
             WHERE status = $3
               AND updated_at < now() - make_interval(secs => $4::double precision)",
        )
        .bind(TaskStatus::Failed)
        .bind(STALE_TASK_ERROR)
        .bind(TaskStatus::Processing)
        .bind(older_than.as_secs_f64())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn depth(&self, task_type: TaskType) -> Result<i64, QueueError> {
        Ok(sqlx::query_scalar(
            "SELECT COUNT(*) FROM task_queue WHERE status = $1 AND task_type = $2",
        )
        .bind(TaskStatus::Queued)
        .bind(task_type)
        .fetch_one(&self.pool)
        .await?)
    }
}
