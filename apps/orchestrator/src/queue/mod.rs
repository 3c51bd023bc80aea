//! Task Queue Store: durable, ordered queue of pending work backed by `task_queue` rows.
//!
//! Rows are never deleted here; retention is someone else's job.
//!
//! Deployment model: exactly one worker process polls the queue. `claim_next`
//! is still a single atomic statement, so a second claimer can never receive
//! a row already handed out, but nothing reclaims rows from a worker that dies
//! mid-task other than `fail_stale` at the next startup (no leases or heartbeats).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::models::task::{QueueTask, TaskType};

pub mod postgres;

pub use postgres::PgTaskQueue;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Task {0} not found")]
    NotFound(Uuid),
}

#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Inserts a new `queued` row and returns its id.
    async fn enqueue(&self, task_type: TaskType, payload: Value) -> Result<Uuid, QueueError>;

    /// Claims the oldest `queued` row of `task_type`: flips it to `processing`,
    /// bumps `attempts` by one, and returns it.
    async fn claim_next(&self, task_type: TaskType) -> Result<Option<QueueTask>, QueueError>;

    /// Completes a row outside any result write. `optimize` tasks are completed
    /// by `ResultStore::save_optimization` instead.
    async fn mark_complete(&self, id: Uuid) -> Result<(), QueueError>;

    /// Marks the row `failed` and records `error` as `last_error`.
    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), QueueError>;

    /// Fails every `processing` row last touched more than `older_than` ago.
    /// Returns the number of rows failed.
    async fn fail_stale(&self, older_than: Duration) -> Result<u64, QueueError>;

    /// Number of `queued` rows of `task_type`.
    async fn depth(&self, task_type: TaskType) -> Result<i64, QueueError>;
}

/// `last_error` recorded on rows abandoned by a previous worker.
pub const STALE_TASK_ERROR: &str = "worker interrupted before completion";
