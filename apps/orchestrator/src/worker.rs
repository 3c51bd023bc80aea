//! Worker Loop: claims `optimize` tasks one at a time, runs the pipeline and
//! persists the result. A failed task is marked `failed`; the loop keeps going.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, trace, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::models::task::{QueueTask, TaskType};
use crate::optimization::optimizer::ResumeOptimizer;
use crate::queue::{QueueError, TaskQueue};
use crate::store::{ResultStore, StoreError};

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Invalid task payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Failed to persist result: {0}")]
    Store(#[from] StoreError),
}

/// Loop timings.
#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    pub poll_interval: Duration,
    pub error_backoff: Duration,
    pub stale_task_timeout: Duration,
}

impl From<&Config> for WorkerSettings {
    fn from(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval,
            error_backoff: config.error_backoff,
            stale_task_timeout: config.stale_task_timeout,
        }
    }
}

pub struct Worker {
    queue: Arc<dyn TaskQueue>,
    store: Arc<dyn ResultStore>,
    optimizer: ResumeOptimizer,
    settings: WorkerSettings,
}

impl Worker {
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        store: Arc<dyn ResultStore>,
        optimizer: ResumeOptimizer,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            queue,
            store,
            optimizer,
            settings,
        }
    }

    /// Polls until `shutdown` flips to true (or its sender is dropped).
    /// An in-flight task always runs to completion before the check.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        self.reclaim_stale().await;
        info!(
            poll_interval_secs = self.settings.poll_interval.as_secs(),
            "Worker started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let delay = match self.process_next().await {
                Ok(true) => continue,
                Ok(false) => {
                    trace!("No queued tasks");
                    self.settings.poll_interval
                }
                Err(e) => {
                    error!(error = %e, "Worker loop error");
                    self.settings.error_backoff
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Worker stopped");
    }

    /// Rows left in `processing` by a previous process are failed, never requeued.
    async fn reclaim_stale(&self) {
        match self.queue.fail_stale(self.settings.stale_task_timeout).await {
            Ok(0) => {}
            Ok(count) => warn!(count, "Failed stale tasks left in processing"),
            Err(e) => error!(error = %e, "Failed to reclaim stale tasks"),
        }
    }

    /// Claims and executes one task. `Ok(false)` when the queue is empty.
    /// Errors are queue failures outside any single task.
    pub async fn process_next(&self) -> Result<bool, WorkerError> {
        let task = match self.queue.claim_next(TaskType::Optimize).await? {
            Some(task) => task,
            None => return Ok(false),
        };

        info!(
            task_id = %task.id,
            task_type = task.task_type.as_str(),
            attempt = task.attempts,
            "Processing task"
        );

        // A saved result completes the task in the store's transaction.
        match self.execute(&task).await {
            Ok(optimization_id) => {
                info!(
                    task_id = %task.id,
                    optimization_id = %optimization_id,
                    "Task complete"
                );
            }
            Err(e) => {
                error!(task_id = %task.id, error = %e, "Task failed");
                self.queue.mark_failed(task.id, &e.to_string()).await?;
            }
        }

        Ok(true)
    }

    async fn execute(&self, task: &QueueTask) -> Result<Uuid, WorkerError> {
        let payload = task.optimize_payload()?;
        info!(
            task_id = %task.id,
            job_id = %payload.job_id,
            is_refinement = payload.is_refinement,
            "Running optimization"
        );

        let (result, metrics) = self.optimizer.optimize(&payload).await;
        let optimization_id = self
            .store
            .save_optimization(task.id, &payload, &result, &metrics)
            .await?;
        Ok(optimization_id)
    }
}
