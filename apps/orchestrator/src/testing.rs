//! Test doubles: a scripted generation backend, an in-memory task queue and
//! an in-memory result store. `pg_test_pool` backs the ignored Postgres tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use uuid::Uuid;

use crate::llm_client::{GenerationBackend, LlmError, OutputSchema};
use crate::models::task::{OptimizePayload, QueueTask, TaskStatus, TaskType};
use crate::optimization::schemas::{OptimizationResult, ReliabilityMetrics};
use crate::queue::{QueueError, TaskQueue, STALE_TASK_ERROR};
use crate::store::{ResultStore, StoreError};

/// An `optimize` payload with an English JD and no instructions.
pub fn optimize_payload(
    resume_text: &str,
    resume_lang: Option<&str>,
    desired_output_lang: Option<&str>,
) -> OptimizePayload {
    OptimizePayload {
        job_id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        resume_text: resume_text.to_string(),
        job_description: "Senior Rust engineer, Kafka a plus".to_string(),
        instructions: None,
        resume_lang: resume_lang.map(str::to_string),
        jd_lang: Some("en".to_string()),
        desired_output_lang: desired_output_lang.map(str::to_string),
        is_refinement: false,
        resume_id: None,
        resume_version_id: None,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Postgres
// ────────────────────────────────────────────────────────────────────────────

const REFERENCE_SCHEMA: &str = include_str!("../migrations/0001_task_pipeline.sql");

/// A pool whose connections see a fresh, empty schema holding the reference
/// tables. Needs `TEST_DATABASE_URL`.
pub async fn pg_test_pool() -> PgPool {
    dotenvy::dotenv().ok();
    let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
    let schema = format!("orchestrator_test_{}", Uuid::new_v4().simple());

    let admin = PgPool::connect(&url).await.expect("Failed to connect");
    admin
        .execute(format!("CREATE SCHEMA {schema}").as_str())
        .await
        .expect("Failed to create schema");

    let search_path = format!("SET search_path TO {schema}");
    let pool = PgPoolOptions::new()
        .max_connections(4)
        .after_connect(move |conn, _meta| {
            let search_path = search_path.clone();
            Box::pin(async move {
                conn.execute(search_path.as_str()).await?;
                Ok(())
            })
        })
        .connect(&url)
        .await
        .expect("Failed to connect");

    pool.execute(REFERENCE_SCHEMA)
        .await
        .expect("Failed to create tables");
    pool
}

// ────────────────────────────────────────────────────────────────────────────
// Scripted backend
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub schema: Option<&'static str>,
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
}

/// Serves queued responses per schema name; free-text calls use their own queue.
/// An unscripted generate call fails with `LlmError::Schema`. Unknown texts embed
/// to an empty vector.
#[derive(Default)]
pub struct ScriptedBackend {
    responses: Mutex<HashMap<Option<String>, VecDeque<String>>>,
    embeddings: HashMap<String, Vec<f32>>,
    failing_embeddings: HashSet<String>,
    calls: Mutex<Vec<RecordedCall>>,
    embed_calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, schema_name: &str, text: &str) -> Self {
        self.push(Some(schema_name.to_string()), text);
        self
    }

    /// Queues a response for an unconstrained (free-text) call.
    pub fn with_text(self, text: &str) -> Self {
        self.push(None, text);
        self
    }

    pub fn with_embedding(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.embeddings.insert(text.to_string(), vector);
        self
    }

    pub fn failing_embeddings_for(mut self, text: &str) -> Self {
        self.failing_embeddings.insert(text.to_string());
        self
    }

    fn push(&self, key: Option<String>, text: &str) {
        self.responses
            .lock()
            .unwrap()
            .entry(key)
            .or_default()
            .push_back(text.to_string());
    }

    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    /// Number of generate calls made with the given schema (`None` = free text).
    pub fn calls_for(&self, schema_name: Option<&str>) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.schema == schema_name)
            .count()
    }

    pub fn last_call_for(&self, schema_name: Option<&str>) -> Option<RecordedCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|c| c.schema == schema_name)
            .cloned()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        schema: Option<&OutputSchema>,
        temperature: f32,
    ) -> Result<String, LlmError> {
        let schema_name = schema.map(|s| s.name);
        self.calls.lock().unwrap().push(RecordedCall {
            schema: schema_name,
            system_prompt: system_prompt.to_string(),
            user_prompt: user_prompt.to_string(),
            temperature,
        });

        self.responses
            .lock()
            .unwrap()
            .get_mut(&schema_name.map(str::to_string))
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| LlmError::Schema("no scripted response".to_string()))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_embeddings.contains(text) {
            return Err(LlmError::Api {
                status: 500,
                message: "embedding backend down".to_string(),
            });
        }
        Ok(self.embeddings.get(text).cloned().unwrap_or_default())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory queue
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryTaskQueue {
    tasks: Mutex<Vec<QueueTask>>,
    failing_claims: AtomicBool,
    failing_completions: AtomicBool,
}

impl MemoryTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a row as-is, e.g. with a chosen `created_at` or status.
    pub fn insert(&self, task: QueueTask) {
        self.tasks.lock().unwrap().push(task);
    }

    pub fn queued_at(&self, task_type: TaskType, payload: Value, created_at: DateTime<Utc>) -> Uuid {
        let id = Uuid::new_v4();
        self.insert(QueueTask {
            id,
            task_type,
            payload,
            status: TaskStatus::Queued,
            attempts: 0,
            last_error: None,
            created_at,
            updated_at: created_at,
        });
        id
    }

    pub fn get(&self, id: Uuid) -> Option<QueueTask> {
        self.tasks.lock().unwrap().iter().find(|t| t.id == id).cloned()
    }

    /// Makes every `claim_next` fail until switched off again.
    pub fn fail_claims(&self, failing: bool) {
        self.failing_claims.store(failing, Ordering::SeqCst);
    }

    /// Makes every `mark_complete` fail until switched off again.
    pub fn fail_completions(&self, failing: bool) {
        self.failing_completions.store(failing, Ordering::SeqCst);
    }

    /// Completes a `processing` row, the way the result store's transaction does.
    /// Returns false when the row is missing or not in `processing`.
    fn complete_claimed(&self, id: Uuid) -> bool {
        let mut tasks = self.tasks.lock().unwrap();
        match tasks
            .iter_mut()
            .find(|t| t.id == id && t.status == TaskStatus::Processing)
        {
            Some(task) => {
                task.status = TaskStatus::Complete;
                task.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    fn update(&self, id: Uuid, apply: impl FnOnce(&mut QueueTask)) -> Result<(), QueueError> {
        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(QueueError::NotFound(id))?;
        apply(task);
        task.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl TaskQueue for MemoryTaskQueue {
    async fn enqueue(&self, task_type: TaskType, payload: Value) -> Result<Uuid, QueueError> {
        Ok(self.queued_at(task_type, payload, Utc::now()))
    }

    async fn claim_next(&self, task_type: TaskType) -> Result<Option<QueueTask>, QueueError> {
        if self.failing_claims.load(Ordering::SeqCst) {
            return Err(QueueError::Database(sqlx::Error::PoolTimedOut));
        }

        let mut tasks = self.tasks.lock().unwrap();
        let next = tasks
            .iter_mut()
            .filter(|t| t.status == TaskStatus::Queued && t.task_type == task_type)
            .min_by_key(|t| t.created_at);

        Ok(next.map(|task| {
            task.status = TaskStatus::Processing;
            task.attempts += 1;
            task.updated_at = Utc::now();
            task.clone()
        }))
    }

    async fn mark_complete(&self, id: Uuid) -> Result<(), QueueError> {
        if self.failing_completions.load(Ordering::SeqCst) {
            return Err(QueueError::Database(sqlx::Error::PoolTimedOut));
        }
        self.update(id, |t| t.status = TaskStatus::Complete)
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), QueueError> {
        self.update(id, |t| {
            t.status = TaskStatus::Failed;
            t.last_error = Some(error.to_string());
        })
    }

    async fn fail_stale(&self, older_than: Duration) -> Result<u64, QueueError> {
        let cutoff = Utc::now() - chrono::Duration::from_std(older_than).unwrap();
        let mut failed = 0;
        for task in self.tasks.lock().unwrap().iter_mut() {
            if task.status == TaskStatus::Processing && task.updated_at < cutoff {
                task.status = TaskStatus::Failed;
                task.last_error = Some(STALE_TASK_ERROR.to_string());
                task.updated_at = Utc::now();
                failed += 1;
            }
        }
        Ok(failed)
    }

    async fn depth(&self, task_type: TaskType) -> Result<i64, QueueError> {
        let tasks = self.tasks.lock().unwrap();
        Ok(tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Queued && t.task_type == task_type)
            .count() as i64)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory result store
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SavedOptimization {
    pub job_id: Uuid,
    pub result: OptimizationResult,
    pub metrics: ReliabilityMetrics,
}

/// Shares the queue's rows, so a save completes the claimed task in the same
/// step as the write.
pub struct MemoryResultStore {
    queue: Arc<MemoryTaskQueue>,
    saved: Mutex<Vec<SavedOptimization>>,
    failing: AtomicBool,
}

impl MemoryResultStore {
    pub fn new(queue: Arc<MemoryTaskQueue>) -> Self {
        Self {
            queue,
            saved: Mutex::default(),
            failing: AtomicBool::new(false),
        }
    }

    /// Every save fails and writes nothing.
    pub fn failing(queue: Arc<MemoryTaskQueue>) -> Self {
        let store = Self::new(queue);
        store.failing.store(true, Ordering::SeqCst);
        store
    }

    pub fn saved(&self) -> Vec<SavedOptimization> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn save_optimization(
        &self,
        task_id: Uuid,
        payload: &OptimizePayload,
        result: &OptimizationResult,
        metrics: &ReliabilityMetrics,
    ) -> Result<Uuid, StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        if !self.queue.complete_claimed(task_id) {
            return Err(StoreError::TaskNotFound(task_id));
        }

        self.saved.lock().unwrap().push(SavedOptimization {
            job_id: payload.job_id,
            result: result.clone(),
            metrics: metrics.clone(),
        });
        Ok(Uuid::new_v4())
    }
}
