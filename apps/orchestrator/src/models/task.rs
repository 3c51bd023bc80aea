use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Kind of work a queue row carries. Only `Optimize` has a consumer in this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_type_enum", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Optimize,
    EmbedResume,
    EmbedJob,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Optimize => "optimize",
            TaskType::EmbedResume => "embed_resume",
            TaskType::EmbedJob => "embed_job",
        }
    }
}

/// Queue row lifecycle: `queued → processing → complete | failed`, never backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status_enum", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Processing,
    Complete,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QueueTask {
    pub id: Uuid,
    pub task_type: TaskType,
    pub payload: Value,
    pub status: TaskStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload of an `optimize` task as written by the job-creation API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizePayload {
    pub job_id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub resume_text: String,
    #[serde(default)]
    pub job_description: String,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default, alias = "resumeLang")]
    pub resume_lang: Option<String>,
    #[serde(default, alias = "jdLang")]
    pub jd_lang: Option<String>,
    #[serde(default, alias = "desiredOutputLang")]
    pub desired_output_lang: Option<String>,
    #[serde(default, alias = "isRefinement")]
    pub is_refinement: bool,
    #[serde(default)]
    pub resume_id: Option<Uuid>,
    #[serde(default)]
    pub resume_version_id: Option<Uuid>,
}

impl QueueTask {
    /// Decodes the opaque payload as an `optimize` request.
    pub fn optimize_payload(&self) -> Result<OptimizePayload, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}
