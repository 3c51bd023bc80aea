use serde::{Deserialize, Serialize};

/// Job status values shared with the job-creation API. This service only ever
/// writes `Complete`; the other transitions belong to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_status_enum", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Complete,
    Failed,
}
