//! Job entity model, log entries, and API snapshot DTO.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;
use tutorgen_core::types::{DbId, Timestamp};

use super::status::{JobStatus, StatusId};

/// A row from the `jobs` table.
///
/// `logs` is an append-only JSONB array inside the same row, so a single
/// `SELECT` always yields a consistent snapshot of fields and log
/// history together.
#[derive(Debug, Clone, FromRow)]
pub struct Job {
    pub id: DbId,
    pub owner_id: DbId,
    pub status_id: StatusId,
    pub progress: i16,
    pub current_step: Option<String>,
    pub config: Value,
    pub result: Option<Value>,
    pub error_message: Option<String>,
    pub logs: Json<Vec<LogEntry>>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

/// Severity of a [`LogEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// One immutable entry in a job's log sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: Timestamp,
    pub level: LogLevel,
    pub message: String,
    pub step: String,
    /// Progress percentage at the time of the entry.
    pub progress: i16,
}

impl LogEntry {
    pub fn new(level: LogLevel, step: &str, progress: i16, message: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.to_string(),
            step: step.to_string(),
            progress,
        }
    }

    pub fn info(step: &str, progress: i16, message: &str) -> Self {
        Self::new(LogLevel::Info, step, progress, message)
    }

    pub fn error(step: &str, progress: i16, message: &str) -> Self {
        Self::new(LogLevel::Error, step, progress, message)
    }
}

/// Full job view returned by the status and list endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub id: DbId,
    pub status: &'static str,
    pub progress: i16,
    pub current_step: Option<String>,
    pub logs: Vec<LogEntry>,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl From<Job> for JobSnapshot {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            status: JobStatus::from_id(job.status_id)
                .map(JobStatus::as_str)
                .unwrap_or("unknown"),
            progress: job.progress,
            current_step: job.current_step,
            logs: job.logs.0,
            result: job.result,
            error: job.error_message,
            created_at: job.created_at,
            updated_at: job.updated_at,
            completed_at: job.completed_at,
        }
    }
}
