//! Repository for the `jobs` table.
//!
//! The job lifecycle is enforced here: every transition statement
//! carries a status predicate, so an illegal transition (e.g. completing
//! a job twice, or failing a completed job) updates zero rows instead of
//! corrupting terminal state. Log appends ride on the same statement as
//! the field update, which keeps each write atomic with respect to
//! concurrent status reads.

use sqlx::types::Json;
use sqlx::PgPool;
use tutorgen_core::types::DbId;

use crate::models::job::{Job, LogEntry};
use crate::models::status::JobStatus;

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, owner_id, status_id, progress, current_step, config, \
    result, error_message, logs, created_at, updated_at, completed_at";

/// Provides persistence operations for generation jobs.
pub struct JobRepo;

impl JobRepo {
    /// Insert a new pending job with its seed log entry.
    pub async fn create(
        pool: &PgPool,
        owner_id: DbId,
        config: &serde_json::Value,
        seed_log: &LogEntry,
    ) -> Result<Job, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs (owner_id, status_id, config, logs) \
             VALUES ($1, $2, $3, jsonb_build_array($4::jsonb)) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(owner_id)
            .bind(JobStatus::Pending.id())
            .bind(config)
            .bind(Json(seed_log))
            .fetch_one(pool)
            .await
    }

    /// Find a job by ID, scoped to its owner.
    ///
    /// A job that exists but belongs to someone else yields `None`, the
    /// same as a job that does not exist. Callers cannot distinguish the
    /// two cases.
    pub async fn find_by_id_for_owner(
        pool: &PgPool,
        id: DbId,
        owner_id: DbId,
    ) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1 AND owner_id = $2");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(pool)
            .await
    }

    /// Find a job by ID without an ownership filter.
    ///
    /// For internal use by the execution side, which is handed a job id
    /// it created itself.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all jobs owned by a user, newest first.
    pub async fn list_by_owner(pool: &PgPool, owner_id: DbId) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs WHERE owner_id = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(owner_id)
            .fetch_all(pool)
            .await
    }

    /// Transition a pending job to processing.
    ///
    /// Returns `false` if the job was not in `pending` state, in which
    /// case nothing was written. The execution unit treats that as a
    /// claim failure and does not run the pipeline.
    pub async fn mark_processing(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs \
             SET status_id = $2, updated_at = NOW() \
             WHERE id = $1 AND status_id = $3",
        )
        .bind(id)
        .bind(JobStatus::Processing.id())
        .bind(JobStatus::Pending.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Update the current step and progress percentage.
    ///
    /// Last-write-wins; no monotonicity check. Only non-terminal jobs
    /// are touched, so a late progress report can never mutate a job
    /// that already reached its terminal state.
    pub async fn update_progress(
        pool: &PgPool,
        id: DbId,
        step: &str,
        progress: i16,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE jobs \
             SET current_step = $2, progress = $3, updated_at = NOW() \
             WHERE id = $1 AND status_id IN ($4, $5)",
        )
        .bind(id)
        .bind(step)
        .bind(progress)
        .bind(JobStatus::Pending.id())
        .bind(JobStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Update step/progress and append a log entry in one atomic statement.
    pub async fn update_progress_with_log(
        pool: &PgPool,
        id: DbId,
        step: &str,
        progress: i16,
        entry: &LogEntry,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE jobs \
             SET current_step = $2, progress = $3, \
                 logs = logs || jsonb_build_array($4::jsonb), \
                 updated_at = NOW() \
             WHERE id = $1 AND status_id IN ($5, $6)",
        )
        .bind(id)
        .bind(step)
        .bind(progress)
        .bind(Json(entry))
        .bind(JobStatus::Pending.id())
        .bind(JobStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark a processing job as completed with its result payload.
    ///
    /// Sets `progress` to 100 and stamps `completed_at`. Returns `false`
    /// if the job was not in `processing` state.
    pub async fn complete(
        pool: &PgPool,
        id: DbId,
        result: &serde_json::Value,
    ) -> Result<bool, sqlx::Error> {
        let outcome = sqlx::query(
            "UPDATE jobs \
             SET status_id = $2, result = $3, progress = 100, \
                 completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id = $4",
        )
        .bind(id)
        .bind(JobStatus::Completed.id())
        .bind(result)
        .bind(JobStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(outcome.rows_affected() > 0)
    }

    /// Mark a job as failed with an error message and a final log entry.
    ///
    /// `progress` is left at the last reported value so callers can see
    /// how far the run got. Returns `false` if the job was already in a
    /// terminal state.
    pub async fn fail(
        pool: &PgPool,
        id: DbId,
        error: &str,
        entry: &LogEntry,
    ) -> Result<bool, sqlx::Error> {
        let outcome = sqlx::query(
            "UPDATE jobs \
             SET status_id = $2, error_message = $3, \
                 logs = logs || jsonb_build_array($4::jsonb), \
                 completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id IN ($5, $6)",
        )
        .bind(id)
        .bind(JobStatus::Failed.id())
        .bind(error)
        .bind(Json(entry))
        .bind(JobStatus::Pending.id())
        .bind(JobStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(outcome.rows_affected() > 0)
    }
}
