//! The [`ProgressSink`] implementation bound to one persisted job.

use async_trait::async_trait;
use tutorgen_core::error::CoreError;
use tutorgen_core::progress::ProgressSink;
use tutorgen_core::types::DbId;
use tutorgen_db::models::job::LogEntry;
use tutorgen_db::repositories::JobRepo;
use tutorgen_db::DbPool;

/// Converts pipeline progress callbacks into atomic job-record updates.
///
/// One reporter exists per execution, bound to a single job id. It is a
/// dumb sink: values are clamped to the valid range but otherwise taken
/// as-is (last-write-wins, no monotonicity enforcement), and a message
/// always becomes an INFO log entry appended in the same statement as
/// the step/progress update.
pub struct JobProgressReporter {
    pool: DbPool,
    job_id: DbId,
}

impl JobProgressReporter {
    pub fn new(pool: DbPool, job_id: DbId) -> Self {
        Self { pool, job_id }
    }
}

#[async_trait]
impl ProgressSink for JobProgressReporter {
    async fn report(
        &self,
        step: &str,
        progress: u8,
        message: Option<&str>,
    ) -> Result<(), CoreError> {
        let progress = i16::from(progress.min(100));

        let outcome = match message {
            Some(message) => {
                JobRepo::update_progress_with_log(
                    &self.pool,
                    self.job_id,
                    step,
                    progress,
                    &LogEntry::info(step, progress, message),
                )
                .await
            }
            None => JobRepo::update_progress(&self.pool, self.job_id, step, progress).await,
        };

        outcome.map_err(|e| {
            CoreError::Internal(format!(
                "Failed to persist progress for job {}: {e}",
                self.job_id
            ))
        })
    }
}
