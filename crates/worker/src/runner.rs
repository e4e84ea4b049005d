//! Builds execution units: the function a pool worker runs for one job.
//!
//! An execution unit is the sole writer of its job's mutable fields. It
//! claims the job (pending -> processing), drives the pipeline with a
//! progress reporter, and persists exactly one terminal state. Pipeline
//! errors and panics are both converted into the job's `failed` state;
//! nothing propagates past the unit boundary except the unit's own
//! bookkeeping result, which the pool logs.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tutorgen_core::error::CoreError;
use tutorgen_core::generation::GenerationConfig;
use tutorgen_core::pipeline::Pipeline;
use tutorgen_core::types::DbId;
use tutorgen_db::models::job::LogEntry;
use tutorgen_db::repositories::JobRepo;
use tutorgen_db::DbPool;

use crate::pool::{panic_message, UnitFuture};
use crate::reporter::JobProgressReporter;

/// Factory for job execution units.
///
/// Cheap to clone into handlers: holds only the database pool and the
/// pipeline implementation.
#[derive(Clone)]
pub struct JobRunner {
    pool: DbPool,
    pipeline: Arc<dyn Pipeline>,
}

impl JobRunner {
    pub fn new(pool: DbPool, pipeline: Arc<dyn Pipeline>) -> Self {
        Self { pool, pipeline }
    }

    /// Build the execution unit for one created job.
    pub fn execution_unit(&self, job_id: DbId, config: GenerationConfig) -> UnitFuture {
        let pool = self.pool.clone();
        let pipeline = Arc::clone(&self.pipeline);
        Box::pin(run_job(pool, pipeline, job_id, config))
    }
}

async fn run_job(
    pool: DbPool,
    pipeline: Arc<dyn Pipeline>,
    job_id: DbId,
    config: GenerationConfig,
) -> Result<(), CoreError> {
    let claimed = JobRepo::mark_processing(&pool, job_id)
        .await
        .map_err(|e| storage_error(job_id, e))?;
    if !claimed {
        return Err(CoreError::Internal(format!(
            "Job {job_id} was not in pending state; refusing to run"
        )));
    }

    tracing::info!(job_id, source = config.source_label(), "Job execution started");

    let reporter = JobProgressReporter::new(pool.clone(), job_id);
    let outcome = AssertUnwindSafe(pipeline.run(&config, &reporter))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(output)) => match serde_json::to_value(&output) {
            Ok(result) => {
                let completed = JobRepo::complete(&pool, job_id, &result)
                    .await
                    .map_err(|e| storage_error(job_id, e))?;
                if completed {
                    tracing::info!(job_id, chapters = output.chapters.len(), "Job completed");
                } else {
                    // Should be unreachable under single-writer discipline.
                    tracing::warn!(job_id, "Job left processing state before its completion write");
                }
            }
            Err(e) => {
                persist_failure(&pool, job_id, &format!("Result serialization failed: {e}"))
                    .await?;
            }
        },
        Ok(Err(error)) => {
            persist_failure(&pool, job_id, &error.to_string()).await?;
        }
        Err(panic) => {
            persist_failure(
                &pool,
                job_id,
                &format!("Unexpected fault: {}", panic_message(panic.as_ref())),
            )
            .await?;
        }
    }

    Ok(())
}

/// Write the `failed` terminal state, preserving the last reported
/// progress and logging the failure into the job's log sequence.
async fn persist_failure(pool: &DbPool, job_id: DbId, message: &str) -> Result<(), CoreError> {
    tracing::warn!(job_id, error = message, "Job failed");

    // Snapshot step/progress so the final log entry reflects how far the
    // run got before the fault.
    let (step, progress) = match JobRepo::find_by_id(pool, job_id).await {
        Ok(Some(job)) => (
            job.current_step.unwrap_or_else(|| "Failed".to_string()),
            job.progress,
        ),
        _ => ("Failed".to_string(), 0),
    };

    let failed = JobRepo::fail(
        pool,
        job_id,
        message,
        &LogEntry::error(&step, progress, message),
    )
    .await
    .map_err(|e| storage_error(job_id, e))?;

    if !failed {
        tracing::warn!(job_id, "Job was already terminal when its failure write arrived");
    }
    Ok(())
}

fn storage_error(job_id: DbId, e: sqlx::Error) -> CoreError {
    CoreError::Internal(format!("Storage error for job {job_id}: {e}"))
}
