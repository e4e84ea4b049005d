//! Handlers for the `/jobs` resource.
//!
//! All endpoints require authentication via [`AuthUser`]. Every lookup
//! is owner-scoped: a job that exists but belongs to someone else is
//! indistinguishable from a job that does not exist.

use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tutorgen_core::error::CoreError;
use tutorgen_core::generation::{GenerationConfig, GenerationOutput};
use tutorgen_core::types::DbId;
use tutorgen_db::models::job::{Job, JobSnapshot, LogEntry};
use tutorgen_db::models::status::JobStatus;
use tutorgen_db::repositories::JobRepo;
use tutorgen_worker::PoolError;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::render;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Response body for `POST /jobs`.
#[derive(Debug, Serialize)]
pub struct CreateJobResponse {
    pub job_id: DbId,
}

/// Query parameters for `GET /jobs/{id}/download`.
#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    /// Target document format. Only `html` is supported.
    pub format: Option<String>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Fetch a job by ID, scoped to the caller.
///
/// Missing jobs and other users' jobs produce the same `NotFound`.
async fn find_owned(pool: &sqlx::PgPool, job_id: DbId, auth: &AuthUser) -> AppResult<Job> {
    JobRepo::find_by_id_for_owner(pool, job_id, auth.user_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        }))
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Start a new generation job. Returns 201 with the job id immediately;
/// execution happens on the worker pool. When the pool queue is
/// saturated the request is rejected with 503 before any record exists.
pub async fn create_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(config): Json<GenerationConfig>,
) -> AppResult<impl IntoResponse> {
    config.validate().map_err(AppError::Core)?;

    // Reserve pool capacity first so a saturated queue never leaves an
    // orphaned pending record behind.
    let permit = state.submitter.try_reserve().map_err(|e| match e {
        PoolError::QueueFull | PoolError::Closed => AppError::QueueFull,
    })?;

    let source = config.source_label().to_string();
    let mut config_json = serde_json::to_value(&config)
        .map_err(|e| AppError::InternalError(format!("Config serialization error: {e}")))?;
    // The access credential is only needed in-memory for the fetch;
    // never persist it with the job record.
    if let Some(fields) = config_json.as_object_mut() {
        fields.remove("access_token");
    }
    let seed_log = LogEntry::info("Initializing", 0, &format!("Job created for source: {source}"));

    let job = JobRepo::create(&state.pool, auth.user_id, &config_json, &seed_log).await?;

    let unit = state.runner.execution_unit(job.id, config);
    let handle = permit.submit(format!("job-{}", job.id), unit);

    // The pool logs unit faults itself; this watcher additionally
    // surfaces units abandoned during shutdown.
    let job_id = job.id;
    tokio::spawn(async move {
        if let Err(error) = handle.wait().await {
            tracing::warn!(job_id, %error, "Execution unit did not complete cleanly");
        }
    });

    tracing::info!(job_id = job.id, user_id = auth.user_id, %source, "Job submitted");

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: CreateJobResponse { job_id: job.id },
        }),
    ))
}

// ---------------------------------------------------------------------------
// Status / list
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}
///
/// Full snapshot of one job: status, progress, step, logs, and the
/// result or error once terminal.
pub async fn get_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = find_owned(&state.pool, job_id, &auth).await?;
    Ok(Json(DataResponse {
        data: JobSnapshot::from(job),
    }))
}

/// GET /api/v1/jobs
///
/// List the caller's jobs, newest first.
pub async fn list_jobs(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let jobs = JobRepo::list_by_owner(&state.pool, auth.user_id).await?;
    let snapshots: Vec<JobSnapshot> = jobs.into_iter().map(JobSnapshot::from).collect();
    Ok(Json(DataResponse { data: snapshots }))
}

// ---------------------------------------------------------------------------
// Artifact download
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}/download?format=html
///
/// Render a completed job's result as a downloadable document. Fails
/// with 409 while the job is still running and 404 when the result
/// carries no chapters; a partial document is never returned.
pub async fn download_artifact(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    Query(query): Query<DownloadQuery>,
) -> AppResult<impl IntoResponse> {
    let format = query.format.as_deref().unwrap_or("html");
    if format != "html" {
        return Err(AppError::Core(CoreError::Validation(format!(
            "Unsupported format \"{format}\"; only html is available"
        ))));
    }

    let job = find_owned(&state.pool, job_id, &auth).await?;

    if job.status_id != JobStatus::Completed.id() {
        return Err(AppError::Core(CoreError::Conflict(
            "Job is not completed yet".into(),
        )));
    }

    let result = job.result.ok_or(AppError::Core(CoreError::NotFound {
        entity: "Tutorial content",
        id: job_id,
    }))?;
    let output: GenerationOutput = serde_json::from_value(result)
        .map_err(|e| AppError::InternalError(format!("Stored result is not renderable: {e}")))?;
    if output.chapters.is_empty() {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Tutorial content",
            id: job_id,
        }));
    }

    let completed_at = job.completed_at.unwrap_or(job.updated_at);
    let html = render::tutorial_html(job_id, &output, completed_at);

    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, "text/html; charset=utf-8".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"tutorial-{job_id}.html\""),
            ),
        ],
        html,
    ))
}
