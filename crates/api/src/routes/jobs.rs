//! Route definitions for the `/jobs` resource.
//!
//! All endpoints require authentication.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// GET    /               -> list_jobs
/// POST   /               -> create_job
/// GET    /{id}           -> get_job
/// GET    /{id}/download  -> download_artifact
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(jobs::list_jobs).post(jobs::create_job))
        .route("/{id}", get(jobs::get_job))
        .route("/{id}/download", get(jobs::download_artifact))
}
