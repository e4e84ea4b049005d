use std::sync::Arc;

use tutorgen_worker::{JobRunner, JobSubmitter};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already
/// `Clone`). The worker pool itself stays with the entrypoint; handlers
/// only hold its submission handle.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: tutorgen_db::DbPool,
    /// Server configuration (accessed by middleware and handlers).
    pub config: Arc<ServerConfig>,
    /// Submission handle for the bounded worker pool.
    pub submitter: JobSubmitter,
    /// Factory for job execution units (pool handle + pipeline).
    pub runner: JobRunner,
}
