pub mod auth;
pub mod health;
pub mod jobs;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /auth/register                     register (public)
/// /auth/login                        login (public)
/// /auth/me                           current user (requires auth)
///
/// /jobs                              list, create (requires auth)
/// /jobs/{id}                         status snapshot (requires auth)
/// /jobs/{id}/download                rendered artifact (requires auth)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/jobs", jobs::router())
}
