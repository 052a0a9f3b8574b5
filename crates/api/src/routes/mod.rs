pub mod health;
pub mod workflows;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /workflows/templates             list, create
/// /workflows/templates/{id}        update, delete
/// /workflows                       list, start
/// /workflows/{id}                  detail (?include_jobs)
/// /workflows/{id}/cancel           request cancellation
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/workflows", workflows::router())
}
