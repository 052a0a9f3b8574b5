//! Route definitions for the `/workflows` resource.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::{templates, workflows};
use crate::state::AppState;

/// Routes mounted at `/workflows`.
///
/// ```text
/// GET    /templates        -> list_templates
/// POST   /templates        -> create_template
/// PUT    /templates/{id}   -> update_template
/// DELETE /templates/{id}   -> delete_template
/// GET    /                 -> list_workflows
/// POST   /                 -> start_workflow
/// GET    /{id}             -> get_workflow
/// POST   /{id}/cancel      -> cancel_workflow
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/templates",
            get(templates::list_templates).post(templates::create_template),
        )
        .route(
            "/templates/{id}",
            put(templates::update_template).delete(templates::delete_template),
        )
        .route(
            "/",
            get(workflows::list_workflows).post(workflows::start_workflow),
        )
        .route("/{id}", get(workflows::get_workflow))
        .route("/{id}/cancel", post(workflows::cancel_workflow))
}
