//! Handlers for the `/workflows/templates` resource.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use homelab_core::error::CoreError;
use homelab_core::types::DbId;
use homelab_store::models::template::{CreateTemplate, UpdateTemplate};
use homelab_store::repositories::{InstanceRepo, TemplateRepo};

use crate::error::{AppError, AppResult};
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/workflows/templates
///
/// Create a workflow template. Returns 201 with the created record, or
/// 400 if the name or step graph fails validation.
pub async fn create_template(
    State(state): State<AppState>,
    Json(input): Json<CreateTemplate>,
) -> AppResult<impl IntoResponse> {
    let template = TemplateRepo::create(&state.store, input).await?;

    tracing::info!(
        template_id = template.id,
        name = %template.name,
        steps = template.steps.len(),
        "Template created",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: template })))
}

/// GET /api/v1/workflows/templates
///
/// List templates in insertion order, paginated via `page` / `per_page`.
pub async fn list_templates(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> AppResult<impl IntoResponse> {
    let (limit, offset) = params.to_limit_offset();
    let templates = TemplateRepo::list(&state.store, Some(limit), Some(offset)).await;
    Ok(Json(DataResponse { data: templates }))
}

/// PUT /api/v1/workflows/templates/{id}
///
/// Replace a template's name, description, and step list. In-flight and
/// historical instances are unaffected (they hold a snapshot).
pub async fn update_template(
    State(state): State<AppState>,
    Path(template_id): Path<DbId>,
    Json(input): Json<UpdateTemplate>,
) -> AppResult<impl IntoResponse> {
    let template = TemplateRepo::update(&state.store, template_id, input).await?;

    tracing::info!(template_id, "Template updated");

    Ok(Json(DataResponse { data: template }))
}

/// DELETE /api/v1/workflows/templates/{id}
///
/// Delete a template. Returns 409 while any non-terminal instance still
/// references it; finished instances keep their own snapshot and are
/// unaffected.
pub async fn delete_template(
    State(state): State<AppState>,
    Path(template_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    if InstanceRepo::has_active_for_template(&state.store, template_id).await {
        return Err(AppError::Core(CoreError::Conflict(format!(
            "Template {template_id} is referenced by a running workflow instance"
        ))));
    }

    if !TemplateRepo::delete(&state.store, template_id).await {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Template",
            id: template_id,
        }));
    }

    tracing::info!(template_id, "Template deleted");

    Ok(Json(DataResponse {
        data: json!({ "deleted": true }),
    }))
}
