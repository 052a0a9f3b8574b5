//! Handlers for the `/workflows` resource (instance lifecycle).
//!
//! Execution failures never surface as HTTP errors: a started workflow
//! that later fails is still a successful `POST /workflows`. Callers
//! observe progress by polling the list/detail endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use homelab_core::error::CoreError;
use homelab_core::status::InstanceStatus;
use homelab_core::types::DbId;
use homelab_engine::StartWorkflow;
use homelab_store::models::instance::{InstanceFilter, WorkflowInstance};
use homelab_store::models::job::StepJob;
use homelab_store::repositories::{InstanceRepo, JobRepo};

use crate::error::{AppError, AppResult};
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /workflows`.
#[derive(Debug, Deserialize)]
pub struct StartWorkflowRequest {
    pub template_id: DbId,
    pub device_ids: Vec<String>,
    #[serde(default)]
    pub rollback_on_failure: bool,
    #[serde(default)]
    pub extra_vars: Option<serde_json::Value>,
    #[serde(default)]
    pub vault_secret_id: Option<String>,
}

/// Query parameters for `GET /workflows`.
///
/// Pagination fields are spelled out rather than flattened in; flattened
/// structs make `serde_urlencoded` reject numeric parameters.
#[derive(Debug, Deserialize)]
pub struct WorkflowListQuery {
    pub template_id: Option<DbId>,
    /// Aggregate status filter (e.g. `failed`, `rolled_back`).
    pub status: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Query parameters for `GET /workflows/{id}`.
#[derive(Debug, Deserialize)]
pub struct WorkflowDetailQuery {
    #[serde(default)]
    pub include_jobs: bool,
}

/// Instance detail; `jobs` (with their potentially large log payloads) is
/// attached only when requested.
#[derive(Debug, Serialize)]
pub struct WorkflowDetail {
    #[serde(flatten)]
    pub instance: WorkflowInstance,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<Vec<StepJob>>,
}

// ---------------------------------------------------------------------------
// Start
// ---------------------------------------------------------------------------

/// POST /api/v1/workflows
///
/// Start a workflow instance. Returns 201 with the `pending` record;
/// execution proceeds in the background.
pub async fn start_workflow(
    State(state): State<AppState>,
    Json(input): Json<StartWorkflowRequest>,
) -> AppResult<impl IntoResponse> {
    let instance = state
        .scheduler
        .start(StartWorkflow {
            template_id: input.template_id,
            device_ids: input.device_ids,
            rollback_on_failure: input.rollback_on_failure,
            extra_vars: input.extra_vars,
            vault_secret_id: input.vault_secret_id,
        })
        .await?;

    tracing::info!(
        instance_id = instance.id,
        template_id = instance.template_id,
        "Workflow started",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: instance })))
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// GET /api/v1/workflows
///
/// List instances, newest first. `template_id` and `status` filters are
/// AND-combined.
pub async fn list_workflows(
    State(state): State<AppState>,
    Query(params): Query<WorkflowListQuery>,
) -> AppResult<impl IntoResponse> {
    let status = params
        .status
        .as_deref()
        .map(|s| s.parse::<InstanceStatus>())
        .transpose()
        .map_err(AppError::BadRequest)?;

    let pagination = PaginationParams {
        page: params.page,
        per_page: params.per_page,
    };
    let (limit, offset) = pagination.to_limit_offset();
    let instances = InstanceRepo::list(
        &state.store,
        &InstanceFilter {
            template_id: params.template_id,
            status,
            limit: Some(limit),
            offset: Some(offset),
        },
    )
    .await;

    Ok(Json(DataResponse { data: instances }))
}

// ---------------------------------------------------------------------------
// Detail
// ---------------------------------------------------------------------------

/// GET /api/v1/workflows/{id}
///
/// Instance detail. Pass `include_jobs=true` to attach per-step job
/// records with their log output.
pub async fn get_workflow(
    State(state): State<AppState>,
    Path(instance_id): Path<DbId>,
    Query(params): Query<WorkflowDetailQuery>,
) -> AppResult<impl IntoResponse> {
    let instance = InstanceRepo::find_by_id(&state.store, instance_id)
        .await
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "WorkflowInstance",
            id: instance_id,
        }))?;

    let jobs = if params.include_jobs {
        Some(JobRepo::list_by_instance(&state.store, instance_id).await)
    } else {
        None
    };

    Ok(Json(DataResponse {
        data: WorkflowDetail { instance, jobs },
    }))
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

/// POST /api/v1/workflows/{id}/cancel
///
/// Request cooperative cancellation. Returns 202 with the flagged record
/// (dispatched steps finish; nothing new is dispatched), or 409 if the
/// instance is already terminal.
pub async fn cancel_workflow(
    State(state): State<AppState>,
    Path(instance_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let instance = state.scheduler.cancel(instance_id).await?;

    tracing::info!(instance_id, "Workflow cancellation accepted");

    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: instance })))
}
