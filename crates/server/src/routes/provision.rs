use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use db::RunFilter;
use factory_core::{validate_project_slug, ProvisionRequest, ProvisionRun, ProvisionState};
use orchestrator::{RunReport, WaitMode};
use serde::Deserialize;
use tracing::info;
use utoipa::IntoParams;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct StatusQuery {
    /// Tenant project slug
    pub project_slug: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RunsQuery {
    /// Only runs in this state, e.g. `FAILED`
    pub state: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/provision/start",
    request_body = ProvisionRequest,
    responses(
        (status = 202, description = "Provisioning started", body = ProvisionRun),
        (status = 400, description = "Invalid project slug")
    ),
    tag = "provision"
)]
pub async fn start_provisioning(
    State(state): State<AppState>,
    Json(payload): Json<ProvisionRequest>,
) -> Result<(StatusCode, Json<ProvisionRun>), AppError> {
    let run = state.orchestrator.ensure_run(&payload.project_slug).await?;

    info!(project_slug = %run.project_slug, state = %run.state, "Provisioning requested");
    state
        .orchestrator
        .spawn(run.project_slug.clone(), WaitMode::Poll);

    Ok((StatusCode::ACCEPTED, Json(run)))
}

#[utoipa::path(
    post,
    path = "/api/provision/resume",
    request_body = ProvisionRequest,
    responses(
        (status = 200, description = "Run advanced as far as possible", body = RunReport),
        (status = 400, description = "Invalid project slug"),
        (status = 404, description = "Run not found"),
        (status = 409, description = "Run is already being driven")
    ),
    tag = "provision"
)]
pub async fn resume_provisioning(
    State(state): State<AppState>,
    Json(payload): Json<ProvisionRequest>,
) -> Result<Json<RunReport>, AppError> {
    let report = state
        .orchestrator
        .resume(&payload.project_slug, WaitMode::Checkpoint)
        .await?;
    Ok(Json(report))
}

#[utoipa::path(
    get,
    path = "/api/provision/status",
    params(StatusQuery),
    responses(
        (status = 200, description = "Run snapshot", body = ProvisionRun),
        (status = 400, description = "Invalid project slug"),
        (status = 404, description = "Run not found")
    ),
    tag = "provision"
)]
pub async fn get_provision_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<ProvisionRun>, AppError> {
    validate_project_slug(&query.project_slug)?;

    match state.store().find_by_slug(&query.project_slug).await? {
        Some(run) => Ok(Json(run)),
        None => Err(AppError::NotFound(format!(
            "Provision run not found: {}",
            query.project_slug
        ))),
    }
}

#[utoipa::path(
    delete,
    path = "/api/provision",
    request_body = ProvisionRequest,
    responses(
        (status = 204, description = "Run deleted"),
        (status = 400, description = "Invalid project slug"),
        (status = 404, description = "Run not found"),
        (status = 409, description = "Run is being driven")
    ),
    tag = "provision"
)]
pub async fn delete_provision_run(
    State(state): State<AppState>,
    Json(payload): Json<ProvisionRequest>,
) -> Result<StatusCode, AppError> {
    validate_project_slug(&payload.project_slug)?;

    if state.orchestrator.is_active(&payload.project_slug) {
        return Err(AppError::Conflict(format!(
            "Provisioning is running for {}",
            payload.project_slug
        )));
    }

    if state.store().delete(&payload.project_slug).await? {
        info!(project_slug = %payload.project_slug, "Provision run deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!(
            "Provision run not found: {}",
            payload.project_slug
        )))
    }
}

#[utoipa::path(
    get,
    path = "/api/provision/runs",
    params(RunsQuery),
    responses(
        (status = 200, description = "Runs, newest first", body = Vec<ProvisionRun>),
        (status = 400, description = "Unknown state")
    ),
    tag = "provision"
)]
pub async fn list_provision_runs(
    State(state): State<AppState>,
    Query(query): Query<RunsQuery>,
) -> Result<Json<Vec<ProvisionRun>>, AppError> {
    let state_filter = match query.state.as_deref() {
        Some(name) => Some(
            ProvisionState::parse(name)
                .ok_or_else(|| AppError::BadRequest(format!("Unknown provision state: {}", name)))?,
        ),
        None => None,
    };

    let runs = state
        .store()
        .list(&RunFilter {
            state: state_filter,
        })
        .await?;
    Ok(Json(runs))
}
