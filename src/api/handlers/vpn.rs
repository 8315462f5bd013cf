use crate::api::dto::response::ApiResponse;
use crate::api::dto::vpn::{BlueprintResponse, CreateBlueprintRequest, OperationRecordResponse};
use crate::api::routes::AppState;
use crate::error::{AppError, Result};
use crate::services::OperationReport;
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};

type ReportResponse = (StatusCode, Json<ApiResponse<OperationReport>>);

fn report(status: StatusCode, fallback: &str, report: OperationReport) -> ReportResponse {
    let text = report
        .summary
        .clone()
        .unwrap_or_else(|| fallback.to_string());
    (status, Json(ApiResponse::with_data(text, report)))
}

pub async fn init(
    State(state): State<AppState>,
    Path((resource_group_id, scope)): Path<(String, String)>,
) -> Result<ReportResponse> {
    let result = state.orchestrator.init(&resource_group_id, &scope).await?;
    Ok(report(StatusCode::CREATED, "Initialized", result))
}

pub async fn create_blueprint(
    State(state): State<AppState>,
    Path((resource_group_id, scope)): Path<(String, String)>,
    body: std::result::Result<Json<CreateBlueprintRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<BlueprintResponse>>)> {
    let Json(req) = body.map_err(|e| AppError::Validation(e.body_text()))?;
    if let Some(body_id) = req.resource_group_id.as_deref() {
        if body_id != resource_group_id {
            return Err(AppError::Validation(format!(
                "Body resourceGroupId '{}' does not match path '{}'",
                body_id, resource_group_id
            )));
        }
    }

    let workspace =
        state
            .orchestrator
            .create_blueprint(&resource_group_id, &scope, &req.tf_vars)?;
    let response = BlueprintResponse {
        resource_group_id,
        scope,
        path: workspace.blueprint_path().display().to_string(),
    };
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_data("Blueprint created", response)),
    ))
}

pub async fn plan(
    State(state): State<AppState>,
    Path((resource_group_id, scope)): Path<(String, String)>,
) -> Result<ReportResponse> {
    let result = state.orchestrator.plan(&resource_group_id, &scope).await?;
    Ok(report(StatusCode::OK, "Planned", result))
}

pub async fn apply(
    State(state): State<AppState>,
    Path((resource_group_id, scope)): Path<(String, String)>,
) -> Result<ReportResponse> {
    let result = state.orchestrator.apply(&resource_group_id, &scope).await?;
    Ok(report(StatusCode::CREATED, "Applied", result))
}

pub async fn destroy(
    State(state): State<AppState>,
    Path((resource_group_id, scope)): Path<(String, String)>,
) -> Result<ReportResponse> {
    let result = state.orchestrator.destroy(&resource_group_id, &scope).await?;
    Ok(report(StatusCode::OK, "Destroyed", result))
}

pub async fn get_state(
    State(state): State<AppState>,
    Path((resource_group_id, scope)): Path<(String, String)>,
) -> Result<ReportResponse> {
    let result = state
        .orchestrator
        .get_state(&resource_group_id, &scope)
        .await?;
    Ok(report(StatusCode::OK, "Current state", result))
}

pub async fn status(
    State(state): State<AppState>,
    Path((resource_group_id, scope)): Path<(String, String)>,
) -> Result<Json<ApiResponse<Vec<OperationRecordResponse>>>> {
    let records = state
        .orchestrator
        .status(&resource_group_id, Some(&scope))?;
    let data = records
        .into_iter()
        .map(OperationRecordResponse::from)
        .collect::<Vec<_>>();
    Ok(Json(ApiResponse::with_data(
        format!("{} operation record(s)", data.len()),
        data,
    )))
}

pub async fn clear_scope(
    State(state): State<AppState>,
    Path((resource_group_id, scope)): Path<(String, String)>,
) -> Result<Json<ApiResponse<()>>> {
    state
        .orchestrator
        .clear_workspace(&resource_group_id, Some(&scope))
        .await?;
    Ok(Json(ApiResponse::message(format!(
        "Cleared {}/{}",
        resource_group_id, scope
    ))))
}
