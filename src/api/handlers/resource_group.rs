use crate::api::dto::response::ApiResponse;
use crate::api::dto::vpn::OperationRecordResponse;
use crate::api::routes::AppState;
use crate::error::Result;
use axum::{
    Json,
    extract::{Path, State},
};

pub async fn clear_resource_group(
    State(state): State<AppState>,
    Path(resource_group_id): Path<String>,
) -> Result<Json<ApiResponse<()>>> {
    let removed = state
        .orchestrator
        .clear_workspace(&resource_group_id, None)
        .await?;
    let text = if removed {
        format!("Cleared resource group {}", resource_group_id)
    } else {
        format!("Resource group {} was already cleared", resource_group_id)
    };
    Ok(Json(ApiResponse::message(text)))
}

pub async fn resource_group_status(
    State(state): State<AppState>,
    Path(resource_group_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<OperationRecordResponse>>>> {
    let records = state.orchestrator.status(&resource_group_id, None)?;
    let data = records
        .into_iter()
        .map(OperationRecordResponse::from)
        .collect::<Vec<_>>();
    Ok(Json(ApiResponse::with_data(
        format!("{} operation record(s)", data.len()),
        data,
    )))
}
