use crate::api::dto::response::ApiResponse;
use crate::api::routes::AppState;
use crate::error::{AppError, Result};
use axum::{Json, extract::State, http::Version};
use std::sync::atomic::Ordering;

pub async fn readyz(State(state): State<AppState>) -> Result<Json<ApiResponse<()>>> {
    if !state.ready.load(Ordering::Acquire) {
        return Err(AppError::ServiceUnavailable(
            "terrarium is not ready".to_string(),
        ));
    }
    Ok(Json(ApiResponse::message("terrarium is ready")))
}

pub async fn http_version(version: Version) -> Json<ApiResponse<()>> {
    let version = format!("{:?}", version);
    tracing::info!(version = %version, "Incoming request HTTP version");
    Json(ApiResponse::message(version))
}

pub async fn tofu_version(State(state): State<AppState>) -> Result<Json<ApiResponse<()>>> {
    let version = state.orchestrator.engine_version().await?;
    Ok(Json(ApiResponse::message(version)))
}
