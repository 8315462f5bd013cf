use crate::models::{Action, EngineAction};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Operation in progress: {action} is running on {resource_group_id}/{scope}")]
    OperationInProgress {
        resource_group_id: String,
        scope: String,
        action: Action,
    },

    #[error("Workspace in use: {0}")]
    WorkspaceInUse(String),

    #[error("Init required for {resource_group_id}/{scope}")]
    InitRequired {
        resource_group_id: String,
        scope: String,
    },

    #[error("Plan required for {resource_group_id}/{scope}")]
    PlanRequired {
        resource_group_id: String,
        scope: String,
    },

    #[error("Not initialized: nothing has been applied to {resource_group_id}/{scope}")]
    NotInitialized {
        resource_group_id: String,
        scope: String,
    },

    #[error("Engine {action} failed (exit code {exit_code:?})")]
    EngineExecutionFailed {
        action: EngineAction,
        exit_code: Option<i32>,
        output: String,
    },

    #[error("Engine {action} timed out after {after_secs}s")]
    Timeout { action: EngineAction, after_secs: u64 },

    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Persistence error: {0}")]
    Persistence(#[from] serde_json::Error),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Unauthorized")]
    Unauthorized,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidIdentifier(_)
            | AppError::Validation(_)
            | AppError::InitRequired { .. }
            | AppError::PlanRequired { .. }
            | AppError::NotInitialized { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::OperationInProgress { .. }
            | AppError::WorkspaceInUse(_)
            | AppError::EngineExecutionFailed { .. }
            | AppError::Timeout { .. }
            | AppError::EngineUnavailable(_)
            | AppError::Io(_)
            | AppError::Persistence(_)
            | AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let text = match &self {
            AppError::Io(e) => {
                tracing::error!("IO error: {}", e);
                self.to_string()
            }
            AppError::Persistence(e) => {
                tracing::error!("Persistence error: {}", e);
                self.to_string()
            }
            AppError::EngineExecutionFailed { output, .. } if !output.is_empty() => {
                format!("{}\n{}", self, output)
            }
            _ => self.to_string(),
        };

        let body = json!({
            "success": false,
            "text": text,
        });

        let mut response = (status, Json(body)).into_response();
        if matches!(self, AppError::Unauthorized) {
            response.headers_mut().insert(
                axum::http::header::WWW_AUTHENTICATE,
                axum::http::HeaderValue::from_static("Basic realm=\"terrarium\""),
            );
        }
        response
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
