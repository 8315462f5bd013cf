use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl ApiResponse<()> {
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            success: true,
            text: text.into(),
            data: None,
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn with_data(text: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            text: text.into(),
            data: Some(data),
        }
    }
}
