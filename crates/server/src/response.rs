//! Structured error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use kbchat_core::AppError;
use serde::{Deserialize, Serialize};

/// Body of every non-streamed response: `{code, msg}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseResponse {
    pub code: u16,
    pub msg: String,
}

impl BaseResponse {
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            code: status.as_u16(),
            msg: msg.into(),
        }
    }
}

/// An `AppError` on its way to the client.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::UnsupportedModel(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Retrieval(_) | AppError::Llm(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        } else {
            tracing::warn!("Request rejected: {}", self.0);
        }

        (status, Json(BaseResponse::new(status, self.0.to_string()))).into_response()
    }
}
