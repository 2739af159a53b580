//! `GET /knowledge_base/download_doc`.

use crate::response::ApiError;
use crate::state::AppState;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use kbchat_core::AppError;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    pub knowledge_base_name: String,
    pub file_name: String,
}

/// Serve an original document from `<root>/<kb>/content/<file_name>`.
pub async fn download_doc(
    State(state): State<AppState>,
    params: Result<Query<DownloadParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params.map_err(|e| AppError::InvalidRequest(e.body_text()))?;

    let path = kbchat_knowledge::config::resolve_document(
        state.knowledge_root(),
        &params.knowledge_base_name,
        &params.file_name,
    )?;

    let bytes = tokio::fs::read(&path).await.map_err(AppError::from)?;

    tracing::debug!("Serving {:?} ({} bytes)", path, bytes.len());

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(&params.file_name)),
        ],
        bytes,
    )
        .into_response())
}

/// `attachment` disposition with an RFC 5987 encoded filename.
fn content_disposition(file_name: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(file_name.as_bytes())
        .collect::<String>()
        .replace('+', "%20");
    format!("attachment; filename*=UTF-8''{}", encoded)
}
