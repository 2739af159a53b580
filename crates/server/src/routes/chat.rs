//! `POST /chat/knowledge_base_chat`.

use crate::response::ApiError;
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use kbchat_core::AppError;
use kbchat_knowledge::KnowledgeChatRequest;
use tracing::Instrument;

/// Answer a question from a knowledge base as a server-sent event stream.
///
/// Each event is one JSON object `{uuid, answer, docs, reference, prompt}`
/// in an SSE `data:` frame. Failures detected before the model starts are
/// returned as a plain `{code, msg}` body; a provider failure afterwards
/// aborts the event stream.
pub async fn knowledge_base_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<KnowledgeChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) =
        payload.map_err(|e| AppError::InvalidRequest(e.body_text()))?;

    let model = request
        .model_name
        .clone()
        .unwrap_or_else(|| state.chat().settings().default_model.clone());
    let span = tracing::info_span!(
        "knowledge_base_chat",
        kb = %request.knowledge_base_name,
        model = %model
    );

    let base_url = state.base_url(&headers);
    let session = state
        .chat()
        .prepare(request, &base_url)
        .instrument(span.clone())
        .await?;

    let events = session
        .into_events()
        .map(move |item| -> Result<Event, AppError> {
            let _entered = span.enter();
            match item {
                Ok(event) => Ok(Event::default().data(serde_json::to_string(&event)?)),
                Err(e) => {
                    tracing::error!("Aborting event stream: {}", e);
                    Err(e)
                }
            }
        });

    Ok(Sse::new(events)
        .keep_alive(KeepAlive::new())
        .into_response())
}
