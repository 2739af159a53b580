//! HTTP surface of the knowledge-base chat service.
//!
//! Routes:
//! - `POST /chat/knowledge_base_chat`: retrieval-augmented chat as SSE
//! - `GET /knowledge_base/download_doc`: original documents behind citation links
//! - `GET /health`: liveness probe

pub mod response;
pub mod routes;
pub mod state;

pub use response::{ApiError, BaseResponse};
pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/chat/knowledge_base_chat",
            post(routes::chat::knowledge_base_chat),
        )
        .route(
            "/knowledge_base/download_doc",
            get(routes::docs::download_doc),
        )
        .route("/health", get(routes::health::health_check))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
