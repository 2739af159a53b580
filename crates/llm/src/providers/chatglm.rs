//! ChatGLM chat completions (the "glm" family).
//!
//! Targets the OpenAI-compatible API server that ships with ChatGLM models.
//! Self-hosted deployments usually accept any key, so the key is optional.
//! Proxies are not supported: system proxy settings are ignored as well.

use super::chat_completions::ChatCompletionsClient;
use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmStream};
use kbchat_core::{AppError, AppResult};
use std::time::Duration;

/// Default address of a locally started ChatGLM API server.
pub const DEFAULT_CHATGLM_BASE_URL: &str = "http://localhost:8000/v1";

/// Client for the glm provider family.
pub struct ChatGlmClient {
    inner: ChatCompletionsClient,
}

impl ChatGlmClient {
    /// Create a client with default settings.
    pub fn new() -> AppResult<Self> {
        Self::with_base_url(DEFAULT_CHATGLM_BASE_URL, None)
    }

    /// Create a client for a custom base URL.
    pub fn with_base_url(base_url: impl Into<String>, api_key: Option<String>) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .no_proxy()
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            inner: ChatCompletionsClient::new(
                "chatglm",
                base_url,
                api_key.filter(|key| !key.is_empty()),
                client,
            ),
        })
    }
}

#[async_trait::async_trait]
impl LlmClient for ChatGlmClient {
    fn provider_name(&self) -> &str {
        self.inner.provider()
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.inner.complete(request).await
    }

    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        self.inner.stream(request).await
    }
}
