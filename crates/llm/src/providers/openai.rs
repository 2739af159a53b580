//! OpenAI-style hosted chat completions (the "gpt" family).
//!
//! Works against api.openai.com and any gateway exposing the same API.
//! Requests may be routed through an HTTP(S) proxy.

use super::chat_completions::ChatCompletionsClient;
use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmStream};
use kbchat_core::{AppError, AppResult};
use std::time::Duration;

/// Client for the gpt provider family.
pub struct OpenAiClient {
    inner: ChatCompletionsClient,
    proxy: Option<String>,
}

impl OpenAiClient {
    /// Create a client for `base_url` (e.g. "https://api.openai.com/v1").
    ///
    /// # Errors
    /// Returns a configuration error if the API key is missing or the proxy
    /// URL cannot be parsed.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        proxy: Option<&str>,
    ) -> AppResult<Self> {
        let api_key = api_key
            .filter(|key| !key.is_empty())
            .ok_or_else(|| AppError::Config("OpenAI provider requires API key".to_string()))?;

        let mut builder = reqwest::Client::builder().connect_timeout(Duration::from_secs(10));
        if let Some(proxy_url) = proxy {
            let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| {
                AppError::Config(format!("Invalid proxy URL '{}': {}", proxy_url, e))
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            inner: ChatCompletionsClient::new("openai", base_url, Some(api_key), client),
            proxy: proxy.map(str::to_string),
        })
    }

    /// Proxy requests are routed through, if any.
    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiClient {
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
