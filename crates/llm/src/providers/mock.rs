//! Scripted LLM client for testing.
//!
//! Replays a fixed list of fragments instead of calling a provider, and
//! records every request it receives.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
use kbchat_core::{AppError, AppResult};
use std::sync::{Arc, Mutex};

/// Deterministic client that emits pre-recorded fragments.
#[derive(Debug, Clone, Default)]
pub struct MockClient {
    fragments: Vec<String>,
    failure: Option<String>,
    requests: Arc<Mutex<Vec<LlmRequest>>>,
}

impl MockClient {
    /// Create a client that answers with `fragments`, in order.
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            failure: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fail with `message` after all fragments have been emitted.
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// The full answer a batch completion returns.
    pub fn full_answer(&self) -> String {
        self.fragments.concat()
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn record(&self, request: &LlmRequest) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for MockClient {
    fn provider_name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.record(request);

        if let Some(ref message) = self.failure {
            return Err(AppError::Llm(message.clone()));
        }

        Ok(LlmResponse {
            content: self.full_answer(),
            model: request.model.clone(),
            usage: LlmUsage::new(0, self.fragments.len() as u32),
        })
    }

    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        self.record(request);

        let model = request.model.clone();
        let mut items: Vec<AppResult<LlmStreamChunk>> = self
            .fragments
            .iter()
            .map(|fragment| {
                Ok(LlmStreamChunk {
                    content: fragment.clone(),
                    model: model.clone(),
                    done: false,
                    usage: None,
                })
            })
            .collect();

        match self.failure {
            Some(ref message) => items.push(Err(AppError::Llm(message.clone()))),
            None => items.push(Ok(LlmStreamChunk {
                content: String::new(),
                model,
                done: true,
                usage: Some(LlmUsage::new(0, self.fragments.len() as u32)),
            })),
        }

        Ok(Box::pin(futures::stream::iter(items)))
    }
}
