//! Shared chat-completions protocol.
//!
//! Both supported provider families speak the `/chat/completions` wire
//! format: a JSON body in, either one JSON object or a server-sent event
//! stream terminated by `data: [DONE]` out. The family-specific clients
//! wrap this type and only differ in how the HTTP client is configured.

use crate::client::{ChatMessage, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
use futures::StreamExt;
use kbchat_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Chat-completions request body.
#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireStreamChunk {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<WireStreamChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
    #[serde(default)]
    error: Option<WireError>,
}

#[derive(Debug, Deserialize)]
struct WireStreamChoice {
    #[serde(default)]
    delta: WireDelta,
}

#[derive(Debug, Default, Deserialize)]
struct WireDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct WireError {
    #[serde(default)]
    message: String,
}

impl From<WireUsage> for LlmUsage {
    fn from(usage: WireUsage) -> Self {
        LlmUsage::new(usage.prompt_tokens, usage.completion_tokens)
    }
}

/// Client for one `/chat/completions` endpoint.
pub(crate) struct ChatCompletionsClient {
    provider: &'static str,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl ChatCompletionsClient {
    pub(crate) fn new(
        provider: &'static str,
        base_url: impl Into<String>,
        api_key: Option<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            provider,
            base_url: base_url.into(),
            api_key,
            client,
        }
    }

    pub(crate) fn provider(&self) -> &'static str {
        self.provider
    }

    pub(crate) fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    async fn send(&self, request: &LlmRequest, stream: bool) -> AppResult<reqwest::Response> {
        let body = WireRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            stream,
        };

        let mut builder = self.client.post(self.endpoint()).json(&body);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            AppError::Llm(format!("Failed to send request to {}: {}", self.provider, e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Llm(format!(
                "{} API error ({}): {}",
                self.provider, status, error_text
            )));
        }

        Ok(response)
    }

    pub(crate) async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::info!("Sending completion request to {}", self.provider);
        tracing::debug!("Request: {:?}", request);

        let response = self.send(request, false).await?;
        let wire: WireResponse = response.json().await.map_err(|e| {
            AppError::Llm(format!("Failed to parse {} response: {}", self.provider, e))
        })?;

        let content = wire
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                AppError::Llm(format!("{} response contained no choices", self.provider))
            })?;

        tracing::info!("Received completion from {}", self.provider);

        Ok(LlmResponse {
            content,
            model: wire.model.unwrap_or_else(|| request.model.clone()),
            usage: wire.usage.map(LlmUsage::from).unwrap_or_default(),
        })
    }

    pub(crate) async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        tracing::info!("Starting streaming request to {}", self.provider);
        tracing::debug!("Request: {:?}", request);

        let response = self.send(request, true).await?;
        let provider = self.provider;
        let model = request.model.clone();
        let mut bytes = response.bytes_stream();

        let stream = async_stream::try_stream! {
            let mut decoder = SseDecoder::default();
            let mut finished = false;

            while let Some(item) = bytes.next().await {
                let item = item.map_err(|e| AppError::Llm(format!("Stream error: {}", e)))?;

                for data in decoder.push(&item) {
                    match parse_event(&data, &model, provider)? {
                        SseEvent::Done => {
                            finished = true;
                            break;
                        }
                        SseEvent::Chunk(chunk) => yield chunk,
                    }
                }

                if finished {
                    break;
                }
            }

            if !finished {
                tracing::debug!("{} closed the stream without [DONE]", provider);
            }

            yield LlmStreamChunk {
                content: String::new(),
                model: model.clone(),
                done: true,
                usage: None,
            };
        };

        Ok(into_llm_stream(stream))
    }
}

/// Pin the bound on the generator's item type so `?` inside it resolves.
fn into_llm_stream<S>(stream: S) -> LlmStream
where
    S: futures::Stream<Item = AppResult<LlmStreamChunk>> + Send + 'static,
{
    Box::pin(stream)
}

enum SseEvent {
    Chunk(LlmStreamChunk),
    Done,
}

fn parse_event(data: &str, model: &str, provider: &str) -> AppResult<SseEvent> {
    if data == "[DONE]" {
        return Ok(SseEvent::Done);
    }

    let wire: WireStreamChunk = serde_json::from_str(data)
        .map_err(|e| AppError::Llm(format!("Failed to parse {} chunk: {}", provider, e)))?;

    if let Some(error) = wire.error {
        return Err(AppError::Llm(format!(
            "{} stream error: {}",
            provider, error.message
        )));
    }

    let content = wire
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .unwrap_or_default();

    Ok(SseEvent::Chunk(LlmStreamChunk {
        content,
        model: wire.model.unwrap_or_else(|| model.to_string()),
        done: false,
        usage: wire.usage.map(LlmUsage::from),
    }))
}

/// Incremental decoder for `text/event-stream` bodies.
///
/// Network chunks do not respect line boundaries, so bytes are buffered
/// until a full line is available. Only `data:` fields are surfaced.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Feed bytes and return the `data:` payloads of every completed line.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);

            if let Some(data) = line.strip_prefix("data:") {
                let data = data.strip_prefix(' ').unwrap_or(data);
                if !data.is_empty() {
                    payloads.push(data.to_string());
                }
            }
        }

        payloads
    }
}
