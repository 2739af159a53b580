//! Model invocation with producer/consumer fragment delivery.
//!
//! Inference always runs as a spawned producer task that writes fragments
//! into a bounded channel. The caller owns the receiving side as
//! [`Fragments`]:
//! - a provider error is sent as the final item, then the channel closes;
//! - after draining, [`Fragments::finish`] joins the producer so a panicked
//!   or aborted task surfaces as an error;
//! - dropping [`Fragments`] aborts the producer, which is how a client
//!   disconnect cancels in-flight inference.

use crate::client::{ChatMessage, LlmClient, LlmRequest};
use futures::StreamExt;
use kbchat_core::{AppError, AppResult};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Sampling temperature used for knowledge-base answers.
pub const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Default capacity of the fragment channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// How the model output is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationMode {
    /// Provider streaming; one fragment per provider chunk
    Incremental,
    /// One non-streaming completion delivered as a single fragment
    Batch,
}

impl InvocationMode {
    /// Map the request's `stream` flag onto a mode.
    pub fn from_stream_flag(stream: bool) -> Self {
        if stream {
            Self::Incremental
        } else {
            Self::Batch
        }
    }
}

/// Runs one model against assembled prompts.
#[derive(Clone)]
pub struct ModelInvoker {
    client: Arc<dyn LlmClient>,
    model: String,
    channel_capacity: usize,
}

impl ModelInvoker {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Start inference in the background and return the receiving side.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn invoke(&self, messages: Vec<ChatMessage>, mode: InvocationMode) -> Fragments {
        let mut request =
            LlmRequest::new(messages, self.model.clone()).with_temperature(DEFAULT_TEMPERATURE);
        if mode == InvocationMode::Incremental {
            request = request.with_streaming();
        }

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let client = Arc::clone(&self.client);

        tracing::debug!(
            "Starting {:?} inference on '{}' via {}",
            mode,
            self.model,
            client.provider_name()
        );

        let handle = tokio::spawn(async move {
            let result = match mode {
                InvocationMode::Incremental => produce_incremental(client.as_ref(), &request, &tx).await,
                InvocationMode::Batch => produce_batch(client.as_ref(), &request, &tx).await,
            };

            if let Err(e) = result {
                tracing::warn!("Inference failed: {}", e);
                // The consumer may already be gone; nothing left to tell
                let _ = tx.send(Err(e)).await;
            }
        });

        Fragments {
            rx,
            producer: ProducerHandle(Some(handle)),
        }
    }
}

async fn produce_incremental(
    client: &dyn LlmClient,
    request: &LlmRequest,
    tx: &mpsc::Sender<AppResult<String>>,
) -> AppResult<()> {
    let mut stream = client.stream(request).await?;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;

        if !chunk.content.is_empty() && tx.send(Ok(chunk.content)).await.is_err() {
            tracing::debug!("Fragment consumer dropped; stopping inference");
            return Ok(());
        }

        if chunk.done {
            if let Some(usage) = chunk.usage {
                tracing::debug!(
                    "Token usage - Prompt: {}, Completion: {}, Total: {}",
                    usage.prompt_tokens,
                    usage.completion_tokens,
                    usage.total_tokens
                );
            }
            break;
        }
    }

    Ok(())
}

async fn produce_batch(
    client: &dyn LlmClient,
    request: &LlmRequest,
    tx: &mpsc::Sender<AppResult<String>>,
) -> AppResult<()> {
    let response = client.complete(request).await?;

    tracing::debug!(
        "Token usage - Prompt: {}, Completion: {}, Total: {}",
        response.usage.prompt_tokens,
        response.usage.completion_tokens,
        response.usage.total_tokens
    );

    if tx.send(Ok(response.content)).await.is_err() {
        tracing::debug!("Fragment consumer dropped before the answer was delivered");
    }

    Ok(())
}

/// Aborts the producer task when dropped.
struct ProducerHandle(Option<JoinHandle<()>>);

impl Drop for ProducerHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            if !handle.is_finished() {
                tracing::debug!("Cancelling in-flight inference");
            }
            handle.abort();
        }
    }
}

/// Receiving side of one inference.
pub struct Fragments {
    rx: mpsc::Receiver<AppResult<String>>,
    producer: ProducerHandle,
}

impl Fragments {
    /// Next fragment, or `None` once the producer has closed the channel.
    pub async fn next(&mut self) -> Option<AppResult<String>> {
        self.rx.recv().await
    }

    /// Join the producer task after the channel has been drained.
    pub async fn finish(mut self) -> AppResult<()> {
        match self.producer.0.take() {
            Some(handle) => handle
                .await
                .map_err(|e| AppError::Llm(format!("Inference task failed: {}", e))),
            None => Ok(()),
        }
    }

    /// Drain every fragment into one string, then join the producer.
    pub async fn collect(mut self) -> AppResult<String> {
        let mut answer = String::new();
        while let Some(fragment) = self.next().await {
            answer.push_str(&fragment?);
        }
        self.finish().await?;
        Ok(answer)
    }
}
