//! LLM integration crate for the knowledge-base chat service.
//!
//! Provides a provider-agnostic chat client abstraction, the model registry
//! that maps model names onto provider families, and the invoker that runs
//! inference as a background producer feeding a bounded channel.
//!
//! # Providers
//! - **OpenAI** (`gpt` family): hosted chat completions, optional proxy
//! - **ChatGLM** (`glm` family): OpenAI-compatible self-hosted server
//!
//! # Example
//! ```no_run
//! use kbchat_llm::{ChatMessage, InvocationMode, ModelInvoker, providers::OpenAiClient};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OpenAiClient::new("https://api.openai.com/v1", Some("sk-...".into()), None)?;
//! let invoker = ModelInvoker::new(Arc::new(client), "gpt-3.5-turbo");
//! let answer = invoker
//!     .invoke(vec![ChatMessage::user("Hello")], InvocationMode::Batch)
//!     .collect()
//!     .await?;
//! println!("{}", answer);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod invoker;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{
    ChatMessage, ChatRole, LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage,
};
pub use factory::{create_client, ClientFactory};
pub use invoker::{Fragments, InvocationMode, ModelInvoker};
pub use types::{ModelRegistry, ProviderFamily, ResolvedModel};
