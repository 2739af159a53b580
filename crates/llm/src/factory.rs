//! LLM client factory.
//!
//! Turns a requested model name into a configured client. The provider
//! family is a closed set; anything outside it fails before a client is
//! constructed.

use crate::client::LlmClient;
use crate::providers::{ChatGlmClient, OpenAiClient};
use crate::types::{ModelRegistry, ProviderFamily, ResolvedModel};
use kbchat_core::AppResult;
use std::sync::Arc;

/// Source of per-request LLM clients.
///
/// The server holds one factory and asks it for a fresh client on every
/// request, so no client state is shared between requests.
pub trait ClientFactory: Send + Sync {
    /// Create a client able to serve `model_name`.
    ///
    /// # Errors
    /// `UnsupportedModel` when the name matches no provider family or is not
    /// registered; `Config` when the registry entry is unusable.
    fn create_client(&self, model_name: &str) -> AppResult<Arc<dyn LlmClient>>;
}

impl ClientFactory for ModelRegistry {
    fn create_client(&self, model_name: &str) -> AppResult<Arc<dyn LlmClient>> {
        let resolved = self.resolve(model_name)?;
        create_client(&resolved)
    }
}

/// Create an LLM client for a resolved model.
///
/// # Arguments
/// * `model` - Family, endpoint and credentials from the registry
///
/// # Returns
/// A shared trait object implementing `LlmClient`
pub fn create_client(model: &ResolvedModel) -> AppResult<Arc<dyn LlmClient>> {
    tracing::debug!(
        "Creating {} client for model '{}' at {}",
        model.family.as_str(),
        model.name,
        model.api_base_url
    );

    match model.family {
        ProviderFamily::Gpt => {
            let client = OpenAiClient::new(
                model.api_base_url.clone(),
                model.api_key.clone(),
                model.proxy.as_deref(),
            )?;
            Ok(Arc::new(client))
        }
        ProviderFamily::Glm => {
            let client =
                ChatGlmClient::with_base_url(model.api_base_url.clone(), model.api_key.clone())?;
            Ok(Arc::new(client))
        }
    }
}
