//! Shared application state.

use axum::http::{header, HeaderMap};
use kbchat_core::{AppConfig, AppError, AppResult};
use kbchat_knowledge::{ChatSettings, FsKnowledgeBaseRegistry, KnowledgeBaseRegistry, KnowledgeChat};
use kbchat_llm::{ClientFactory, ModelRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// State handed to every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    chat: KnowledgeChat,
    knowledge_root: PathBuf,
    public_base_url: Option<String>,
    fallback_host: String,
}

impl AppState {
    pub fn new(
        registry: Arc<dyn KnowledgeBaseRegistry>,
        clients: Arc<dyn ClientFactory>,
        settings: ChatSettings,
        knowledge_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            chat: KnowledgeChat::new(registry, clients, settings),
            knowledge_root: knowledge_root.into(),
            public_base_url: None,
            fallback_host: "localhost".to_string(),
        }
    }

    /// Use a fixed base URL for download links instead of the Host header.
    pub fn with_public_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.public_base_url = Some(base_url.into());
        self
    }

    /// Host used when a request carries no Host header.
    pub fn with_fallback_host(mut self, host: impl Into<String>) -> Self {
        self.fallback_host = host.into();
        self
    }

    /// Build the production state: filesystem registry plus configured models.
    ///
    /// # Errors
    /// `Config` when no search endpoint is configured.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let search_endpoint = config.knowledge.search_endpoint.clone().ok_or_else(|| {
            AppError::Config(
                "knowledge.searchEndpoint is not set (config file or KBCHAT_SEARCH_ENDPOINT)"
                    .to_string(),
            )
        })?;

        let root = config.knowledge_root();
        if !root.is_dir() {
            tracing::warn!("Knowledge base root {:?} does not exist", root);
        }

        let registry = FsKnowledgeBaseRegistry::new(root.clone(), search_endpoint)?;
        let models = ModelRegistry::from_config(config);

        tracing::info!(
            "Serving {} knowledge bases with models: {}",
            registry.list_names().len(),
            models.model_names().join(", ")
        );

        let mut state = Self::new(
            Arc::new(registry),
            Arc::new(models),
            ChatSettings::from_config(config),
            root,
        )
        .with_fallback_host(config.server.bind.clone());

        if let Some(ref base_url) = config.server.public_base_url {
            state = state.with_public_base_url(base_url.clone());
        }

        Ok(state)
    }

    pub fn chat(&self) -> &KnowledgeChat {
        &self.chat
    }

    pub fn knowledge_root(&self) -> &Path {
        &self.knowledge_root
    }

    /// Base URL for links in a response, always ending in `/`.
    pub fn base_url(&self, headers: &HeaderMap) -> String {
        let base = match self.public_base_url {
            Some(ref url) => url.clone(),
            None => {
                let host = headers
                    .get(header::HOST)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or(&self.fallback_host);
                format!("http://{}", host)
            }
        };

        if base.ends_with('/') {
            base
        } else {
            format!("{}/", base)
        }
    }
}
