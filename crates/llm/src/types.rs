//! Model registry and provider family types.
//!
//! The registry is plain data built from configuration and passed to the
//! client factory explicitly; nothing here is global.

use kbchat_core::config::ModelConfig;
use kbchat_core::{AppConfig, AppError, AppResult};
use std::collections::HashMap;

/// Provider families the service knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderFamily {
    /// OpenAI-style hosted chat completions
    Gpt,
    /// ChatGLM chat completions
    Glm,
}

impl ProviderFamily {
    /// Select the family from a model name by case-sensitive substring.
    ///
    /// "gpt" is checked before "glm"; anything else is unsupported.
    pub fn from_model_name(model_name: &str) -> AppResult<Self> {
        if model_name.contains("gpt") {
            Ok(Self::Gpt)
        } else if model_name.contains("glm") {
            Ok(Self::Glm)
        } else {
            Err(AppError::UnsupportedModel(format!(
                "'{}' matches no supported provider family (gpt, glm)",
                model_name
            )))
        }
    }

    /// Get the canonical provider name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gpt => "openai",
            Self::Glm => "chatglm",
        }
    }

    /// Whether clients of this family can be routed through a proxy.
    pub fn supports_proxy(&self) -> bool {
        matches!(self, Self::Gpt)
    }
}

/// Everything needed to construct a client for one model.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedModel {
    pub name: String,
    pub family: ProviderFamily,
    pub api_base_url: String,
    pub api_key: Option<String>,
    pub proxy: Option<String>,
}

/// Credentials and endpoints keyed by model name.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, ModelConfig>,
}

impl ModelRegistry {
    pub fn new(models: HashMap<String, ModelConfig>) -> Self {
        Self { models }
    }

    /// Build the registry from the application configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.models.clone())
    }

    /// Names of all registered models, sorted.
    pub fn model_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve a model name into a family plus connection settings.
    ///
    /// Fails with `UnsupportedModel` when the name matches no family or is
    /// not registered.
    pub fn resolve(&self, model_name: &str) -> AppResult<ResolvedModel> {
        let family = ProviderFamily::from_model_name(model_name)?;

        let entry = self.models.get(model_name).ok_or_else(|| {
            AppError::UnsupportedModel(format!(
                "'{}' is not configured; known models: {}",
                model_name,
                self.model_names().join(", ")
            ))
        })?;

        let proxy = match (&entry.proxy, family.supports_proxy()) {
            (Some(proxy), true) => Some(proxy.clone()),
            (Some(_), false) => {
                tracing::warn!(
                    "Ignoring proxy configured for '{}': {} clients do not support proxies",
                    model_name,
                    family.as_str()
                );
                None
            }
            (None, _) => None,
        };

        Ok(ResolvedModel {
            name: model_name.to_string(),
            family,
            api_base_url: entry.api_base_url.clone(),
            api_key: entry.resolve_api_key(),
            proxy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ModelRegistry {
        let mut models = HashMap::new();
        models.insert(
            "gpt-3.5-turbo".to_string(),
            ModelConfig {
                api_base_url: "https://api.openai.com/v1".to_string(),
                api_key: Some("sk-test".to_string()),
                api_key_env: None,
                proxy: Some("http://proxy:3128".to_string()),
            },
        );
        models.insert(
            "chatglm2-6b".to_string(),
            ModelConfig {
                api_base_url: "http://localhost:8000/v1".to_string(),
                api_key: Some("EMPTY".to_string()),
                api_key_env: None,
                proxy: Some("http://proxy:3128".to_string()),
            },
        );
        ModelRegistry::new(models)
    }

    #[test]
    fn test_family_selection() {
        assert_eq!(
            ProviderFamily::from_model_name("gpt-4").unwrap(),
            ProviderFamily::Gpt
        );
        assert_eq!(
            ProviderFamily::from_model_name("chatglm2-6b").unwrap(),
            ProviderFamily::Glm
        );
    }

    #[test]
    fn test_family_match_is_case_sensitive() {
        for name in ["GPT-4o", "ChatGLM2-6B"] {
            assert!(matches!(
                ProviderFamily::from_model_name(name),
                Err(AppError::UnsupportedModel(_))
            ));
        }
    }

    #[test]
    fn test_unknown_family_fails_fast() {
        match ProviderFamily::from_model_name("llama3") {
            Err(AppError::UnsupportedModel(msg)) => assert!(msg.contains("llama3")),
            other => panic!("Expected UnsupportedModel, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_gpt_keeps_proxy() {
        let resolved = registry().resolve("gpt-3.5-turbo").unwrap();
        assert_eq!(resolved.family, ProviderFamily::Gpt);
        assert_eq!(resolved.api_key.as_deref(), Some("sk-test"));
        assert_eq!(resolved.proxy.as_deref(), Some("http://proxy:3128"));
    }

    #[test]
    fn test_resolve_glm_drops_proxy() {
        let resolved = registry().resolve("chatglm2-6b").unwrap();
        assert_eq!(resolved.family, ProviderFamily::Glm);
        assert_eq!(resolved.proxy, None);
    }

    #[test]
    fn test_unregistered_model_is_unsupported() {
        let result = registry().resolve("gpt-4");
        assert!(matches!(result, Err(AppError::UnsupportedModel(_))));
    }
}
