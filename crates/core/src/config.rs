//! Configuration management for kbchat.
//!
//! Configuration is assembled from several sources, later ones winning:
//! - Built-in defaults
//! - A YAML config file (`kbchat.yaml` in the workspace, or `KBCHAT_CONFIG`)
//! - Environment variables (`KBCHAT_*`)
//! - Command-line flags
//!
//! The model registry (credentials and base URLs keyed by model name) lives
//! here as plain data and is handed to the LLM layer explicitly.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Upper bound accepted for `score_threshold`.
///
/// Scores are raw distances from the search backend; the bound mirrors the
/// constant used by the relevance display.
pub const SCORE_THRESHOLD_MAX: f64 = 1100.0;

/// Default config file name, looked up in the workspace root.
pub const CONFIG_FILE_NAME: &str = "kbchat.yaml";

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Workspace root; relative paths in the config resolve against it
    pub workspace: PathBuf,

    /// Config file that was merged, if any
    pub config_file: Option<PathBuf>,

    /// HTTP server settings
    pub server: ServerConfig,

    /// Request defaults for the chat endpoint
    pub chat: ChatDefaults,

    /// Knowledge base location and search backend
    pub knowledge: KnowledgeConfig,

    /// Model registry keyed by model name
    pub models: HashMap<String, ModelConfig>,

    /// Directory holding YAML prompt definitions
    pub prompts_dir: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Socket address to listen on
    pub bind: String,

    /// Base URL used for download links instead of the request's Host header
    pub public_base_url: Option<String>,
}

/// Defaults applied when a chat request omits a field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatDefaults {
    pub default_model: String,
    pub top_k: usize,
    pub score_threshold: f64,
    /// Capacity of the fragment channel between inference and response
    pub channel_capacity: usize,
}

/// Knowledge base settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeConfig {
    /// Directory with one sub-directory per knowledge base
    pub root: PathBuf,

    /// Base URL of the document search backend
    pub search_endpoint: Option<String>,
}

/// Registry entry for one model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    /// Base URL of the provider's API (e.g. "https://api.openai.com/v1")
    pub api_base_url: String,

    /// Literal API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable holding the API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Optional HTTP(S) proxy; only honoured by providers that support it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
}

impl ModelConfig {
    /// Resolve the API key, preferring the literal key over the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        self.api_key_env
            .as_ref()
            .and_then(|var| std::env::var(var).ok())
    }
}

/// Full configuration file structure. Every section is optional so a file
/// only needs to mention what it changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    server: Option<ServerSection>,
    chat: Option<ChatSection>,
    knowledge: Option<KnowledgeSection>,
    models: Option<HashMap<String, ModelConfig>>,
    prompts: Option<PromptsSection>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerSection {
    bind: Option<String>,
    public_base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatSection {
    default_model: Option<String>,
    top_k: Option<usize>,
    score_threshold: Option<f64>,
    channel_capacity: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KnowledgeSection {
    root: Option<String>,
    search_endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PromptsSection {
    dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:7861".to_string(),
            public_base_url: None,
        }
    }
}

impl Default for ChatDefaults {
    fn default() -> Self {
        Self {
            default_model: "gpt-3.5-turbo".to_string(),
            top_k: 5,
            score_threshold: 1.0,
            channel_capacity: 64,
        }
    }
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("knowledge_base"),
            search_endpoint: None,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            server: ServerConfig::default(),
            chat: ChatDefaults::default(),
            knowledge: KnowledgeConfig::default(),
            models: HashMap::new(),
            prompts_dir: None,
            log_level: None,
            verbose: false,
            no_color: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the config file and the environment.
    ///
    /// `workspace` and `config_file` come from the command line (which also
    /// reads `KBCHAT_WORKSPACE` / `KBCHAT_CONFIG`); they are needed before the
    /// file can be located.
    ///
    /// Environment variables:
    /// - `KBCHAT_BIND`: Listen address
    /// - `KBCHAT_MODEL`: Default model name
    /// - `KBCHAT_KNOWLEDGE_ROOT`: Knowledge base root directory
    /// - `KBCHAT_SEARCH_ENDPOINT`: Search backend base URL
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use kbchat_core::config::AppConfig;
    ///
    /// let config = AppConfig::load(None, None).expect("Failed to load config");
    /// println!("Listening on {}", config.server.bind);
    /// ```
    pub fn load(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace {
            config.workspace = workspace;
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config_file
            .clone()
            .unwrap_or_else(|| config.workspace.join(CONFIG_FILE_NAME));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
            config.config_file = Some(config_path);
        } else if config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file does not exist: {:?}",
                config_path
            )));
        }

        // Environment variables override YAML config
        if let Ok(bind) = std::env::var("KBCHAT_BIND") {
            config.server.bind = bind;
        }

        if let Ok(model) = std::env::var("KBCHAT_MODEL") {
            config.chat.default_model = model;
        }

        if let Ok(root) = std::env::var("KBCHAT_KNOWLEDGE_ROOT") {
            config.knowledge.root = PathBuf::from(root);
        }

        if let Ok(endpoint) = std::env::var("KBCHAT_SEARCH_ENDPOINT") {
            config.knowledge.search_endpoint = Some(endpoint);
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        self.merge_yaml_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })
    }

    /// Merge YAML configuration text into this config.
    pub fn merge_yaml_str(&self, contents: &str) -> AppResult<Self> {
        let config_file: ConfigFile = serde_yaml::from_str(contents)?;
        let mut result = self.clone();

        if let Some(server) = config_file.server {
            if let Some(bind) = server.bind {
                result.server.bind = bind;
            }
            if server.public_base_url.is_some() {
                result.server.public_base_url = server.public_base_url;
            }
        }

        if let Some(chat) = config_file.chat {
            if let Some(model) = chat.default_model {
                result.chat.default_model = model;
            }
            if let Some(top_k) = chat.top_k {
                result.chat.top_k = top_k;
            }
            if let Some(threshold) = chat.score_threshold {
                result.chat.score_threshold = threshold;
            }
            if let Some(capacity) = chat.channel_capacity {
                result.chat.channel_capacity = capacity;
            }
        }

        if let Some(knowledge) = config_file.knowledge {
            if let Some(root) = knowledge.root {
                result.knowledge.root = PathBuf::from(root);
            }
            if knowledge.search_endpoint.is_some() {
                result.knowledge.search_endpoint = knowledge.search_endpoint;
            }
        }

        // Model entries from the file replace same-named entries
        if let Some(models) = config_file.models {
            result.models.extend(models);
        }

        if let Some(dir) = config_file.prompts.and_then(|p| p.dir) {
            result.prompts_dir = Some(PathBuf::from(dir));
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over the file and environment.
    pub fn with_overrides(
        mut self,
        bind: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(bind) = bind {
            self.server.bind = bind;
        }

        if let Some(model) = model {
            self.chat.default_model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Knowledge base root, resolved against the workspace.
    pub fn knowledge_root(&self) -> PathBuf {
        self.resolve(&self.knowledge.root)
    }

    /// Prompt definition directory, resolved against the workspace.
    pub fn prompts_dir(&self) -> Option<PathBuf> {
        self.prompts_dir.as_ref().map(|dir| self.resolve(dir))
    }

    /// Parsed listen address.
    pub fn bind_addr(&self) -> AppResult<SocketAddr> {
        self.server.bind.parse().map_err(|e| {
            AppError::Config(format!("Invalid bind address '{}': {}", self.server.bind, e))
        })
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        }
    }

    /// Validate the configuration before the server starts.
    pub fn validate(&self) -> AppResult<()> {
        self.bind_addr()?;

        if self.chat.top_k == 0 {
            return Err(AppError::Config("chat.topK must be at least 1".to_string()));
        }

        if !(0.0..=SCORE_THRESHOLD_MAX).contains(&self.chat.score_threshold) {
            return Err(AppError::Config(format!(
                "chat.scoreThreshold must be within 0..={}, got {}",
                SCORE_THRESHOLD_MAX, self.chat.score_threshold
            )));
        }

        if self.chat.channel_capacity == 0 {
            return Err(AppError::Config(
                "chat.channelCapacity must be at least 1".to_string(),
            ));
        }

        for (name, model) in &self.models {
            if model.api_base_url.trim().is_empty() {
                return Err(AppError::Config(format!(
                    "Model '{}' has an empty apiBaseUrl",
                    name
                )));
            }
        }

        Ok(())
    }
}
