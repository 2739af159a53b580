//! Knowledge bases backed by a remote search service.
//!
//! Existence is decided by the local directory layout; searches are
//! delegated to an HTTP backend exposing `POST /knowledge_base/search_docs`.

use crate::config;
use crate::service::{KnowledgeBaseRegistry, KnowledgeBaseService};
use crate::types::{RetrievedPassage, SearchHit, SearchRequest};
use kbchat_core::{AppError, AppResult};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const SEARCH_PATH: &str = "knowledge_base/search_docs";

/// Searches one knowledge base through the remote backend.
#[derive(Debug, Clone)]
pub struct RemoteSearchService {
    name: String,
    endpoint: String,
    client: reqwest::Client,
}

impl RemoteSearchService {
    pub fn new(name: impl Into<String>, base_url: &str, client: reqwest::Client) -> Self {
        Self {
            name: name.into(),
            endpoint: format!("{}/{}", base_url.trim_end_matches('/'), SEARCH_PATH),
            client,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl KnowledgeBaseService for RemoteSearchService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search_docs(
        &self,
        query: &str,
        top_k: usize,
        score_threshold: f64,
    ) -> AppResult<Vec<RetrievedPassage>> {
        let body = SearchRequest {
            query: query.to_string(),
            knowledge_base_name: self.name.clone(),
            top_k,
            score_threshold,
        };

        tracing::debug!("Searching '{}' via {}", self.name, self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Retrieval(format!("Search request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Retrieval(format!(
                "Search backend returned {}: {}",
                status, text
            )));
        }

        let hits: Vec<SearchHit> = response
            .json()
            .await
            .map_err(|e| AppError::Retrieval(format!("Invalid search response: {}", e)))?;

        tracing::debug!("Search on '{}' returned {} hits", self.name, hits.len());

        Ok(hits.into_iter().map(RetrievedPassage::from).collect())
    }
}

/// Registry where a knowledge base exists iff `<root>/<name>/` is a directory.
#[derive(Debug, Clone)]
pub struct FsKnowledgeBaseRegistry {
    root: PathBuf,
    search_endpoint: String,
    client: reqwest::Client,
}

impl FsKnowledgeBaseRegistry {
    /// Create a registry rooted at `root` that searches through `search_endpoint`.
    pub fn new(root: impl Into<PathBuf>, search_endpoint: impl Into<String>) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(root, search_endpoint, client))
    }

    pub fn with_client(
        root: impl Into<PathBuf>,
        search_endpoint: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            root: root.into(),
            search_endpoint: search_endpoint.into(),
            client,
        }
    }
}

impl KnowledgeBaseRegistry for FsKnowledgeBaseRegistry {
    fn get_service_by_name(&self, name: &str) -> Option<Arc<dyn KnowledgeBaseService>> {
        if !config::base_exists(&self.root, name) {
            tracing::debug!("Knowledge base '{}' not found under {:?}", name, self.root);
            return None;
        }

        Some(Arc::new(RemoteSearchService::new(
            name,
            &self.search_endpoint,
            self.client.clone(),
        )))
    }

    fn list_names(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return Vec::new();
        };

        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .collect();
        names.sort();
        names
    }
}
