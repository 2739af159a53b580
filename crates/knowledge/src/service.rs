//! Knowledge base service traits.
//!
//! Vector search and document storage live behind these traits; the chat
//! pipeline only ever sees a registry and the services it hands out.

use crate::types::RetrievedPassage;
use kbchat_core::AppResult;
use std::sync::Arc;

/// Search access to one knowledge base.
#[async_trait::async_trait]
pub trait KnowledgeBaseService: Send + Sync {
    /// Name of the knowledge base this service searches.
    fn name(&self) -> &str;

    /// Return up to `top_k` passages whose distance is at most
    /// `score_threshold`, lowest distance first.
    async fn search_docs(
        &self,
        query: &str,
        top_k: usize,
        score_threshold: f64,
    ) -> AppResult<Vec<RetrievedPassage>>;
}

/// Lookup of knowledge bases by name.
pub trait KnowledgeBaseRegistry: Send + Sync {
    /// Get the service for `name`, or `None` if no such knowledge base exists.
    fn get_service_by_name(&self, name: &str) -> Option<Arc<dyn KnowledgeBaseService>>;

    /// Names of all known knowledge bases, sorted.
    fn list_names(&self) -> Vec<String>;
}
