//! In-memory knowledge bases.
//!
//! Each base holds a fixed list of passages with precomputed distances.
//! Used for development without a search backend and throughout the tests.

use crate::service::{KnowledgeBaseRegistry, KnowledgeBaseService};
use crate::types::RetrievedPassage;
use kbchat_core::{AppError, AppResult};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A knowledge base whose search results are fixed up front.
#[derive(Debug, Default)]
pub struct InMemoryKnowledgeBase {
    name: String,
    passages: Vec<RetrievedPassage>,
    failure: Option<String>,
    searches: AtomicUsize,
}

impl InMemoryKnowledgeBase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add a passage with its distance.
    pub fn with_passage(
        mut self,
        content: impl Into<String>,
        source_path: impl Into<String>,
        relevance_score: f64,
    ) -> Self {
        self.passages
            .push(RetrievedPassage::new(content, source_path, relevance_score));
        self
    }

    /// Make every search fail with `message`.
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Number of searches served so far.
    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl KnowledgeBaseService for InMemoryKnowledgeBase {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search_docs(
        &self,
        _query: &str,
        top_k: usize,
        score_threshold: f64,
    ) -> AppResult<Vec<RetrievedPassage>> {
        self.searches.fetch_add(1, Ordering::SeqCst);

        if let Some(ref message) = self.failure {
            return Err(AppError::Retrieval(message.clone()));
        }

        let mut hits: Vec<RetrievedPassage> = self
            .passages
            .iter()
            .filter(|p| p.relevance_score <= score_threshold)
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.relevance_score.total_cmp(&b.relevance_score));
        hits.truncate(top_k);

        Ok(hits)
    }
}

/// Registry over a fixed set of in-memory knowledge bases.
#[derive(Default)]
pub struct InMemoryRegistry {
    bases: BTreeMap<String, Arc<InMemoryKnowledgeBase>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a base, returning a handle for inspecting it later.
    pub fn insert(&mut self, base: InMemoryKnowledgeBase) -> Arc<InMemoryKnowledgeBase> {
        let base = Arc::new(base);
        self.bases.insert(base.name.clone(), Arc::clone(&base));
        base
    }
}

impl KnowledgeBaseRegistry for InMemoryRegistry {
    fn get_service_by_name(&self, name: &str) -> Option<Arc<dyn KnowledgeBaseService>> {
        self.bases
            .get(name)
            .map(|base| Arc::clone(base) as Arc<dyn KnowledgeBaseService>)
    }

    fn list_names(&self) -> Vec<String> {
        self.bases.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> InMemoryKnowledgeBase {
        InMemoryKnowledgeBase::new("samples")
            .with_passage("far", "docs/far.md", 0.9)
            .with_passage("near", "docs/near.md", 0.2)
            .with_passage("middle", "docs/middle.md", 0.5)
    }

    #[tokio::test]
    async fn test_search_orders_filters_and_truncates() {
        let base = samples();

        let all = base.search_docs("q", 10, 1.0).await.unwrap();
        let contents: Vec<_> = all.iter().map(|p| p.content.as_str()).collect();
        assert_eq!(contents, vec!["near", "middle", "far"]);

        let top = base.search_docs("q", 2, 1.0).await.unwrap();
        assert_eq!(top.len(), 2);

        let strict = base.search_docs("q", 10, 0.5).await.unwrap();
        assert_eq!(strict.len(), 2);
        assert_eq!(base.search_count(), 3);
    }

    #[tokio::test]
    async fn test_failure() {
        let base = samples().with_failure("index offline");
        assert!(matches!(
            base.search_docs("q", 3, 1.0).await,
            Err(AppError::Retrieval(_))
        ));
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = InMemoryRegistry::new();
        let handle = registry.insert(samples());

        let service = registry.get_service_by_name("samples").unwrap();
        assert_eq!(service.name(), "samples");
        assert!(registry.get_service_by_name("nope").is_none());
        assert_eq!(registry.list_names(), vec!["samples"]);
        assert_eq!(handle.search_count(), 0);
    }
}
