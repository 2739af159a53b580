//! Knowledge system type definitions.

use serde::{Deserialize, Serialize};

/// A passage returned by a knowledge-base search.
///
/// `relevance_score` is a distance: lower means more relevant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    /// Passage text
    pub content: String,

    /// Path of the document the passage came from
    pub source_path: String,

    /// Raw distance reported by the search backend
    pub relevance_score: f64,
}

impl RetrievedPassage {
    pub fn new(content: impl Into<String>, source_path: impl Into<String>, relevance_score: f64) -> Self {
        Self {
            content: content.into(),
            source_path: source_path.into(),
            relevance_score,
        }
    }
}

/// Document metadata as reported by the search backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Source path of the document
    #[serde(default)]
    pub source: String,
}

/// One hit in a search backend response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub page_content: String,

    #[serde(default)]
    pub metadata: DocumentMetadata,

    pub score: f64,
}

impl From<SearchHit> for RetrievedPassage {
    fn from(hit: SearchHit) -> Self {
        Self {
            content: hit.page_content,
            source_path: hit.metadata.source,
            relevance_score: hit.score,
        }
    }
}

/// Body of a search backend request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub knowledge_base_name: String,
    pub top_k: usize,
    pub score_threshold: f64,
}
