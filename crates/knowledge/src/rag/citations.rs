//! Citation building for retrieved passages.
//!
//! Produces the per-passage citation blocks shown under an answer and the
//! reference map grouping passages by document filename.

use crate::rag::score::{relevance_display, relevance_text};
use crate::types::RetrievedPassage;
use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeSeq, Serializer};

/// Label preceding each citation's index and link.
pub const SOURCE_LABEL: &str = "出处";

/// Label preceding each citation's relevance.
pub const RELEVANCE_LABEL: &str = "相似度";

/// Path of the download endpoint, relative to the service base URL.
pub const DOWNLOAD_PATH: &str = "knowledge_base/download_doc";

/// One passage under its document's filename.
///
/// Serialized as the two-element array `[content, relevance_display]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationEntry {
    pub filename: String,
    pub content: String,
    pub relevance_display: String,
}

impl Serialize for CitationEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(2))?;
        seq.serialize_element(&self.content)?;
        seq.serialize_element(&self.relevance_display)?;
        seq.end()
    }
}

/// Filename -> entries, in order of first appearance.
pub type ReferenceMap = IndexMap<String, Vec<CitationEntry>>;

/// How citation links point at documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkMode {
    /// `file://` URL of the document's source path
    Local,
    /// Download endpoint under this base URL
    Download { base_url: String },
}

impl LinkMode {
    /// Select the mode from the request's `local_doc_url` flag.
    pub fn new(local_doc_url: bool, base_url: impl Into<String>) -> Self {
        if local_doc_url {
            Self::Local
        } else {
            Self::Download {
                base_url: base_url.into(),
            }
        }
    }
}

/// Citation blocks and reference map for one answer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Citations {
    /// Formatted citation blocks, in retrieval rank order
    pub docs: Vec<String>,
    /// Passages grouped by filename
    pub reference: ReferenceMap,
}

/// Final path segment of `source_path`, splitting on both `/` and `\`.
pub fn filename_of(source_path: &str) -> &str {
    source_path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(source_path)
}

/// Link to a document as shown in its citation block.
pub fn document_link(
    mode: &LinkMode,
    knowledge_base_name: &str,
    source_path: &str,
    filename: &str,
) -> String {
    match mode {
        LinkMode::Local => format!("file://{}", source_path),
        LinkMode::Download { base_url } => {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .append_pair("knowledge_base_name", knowledge_base_name)
                .append_pair("file_name", filename)
                .finish();
            let separator = if base_url.ends_with('/') { "" } else { "/" };
            format!("{}{}{}?{}", base_url, separator, DOWNLOAD_PATH, query)
        }
    }
}

/// Build citations for passages given in rank order.
pub fn build_citations(
    passages: &[RetrievedPassage],
    knowledge_base_name: &str,
    mode: &LinkMode,
) -> Citations {
    let mut citations = Citations::default();

    for (i, passage) in passages.iter().enumerate() {
        let filename = filename_of(&passage.source_path);
        let link = document_link(mode, knowledge_base_name, &passage.source_path, filename);

        citations.docs.push(format!(
            "{} [{}] [{}]({}) \n\n{}\n\n {}：{}\n\n",
            SOURCE_LABEL,
            i + 1,
            filename,
            link,
            passage.content,
            RELEVANCE_LABEL,
            relevance_text(passage.relevance_score)
        ));

        citations
            .reference
            .entry(filename.to_string())
            .or_default()
            .push(CitationEntry {
                filename: filename.to_string(),
                content: passage.content.clone(),
                relevance_display: relevance_display(passage.relevance_score),
            });
    }

    citations
}
