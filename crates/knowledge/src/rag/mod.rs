//! RAG (Retrieval-Augmented Generation) chat over knowledge bases.
//!
//! Retrieval, citation building and the chat pipeline that streams model
//! answers together with their sources.

pub mod chat;
pub mod citations;
pub mod score;
pub mod search;

pub use chat::{
    ChatEventStream, ChatResponseEvent, ChatSession, ChatSettings, KnowledgeChat,
    KnowledgeChatRequest,
};
pub use citations::{build_citations, CitationEntry, Citations, LinkMode, ReferenceMap};
pub use search::{retrieve, SearchParams};
