//! Knowledge base access and retrieval-augmented chat.
//!
//! Knowledge bases are reached through [`KnowledgeBaseRegistry`]; the
//! [`rag`] module turns a question into retrieved passages, citations and a
//! streamed model answer.

pub mod config;
pub mod memory;
pub mod rag;
pub mod remote;
pub mod service;
pub mod types;

// Re-export commonly used types
pub use memory::{InMemoryKnowledgeBase, InMemoryRegistry};
pub use rag::{ChatResponseEvent, ChatSession, ChatSettings, KnowledgeChat, KnowledgeChatRequest};
pub use remote::{FsKnowledgeBaseRegistry, RemoteSearchService};
pub use service::{KnowledgeBaseRegistry, KnowledgeBaseService};
pub use types::RetrievedPassage;
