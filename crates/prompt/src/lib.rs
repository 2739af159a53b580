//! Prompt system for knowledge-base chat.
//!
//! This crate provides:
//! - YAML-based prompt definitions with per-knowledge-base overrides
//! - Handlebars rendering of the context and question templates
//! - Assembly of history plus templates into a role-tagged chat prompt

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::{assemble_prompt, join_context};
pub use loader::{list_prompts, load_prompt, resolve_prompt};
pub use types::{
    ChatPrompt, ConversationTurn, PromptDefinition, PromptMessage, PromptRole, TurnRole,
    DEFAULT_PROMPT_ID,
};
