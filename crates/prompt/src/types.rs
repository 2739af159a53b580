//! Prompt types for knowledge-base chat.
//!
//! This module defines the conversation history entries, the assembled
//! chat prompt and the on-disk prompt definition.

use kbchat_llm::{ChatMessage, ChatRole};
use serde::{Deserialize, Serialize};

/// Identifier of the default knowledge-base chat prompt.
pub const DEFAULT_PROMPT_ID: &str = "knowledge_base_chat";

/// Context template used when no prompt definition is found on disk.
pub const DEFAULT_CONTEXT_TEMPLATE: &str = "<已知信息>\n{{context}}\n</已知信息>\n\n\
请根据上述已知信息，简洁和专业地回答用户的问题。\
如果无法从中得到答案，请说 “根据已知信息无法回答该问题”，\
不允许在答案中添加编造成分，答案请使用中文。";

/// Question template used when no prompt definition is found on disk.
pub const DEFAULT_QUESTION_TEMPLATE: &str = "<问题>{{question}}</问题>";

/// Who spoke a history turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One prior exchange supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }
}

/// Speaker of an assembled prompt message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRole {
    System,
    Human,
    Ai,
}

impl PromptRole {
    /// Label used in the rendered display string.
    pub fn label(&self) -> &'static str {
        match self {
            Self::System => "System",
            Self::Human => "Human",
            Self::Ai => "AI",
        }
    }

    fn chat_role(&self) -> ChatRole {
        match self {
            Self::System => ChatRole::System,
            Self::Human => ChatRole::User,
            Self::Ai => ChatRole::Assistant,
        }
    }
}

impl From<TurnRole> for PromptRole {
    fn from(role: TurnRole) -> Self {
        match role {
            TurnRole::User => Self::Human,
            TurnRole::Assistant => Self::Ai,
        }
    }
}

/// A single message with final (already rendered) content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: PromptRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// An ordered, fully rendered chat prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatPrompt {
    pub messages: Vec<PromptMessage>,
}

impl ChatPrompt {
    /// Render as one display string: `<Role>: <content>` per message, joined by newlines.
    pub fn render(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("{}: {}", m.role.label(), m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Convert to provider chat messages.
    pub fn to_chat_messages(&self) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .map(|m| ChatMessage::new(m.role.chat_role(), m.content.clone()))
            .collect()
    }
}

/// A knowledge-base chat prompt definition loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Creator identifier
    #[serde(rename = "createdBy", default)]
    pub created_by: String,

    /// Template for the retrieved context; receives `{{context}}`
    #[serde(rename = "contextTemplate")]
    pub context_template: String,

    /// Template for the user question; receives `{{question}}`
    #[serde(rename = "questionTemplate")]
    pub question_template: String,
}

impl PromptDefinition {
    /// The prompt used when no definition exists on disk.
    pub fn builtin() -> Self {
        Self {
            id: DEFAULT_PROMPT_ID.to_string(),
            title: "Knowledge base chat".to_string(),
            api_version: "1.0".to_string(),
            created_by: "builtin".to_string(),
            context_template: DEFAULT_CONTEXT_TEMPLATE.to_string(),
            question_template: DEFAULT_QUESTION_TEMPLATE.to_string(),
        }
    }
}
