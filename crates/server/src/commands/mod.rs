//! Command handlers for the kbchat binary.

pub mod prompts;
pub mod serve;

// Re-export command types for convenience
pub use prompts::PromptsCommand;
pub use serve::ServeCommand;
