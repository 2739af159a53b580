//! LLM provider implementations.

mod chat_completions;
pub mod chatglm;
pub mod mock;
pub mod openai;

pub use chatglm::ChatGlmClient;
pub use mock::MockClient;
pub use openai::OpenAiClient;

