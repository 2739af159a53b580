//! Prompts command handler.
//!
//! Lists the prompt definitions the service would pick from.

use clap::Args;
use kbchat_core::{config::AppConfig, AppResult};
use kbchat_prompt::{list_prompts, resolve_prompt, DEFAULT_PROMPT_ID};

/// List available prompt definitions
#[derive(Args, Debug)]
pub struct PromptsCommand {
    /// Show the prompt a knowledge base resolves to
    #[arg(long)]
    pub knowledge_base: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl PromptsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::debug!("Prompts options: {:?}", self);

        let prompts_dir = config.prompts_dir();

        if let Some(ref kb) = self.knowledge_base {
            let definition = resolve_prompt(prompts_dir.as_deref(), kb)?;
            if self.json {
                println!("{}", serde_json::to_string_pretty(&definition)?);
            } else {
                println!("{} ({})", definition.id, definition.title);
                println!("\ncontextTemplate:\n{}", definition.context_template);
                println!("\nquestionTemplate:\n{}", definition.question_template);
            }
            return Ok(());
        }

        let ids = match prompts_dir {
            Some(ref dir) => list_prompts(dir)?,
            None => Vec::new(),
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&ids)?);
        } else if ids.is_empty() {
            println!("No prompt files found; using built-in '{}'", DEFAULT_PROMPT_ID);
        } else {
            for id in ids {
                println!("{}", id);
            }
        }

        Ok(())
    }
}
