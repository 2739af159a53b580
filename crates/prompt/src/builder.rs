//! Prompt assembler for retrieval-augmented chat.

use crate::types::{ChatPrompt, ConversationTurn, PromptDefinition, PromptMessage, PromptRole};
use handlebars::Handlebars;
use kbchat_core::{AppError, AppResult};
use serde_json::json;

/// Assemble the chat prompt for one question.
///
/// The result holds, in order:
/// 1. every history turn verbatim (user -> Human, assistant -> AI)
/// 2. the context template rendered with `context`
/// 3. the question template rendered with `question`
///
/// History contents are copied as-is and never rendered as templates, so
/// braces in earlier turns reach the model unchanged.
///
/// # Arguments
/// * `definition` - Prompt definition providing both templates
/// * `history` - Prior turns supplied by the caller
/// * `context` - Retrieved passage contents joined by newlines
/// * `question` - The raw user query
///
/// # Example
/// ```no_run
/// use kbchat_prompt::{assemble_prompt, PromptDefinition};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = assemble_prompt(&PromptDefinition::builtin(), &[], "Rust is fast.", "Is Rust fast?")?;
/// println!("{}", prompt.render());
/// # Ok(())
/// # }
/// ```
pub fn assemble_prompt(
    definition: &PromptDefinition,
    history: &[ConversationTurn],
    context: &str,
    question: &str,
) -> AppResult<ChatPrompt> {
    tracing::debug!(
        "Assembling prompt '{}' with {} history turns",
        definition.id,
        history.len()
    );

    let mut messages: Vec<PromptMessage> = history
        .iter()
        .map(|turn| PromptMessage::new(turn.role.into(), turn.content.clone()))
        .collect();

    let variables = json!({ "context": context, "question": question });

    messages.push(PromptMessage::new(
        PromptRole::Human,
        render_template(&definition.context_template, &variables)?,
    ));
    messages.push(PromptMessage::new(
        PromptRole::Human,
        render_template(&definition.question_template, &variables)?,
    ));

    Ok(ChatPrompt { messages })
}

/// Join passage contents into the `{{context}}` value.
pub fn join_context<'a, I>(contents: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    contents.into_iter().collect::<Vec<_>>().join("\n")
}

/// Check that a template parses.
pub(crate) fn check_template(name: &str, template: &str) -> AppResult<()> {
    let mut handlebars = Handlebars::new();
    handlebars
        .register_template_string(name, template)
        .map_err(|e| AppError::Prompt(format!("Invalid {} template: {}", name, e)))
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &serde_json::Value) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Plain text output; passages must not be HTML-escaped
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}
