//! Prompt loader for YAML prompt definitions.

use crate::builder::check_template;
use crate::types::{PromptDefinition, DEFAULT_PROMPT_ID};
use kbchat_core::{AppError, AppResult};
use std::path::Path;

/// Load a prompt definition by ID from a prompts directory.
///
/// Looks for `<prompts_dir>/<id>.yml`.
///
/// # Arguments
/// * `prompts_dir` - Directory holding prompt YAML files
/// * `prompt_id` - Prompt identifier (e.g., "knowledge_base_chat")
///
/// # Returns
/// A parsed and validated `PromptDefinition`.
pub fn load_prompt(prompts_dir: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = prompts_dir.join(format!("{}.yml", prompt_id));

    tracing::debug!("Loading prompt from: {:?}", prompt_file);

    if !prompt_file.exists() {
        return Err(AppError::Prompt(format!(
            "Prompt file not found: {:?}",
            prompt_file
        )));
    }

    let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to parse prompt YAML {:?}: {}",
            prompt_file, e
        ))
    })?;

    validate_prompt(&definition)?;

    tracing::debug!("Loaded prompt: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// List all prompt IDs in a prompts directory, sorted.
pub fn list_prompts(prompts_dir: &Path) -> AppResult<Vec<String>> {
    if !prompts_dir.exists() {
        return Ok(Vec::new());
    }

    let mut prompt_ids = Vec::new();

    for entry in walkdir::WalkDir::new(prompts_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("yml") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                prompt_ids.push(stem.to_string());
            }
        }
    }

    prompt_ids.sort();
    Ok(prompt_ids)
}

/// Pick the prompt for a knowledge base.
///
/// Resolution order: `knowledge_base_chat.<kb>`, then `knowledge_base_chat`,
/// then the built-in definition. Only a missing file falls through; a file
/// that exists but fails to parse is an error.
pub fn resolve_prompt(prompts_dir: Option<&Path>, knowledge_base_name: &str) -> AppResult<PromptDefinition> {
    let Some(dir) = prompts_dir else {
        return Ok(PromptDefinition::builtin());
    };

    let mut candidates = Vec::with_capacity(2);
    if is_plain_name(knowledge_base_name) {
        candidates.push(format!("{}.{}", DEFAULT_PROMPT_ID, knowledge_base_name));
    }
    candidates.push(DEFAULT_PROMPT_ID.to_string());

    for id in candidates {
        if dir.join(format!("{}.yml", id)).is_file() {
            return load_prompt(dir, &id);
        }
    }

    tracing::debug!("No prompt file in {:?}; using built-in prompt", dir);
    Ok(PromptDefinition::builtin())
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && name != "." && name != ".."
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: '{}'. Expected format: 'x.y'",
            def.api_version
        )));
    }

    if def.context_template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt contextTemplate cannot be empty".to_string(),
        ));
    }

    if def.question_template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt questionTemplate cannot be empty".to_string(),
        ));
    }

    check_template("context", &def.context_template)?;
    check_template("question", &def.question_template)?;

    Ok(())
}
