//! Workspace prompt overrides.
//!
//! Templates under `.benebot/prompts/<id>.hbs` replace the built-in
//! template with the same id.

use crate::templates::PromptSet;
use benebot_core::{AppError, AppResult};
use std::path::Path;

/// Load the prompt set for a workspace: built-ins plus any overrides.
pub fn load_prompts(workspace_path: &Path) -> AppResult<PromptSet> {
    let mut prompts = PromptSet::builtin()?;

    let prompts_dir = workspace_path.join(".benebot/prompts");
    if !prompts_dir.exists() {
        return Ok(prompts);
    }

    for entry in walkdir::WalkDir::new(&prompts_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("hbs") {
            continue;
        }

        let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        let template = std::fs::read_to_string(path).map_err(|e| {
            AppError::Prompt(format!("Failed to read prompt override {:?}: {}", path, e))
        })?;

        prompts.register_override(id, &template)?;
        tracing::info!("Loaded prompt override: {}", id);
    }

    Ok(prompts)
}
