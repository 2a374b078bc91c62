//! Benebot Prompt Library
//!
//! Handlebars templates for the benefits/claims answer prompts and the
//! router classification prompt, with per-workspace overrides.

pub mod loader;
pub mod templates;

pub use loader::load_prompts;
pub use templates::PromptSet;
