//! Built-in prompt templates and rendering.
//!
//! Prompt wording is tuning data. The defaults below cover the benefits
//! answer prompt, the claims answer prompt and the router classification
//! prompt; any of them can be overridden per workspace (see `loader`).

use benebot_core::{AppError, AppResult};
use handlebars::Handlebars;
use serde_json::json;

/// Template id for the benefits (plan document) answer prompt.
pub const BENEFITS_ANSWER: &str = "benefits.answer";

/// Template id for the claims answer prompt (user part).
pub const CLAIMS_ANSWER: &str = "claims.answer";

/// Template id for the claims system instructions.
pub const CLAIMS_SYSTEM: &str = "claims.system";

/// Template id for the router classification prompt.
pub const ROUTER_CLASSIFY: &str = "router.classify";

const BENEFITS_ANSWER_DEFAULT: &str = "\
You are a concise, friendly assistant.
Answer ONLY using the provided context. If the answer is not in the context, say:
\"I couldn't find that in the provided documents.\"

Context:
{{context}}

Chat history (most recent first):
{{history}}

User: {{question}}
Assistant (brief and to the point):";

const CLAIMS_SYSTEM_DEFAULT: &str = "\
You are a helpful claims assistant. Use the claims context to accurately answer \
the user's questions about their claims. When asked for lists or summaries \
(latest claim, totals such as out-of-pocket), compute from the provided context. \
If context is insufficient, say you don't know.";

const CLAIMS_ANSWER_DEFAULT: &str = "\
Question: {{question}}

Context:
{{context}}";

const ROUTER_CLASSIFY_DEFAULT: &str = "\
You are a request router. Decide which knowledge base can answer the user's question.
Return exactly one token: pdf, claims, or both.

Rules:
- Use 'pdf' for questions about plan documents, Evidence of Coverage, benefits charts, copays, exclusions, rules.
- Use 'claims' for questions about claims, adjudication, line items, diagnosis/procedure codes, amounts owed or paid.
- Use 'both' if the question needs info from both sources.

Question: {{question}}
Answer (pdf|claims|both):";

/// Registry of rendered prompt templates.
///
/// Constructed once at startup and shared by the agents; templates are
/// registered as Handlebars strings with HTML escaping disabled.
pub struct PromptSet {
    handlebars: Handlebars<'static>,
}

impl PromptSet {
    /// Create a set containing only the built-in templates.
    pub fn builtin() -> AppResult<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);

        for (id, template) in [
            (BENEFITS_ANSWER, BENEFITS_ANSWER_DEFAULT),
            (CLAIMS_ANSWER, CLAIMS_ANSWER_DEFAULT),
            (CLAIMS_SYSTEM, CLAIMS_SYSTEM_DEFAULT),
            (ROUTER_CLASSIFY, ROUTER_CLASSIFY_DEFAULT),
        ] {
            handlebars
                .register_template_string(id, template)
                .map_err(|e| {
                    AppError::Prompt(format!("Failed to register template '{}': {}", id, e))
                })?;
        }

        Ok(Self { handlebars })
    }

    /// Replace one template, keeping the rest.
    pub fn register_override(&mut self, id: &str, template: &str) -> AppResult<()> {
        self.handlebars
            .register_template_string(id, template)
            .map_err(|e| AppError::Prompt(format!("Failed to register template '{}': {}", id, e)))
    }

    /// Render the benefits answer prompt.
    pub fn render_benefits(
        &self,
        context: &str,
        history: &str,
        question: &str,
    ) -> AppResult<String> {
        self.render(
            BENEFITS_ANSWER,
            &json!({ "context": context, "history": history, "question": question }),
        )
    }

    /// Render the claims answer prompt (user part).
    pub fn render_claims(&self, context: &str, question: &str) -> AppResult<String> {
        self.render(
            CLAIMS_ANSWER,
            &json!({ "context": context, "question": question }),
        )
    }

    /// Render the claims system instructions.
    pub fn claims_system(&self) -> AppResult<String> {
        self.render(CLAIMS_SYSTEM, &json!({}))
    }

    /// Render the router classification prompt.
    pub fn render_router(&self, question: &str) -> AppResult<String> {
        self.render(ROUTER_CLASSIFY, &json!({ "question": question }))
    }

    fn render(&self, id: &str, vars: &serde_json::Value) -> AppResult<String> {
        self.handlebars
            .render(id, vars)
            .map_err(|e| AppError::Prompt(format!("Failed to render template '{}': {}", id, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_benefits() {
        let prompts = PromptSet::builtin().unwrap();
        let rendered = prompts
            .render_benefits("Specialist copay: $40.", "(none)", "What is my copay?")
            .unwrap();

        assert!(rendered.contains("Specialist copay: $40."));
        assert!(rendered.contains("(none)"));
        assert!(rendered.contains("User: What is my copay?"));
    }

    #[test]
    fn test_render_router() {
        let prompts = PromptSet::builtin().unwrap();
        let rendered = prompts.render_router("Why was my claim denied?").unwrap();

        assert!(rendered.contains("Question: Why was my claim denied?"));
        assert!(rendered.contains("pdf|claims|both"));
    }

    #[test]
    fn test_claims_system_is_static() {
        let prompts = PromptSet::builtin().unwrap();
        let system = prompts.claims_system().unwrap();
        assert!(system.contains("claims assistant"));
    }

    #[test]
    fn test_override_replaces_template() {
        let mut prompts = PromptSet::builtin().unwrap();
        prompts
            .register_override(ROUTER_CLASSIFY, "Q: {{question}}")
            .unwrap();

        let rendered = prompts.render_router("test").unwrap();
        assert_eq!(rendered, "Q: test");
    }

    #[test]
    fn test_no_html_escaping() {
        let prompts = PromptSet::builtin().unwrap();
        let rendered = prompts
            .render_claims("Allowed amount > $100 & plan paid < $80", "How much do I owe?")
            .unwrap();
        assert!(rendered.contains("> $100 & plan paid <"));
    }
}
