//! Source agent contract.
//!
//! One implementation per knowledge source. The orchestrator drives each
//! selected agent through retrieve, then stream_answer with the retrieved
//! (and post-processed) context.

use crate::types::{ChatMessage, Citation};
use benebot_core::AppResult;
use benebot_llm::TokenStream;

/// A retrieve-then-generate agent over one knowledge source.
#[async_trait::async_trait]
pub trait SourceAgent: Send + Sync {
    /// Agent tag, used on stream events ("pdf", "claims").
    fn name(&self) -> &str;

    /// Retrieve context and citations for a question.
    ///
    /// "No results" is not an error: it returns an empty context string
    /// and an empty citation list.
    async fn retrieve(&self, question: &str) -> AppResult<(String, Vec<Citation>)>;

    /// Stream the answer tokens.
    ///
    /// With `context: None` the agent retrieves internally first. A
    /// whitespace-only context yields exactly one fixed fallback sentence;
    /// the generation collaborator is never called with empty context.
    async fn stream_answer(
        &self,
        question: &str,
        history: &[ChatMessage],
        context: Option<String>,
    ) -> AppResult<TokenStream>;

    /// Best-effort count of indexed items; -1 when the index is
    /// unavailable.
    async fn count(&self) -> i64;
}

/// Wrap a fixed text as a single-chunk token stream.
pub fn fixed_token_stream(text: &str) -> TokenStream {
    let chunk = benebot_llm::TokenChunk {
        content: text.to_string(),
        done: true,
    };
    Box::pin(futures::stream::once(async move { Ok(chunk) }))
}
