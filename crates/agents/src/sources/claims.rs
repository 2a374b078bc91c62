//! Claims-history source agent ("claims").
//!
//! Answers from the indexed claim records. Context passages are numbered
//! and tagged with their source so the model can reference specific
//! claims; conversation history is not used by this source.

use crate::agent::{fixed_token_stream, SourceAgent};
use crate::types::{ChatMessage, Citation, AGENT_CLAIMS};
use benebot_core::{AppError, AppResult};
use benebot_llm::{LlmClient, LlmRequest, TokenStream};
use benebot_prompt::PromptSet;
use benebot_retrieval::{EmbeddingProvider, VectorIndex};
use std::sync::Arc;

const NO_CONTEXT_FALLBACK: &str = "I couldn't find that in the provided claims.";

pub struct ClaimsAgent {
    index: Arc<dyn VectorIndex>,
    embeddings: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptSet>,
    model: String,
    top_k: usize,
}

impl ClaimsAgent {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embeddings: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmClient>,
        prompts: Arc<PromptSet>,
        model: &str,
        top_k: usize,
    ) -> Self {
        Self {
            index,
            embeddings,
            llm,
            prompts,
            model: model.to_string(),
            top_k,
        }
    }
}

#[async_trait::async_trait]
impl SourceAgent for ClaimsAgent {
    fn name(&self) -> &str {
        AGENT_CLAIMS
    }

    async fn retrieve(&self, question: &str) -> AppResult<(String, Vec<Citation>)> {
        let query_vec = self.embeddings.embed(question).await?;

        let index = Arc::clone(&self.index);
        let top_k = self.top_k;
        let results = tokio::task::spawn_blocking(move || index.search(&query_vec, top_k))
            .await
            .map_err(|e| AppError::Retrieval(format!("Retrieval task failed: {}", e)))??;

        let mut blocks = Vec::with_capacity(results.len());
        let mut citations = Vec::with_capacity(results.len());
        for (i, (passage, _score)) in results.into_iter().enumerate() {
            blocks.push(format!(
                "[{}] {}\n(SOURCE: {})",
                i + 1,
                passage.text,
                passage.source
            ));
            citations.push(Citation {
                source: passage.source,
                page: passage.page,
                id: Some(passage.id),
                score: None,
            });
        }

        Ok((blocks.join("\n\n"), citations))
    }

    async fn stream_answer(
        &self,
        question: &str,
        _history: &[ChatMessage],
        context: Option<String>,
    ) -> AppResult<TokenStream> {
        let context = match context {
            Some(ctx) => ctx,
            None => self.retrieve(question).await?.0,
        };

        if context.trim().is_empty() {
            return Ok(fixed_token_stream(NO_CONTEXT_FALLBACK));
        }

        let prompt = self.prompts.render_claims(&context, question)?;
        let system = self.prompts.claims_system()?;
        let request = LlmRequest::new(&prompt, &self.model)
            .with_system(&system)
            .with_temperature(0.0)
            .with_streaming();

        self.llm.stream(&request).await
    }

    async fn count(&self) -> i64 {
        let index = Arc::clone(&self.index);
        let counted = tokio::task::spawn_blocking(move || index.count()).await;
        match counted {
            Ok(Ok(n)) => n as i64,
            _ => -1,
        }
    }
}
