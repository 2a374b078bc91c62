//! Benefits-document source agent ("pdf").
//!
//! Answers from the indexed plan documents (Evidence of Coverage and
//! benefits charts). Uses the conversation history block in its prompt.

use crate::agent::{fixed_token_stream, SourceAgent};
use crate::session::history_block;
use crate::types::{ChatMessage, Citation, AGENT_PDF};
use benebot_core::{AppError, AppResult};
use benebot_llm::{LlmClient, LlmRequest, TokenStream};
use benebot_prompt::PromptSet;
use benebot_retrieval::{EmbeddingProvider, VectorIndex};
use std::sync::Arc;

const NO_CONTEXT_FALLBACK: &str =
    "I couldn't find any relevant information in the provided documents.";

const ANSWER_TEMPERATURE: f32 = 0.2;
const ANSWER_MAX_TOKENS: u32 = 256;

pub struct BenefitsAgent {
    index: Arc<dyn VectorIndex>,
    embeddings: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptSet>,
    model: String,
    top_k: usize,
    max_chunk_chars: usize,
    history_turns: usize,
}

impl BenefitsAgent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embeddings: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmClient>,
        prompts: Arc<PromptSet>,
        model: &str,
        top_k: usize,
        max_chunk_chars: usize,
        history_turns: usize,
    ) -> Self {
        Self {
            index,
            embeddings,
            llm,
            prompts,
            model: model.to_string(),
            top_k,
            max_chunk_chars,
            history_turns,
        }
    }

    fn truncate_chars(&self, text: &str) -> String {
        if text.chars().count() <= self.max_chunk_chars {
            text.to_string()
        } else {
            text.chars().take(self.max_chunk_chars).collect()
        }
    }
}

#[async_trait::async_trait]
impl SourceAgent for BenefitsAgent {
    fn name(&self) -> &str {
        AGENT_PDF
    }

    async fn retrieve(&self, question: &str) -> AppResult<(String, Vec<Citation>)> {
        let query_vec = self.embeddings.embed(question).await?;

        let index = Arc::clone(&self.index);
        let top_k = self.top_k;
        let results = tokio::task::spawn_blocking(move || index.search(&query_vec, top_k))
            .await
            .map_err(|e| AppError::Retrieval(format!("Retrieval task failed: {}", e)))??;

        let mut chunks = Vec::with_capacity(results.len());
        let mut citations = Vec::with_capacity(results.len());
        for (passage, score) in results {
            chunks.push(self.truncate_chars(&passage.text));
            citations.push(Citation {
                source: passage.source,
                page: passage.page,
                id: Some(passage.id),
                score: Some(score),
            });
        }

        Ok((chunks.join("\n\n---\n\n"), citations))
    }

    async fn stream_answer(
        &self,
        question: &str,
        history: &[ChatMessage],
        context: Option<String>,
    ) -> AppResult<TokenStream> {
        let context = match context {
            Some(ctx) => ctx,
            None => self.retrieve(question).await?.0,
        };

        if context.trim().is_empty() {
            return Ok(fixed_token_stream(NO_CONTEXT_FALLBACK));
        }

        let history = history_block(history, self.history_turns);
        let prompt = self.prompts.render_benefits(&context, &history, question)?;
        let request = LlmRequest::new(&prompt, &self.model)
            .with_temperature(ANSWER_TEMPERATURE)
            .with_max_tokens(ANSWER_MAX_TOKENS)
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

#[cfg(test)]
mod tests {
    use super::*;
    use benebot_llm::{LlmResponse, TokenChunk};
    use benebot_retrieval::embeddings::providers::trigram::TrigramProvider;
    use benebot_retrieval::{Passage, SqliteVectorIndex};
    use futures::StreamExt;

    struct ScriptedLlm {
        tokens: Vec<String>,
    }

    #[async_trait::async_trait]
    impl LlmClient for ScriptedLlm {
        fn provider_name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _request: &LlmRequest) -> AppResult<LlmResponse> {
            Ok(LlmResponse {
                content: self.tokens.concat(),
                model: "test".to_string(),
            })
        }

        async fn stream(&self, request: &LlmRequest) -> AppResult<TokenStream> {
            assert!(request.stream);
            let chunks: Vec<AppResult<TokenChunk>> = self
                .tokens
                .iter()
                .map(|t| {
                    Ok(TokenChunk {
                        content: t.clone(),
                        done: false,
                    })
                })
                .collect();
            Ok(Box::pin(futures::stream::iter(chunks)))
        }
    }

    async fn agent_with_passages(texts: &[&str]) -> BenefitsAgent {
        let embeddings: Arc<dyn EmbeddingProvider> = Arc::new(TrigramProvider::new(64));
        let index: Arc<dyn VectorIndex> = Arc::new(SqliteVectorIndex::in_memory().unwrap());
        for (i, text) in texts.iter().enumerate() {
            let embedding = embeddings.embed(text).await.unwrap();
            index
                .upsert(&Passage {
                    id: format!("p{}", i),
                    source: "eoc.pdf".to_string(),
                    page: Some(i as u32 + 1),
                    text: text.to_string(),
                    embedding: Some(embedding),
                })
                .unwrap();
        }

        BenefitsAgent::new(
            index,
            embeddings,
            Arc::new(ScriptedLlm {
                tokens: vec!["Your copay ".to_string(), "is $40.".to_string()],
            }),
            Arc::new(PromptSet::builtin().unwrap()),
            "test-model",
            5,
            900,
            4,
        )
    }

    #[tokio::test]
    async fn test_retrieve_returns_context_and_citations() {
        let agent = agent_with_passages(&[
            "Specialist copay is $40 per visit.",
            "Annual deductible is $500.",
        ])
        .await;

        let (context, citations) = agent.retrieve("specialist copay").await.unwrap();
        assert!(context.contains("Specialist copay"));
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].source, "eoc.pdf");
        assert!(citations[0].score.is_some());
    }

    #[tokio::test]
    async fn test_retrieve_empty_index_is_not_an_error() {
        let agent = agent_with_passages(&[]).await;
        let (context, citations) = agent.retrieve("anything").await.unwrap();
        assert!(context.is_empty());
        assert!(citations.is_empty());
    }

    #[tokio::test]
    async fn test_stream_answer_empty_context_yields_fallback() {
        let agent = agent_with_passages(&[]).await;
        let mut stream = agent
            .stream_answer("question", &[], Some("   \n".to_string()))
            .await
            .unwrap();

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.content, NO_CONTEXT_FALLBACK);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_stream_answer_forwards_tokens_in_order() {
        let agent = agent_with_passages(&["Specialist copay is $40."]).await;
        let stream = agent
            .stream_answer("copay?", &[], Some("Specialist copay is $40.".to_string()))
            .await
            .unwrap();

        let tokens: Vec<String> = stream
            .map(|r| r.unwrap().content)
            .collect::<Vec<_>>()
            .await;
        assert_eq!(tokens, vec!["Your copay ", "is $40."]);
    }

    #[tokio::test]
    async fn test_count() {
        let agent = agent_with_passages(&["a", "b", "c"]).await;
        assert_eq!(agent.count().await, 3);
    }

    #[tokio::test]
    async fn test_truncation_respects_char_boundaries() {
        let agent = agent_with_passages(&[]).await;
        let long = "é".repeat(2000);
        let truncated = agent.truncate_chars(&long);
        assert_eq!(truncated.chars().count(), 900);
    }
}
