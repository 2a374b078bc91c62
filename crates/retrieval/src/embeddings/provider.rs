//! Embedding provider trait and factory.

use benebot_core::{AppConfig, AppError, AppResult};
use std::sync::Arc;

/// Trait for embedding providers.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "trigram", "openai", "ollama")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in a batch.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Retrieval("No embedding returned".to_string()))
    }
}

/// Create an embedding provider based on configuration.
pub fn create_provider(config: &AppConfig) -> AppResult<Arc<dyn EmbeddingProvider>> {
    match config.embedding_provider.as_str() {
        "trigram" => {
            let provider =
                super::providers::trigram::TrigramProvider::new(config.embedding_dimensions);
            Ok(Arc::new(provider))
        }

        "ollama" => {
            let provider = super::providers::ollama::OllamaEmbeddings::new(
                &config.ollama_endpoint,
                &config.embedding_model,
                config.embedding_dimensions,
            );
            Ok(Arc::new(provider))
        }

        "openai" => {
            let api_key = config.api_key.as_deref().ok_or_else(|| {
                AppError::Config(
                    "OpenAI embeddings require an API key (BENEBOT_API_KEY or OPENAI_API_KEY)"
                        .to_string(),
                )
            })?;
            let provider = super::providers::openai::OpenAiEmbeddings::new(
                api_key,
                &config.embedding_model,
                config.embedding_dimensions,
            );
            Ok(Arc::new(provider))
        }

        _ => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: trigram, ollama, openai",
            config.embedding_provider
        ))),
    }
}
