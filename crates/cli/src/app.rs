//! Application wiring.
//!
//! Builds the orchestrator and its collaborators once at startup and
//! hands them to the command handlers. No global state; everything is
//! constructed here and passed down.

use benebot_agents::{
    BenefitsAgent, ClaimsAgent, IntentGate, IntentSeeds, IntentThresholds, Orchestrator, Router,
    RouterKeywords, SourceAgent, SqliteSessionStore,
};
use benebot_core::{config::AppConfig, AppResult};
use benebot_llm::{create_client, LlmClient};
use benebot_prompt::load_prompts;
use benebot_retrieval::{create_provider, EmbeddingProvider, SqliteVectorIndex, VectorIndex};
use std::sync::Arc;

pub struct App {
    pub orchestrator: Arc<Orchestrator>,
    pub agents: Vec<Arc<dyn SourceAgent>>,
    pub embeddings: Arc<dyn EmbeddingProvider>,
}

impl App {
    /// Build the full agent stack from configuration.
    pub async fn build(config: &AppConfig) -> AppResult<Self> {
        config.ensure_benebot_dir()?;

        let prompts = Arc::new(load_prompts(&config.workspace)?);
        let embeddings = create_provider(config)?;

        let pdf_index: Arc<dyn VectorIndex> =
            Arc::new(SqliteVectorIndex::open(&config.index_db_path("pdf"))?);
        let claims_index: Arc<dyn VectorIndex> =
            Arc::new(SqliteVectorIndex::open(&config.index_db_path("claims"))?);

        let benefits_llm = client_for(config, &config.provider)?;
        let claims_llm = client_for(config, &config.claims_provider)?;
        // The router shares the benefits provider but runs a smaller model.
        let router_llm = client_for(config, &config.provider)?;

        let benefits: Arc<dyn SourceAgent> = Arc::new(BenefitsAgent::new(
            Arc::clone(&pdf_index),
            Arc::clone(&embeddings),
            benefits_llm,
            Arc::clone(&prompts),
            &config.model,
            config.tuning.pdf_top_k,
            config.tuning.max_chunk_chars,
            config.tuning.history_turns,
        ));
        let claims: Arc<dyn SourceAgent> = Arc::new(ClaimsAgent::new(
            Arc::clone(&claims_index),
            Arc::clone(&embeddings),
            claims_llm,
            Arc::clone(&prompts),
            &config.claims_model,
            config.tuning.claims_top_k,
        ));

        let intent = IntentGate::new(
            Arc::clone(&embeddings),
            &IntentSeeds::default(),
            IntentThresholds::from_tuning(&config.tuning),
        )
        .await?;

        let router = Router::new(
            router_llm,
            Arc::clone(&prompts),
            &config.router_model,
            RouterKeywords::default(),
        );

        let store = Arc::new(SqliteSessionStore::open(&config.checkpoint_db_path())?);

        // Composition order: benefits before claims.
        let agents = vec![Arc::clone(&benefits), Arc::clone(&claims)];
        let orchestrator = Arc::new(Orchestrator::new(
            intent,
            router,
            agents.clone(),
            store,
            config.member.clone(),
            config.tuning.clone(),
        ));

        Ok(Self {
            orchestrator,
            agents,
            embeddings,
        })
    }
}

fn client_for(config: &AppConfig, provider: &str) -> AppResult<Arc<dyn LlmClient>> {
    let endpoint = if provider == "ollama" {
        Some(config.ollama_endpoint.as_str())
    } else {
        None
    };
    create_client(provider, endpoint, config.api_key.as_deref())
}
