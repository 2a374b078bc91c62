//! Index statistics command.

use crate::app::App;
use benebot_core::{config::AppConfig, AppResult};
use clap::Args;

/// Show index statistics
#[derive(Args, Debug)]
pub struct StatsCommand {}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let app = App::build(config).await?;

        println!("Embedding provider: {}", app.embeddings.provider_name());
        println!("Embedding model:    {}", app.embeddings.model_name());
        println!();

        for agent in &app.agents {
            let count = agent.count().await;
            if count < 0 {
                println!("{:>8}: index unavailable", agent.name());
            } else {
                println!("{:>8}: {} passage(s)", agent.name(), count);
            }
        }

        Ok(())
    }
}
