//! One-shot ask command.

use crate::app::App;
use benebot_agents::StreamEvent;
use benebot_core::{config::AppConfig, AppError, AppResult};
use clap::Args;
use futures::StreamExt;
use std::io::Write;

/// Ask a single question and print the answer
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Thread id for conversation continuity
    #[arg(short, long)]
    pub thread: Option<String>,

    /// Emit raw server-sent-event frames instead of plain text
    #[arg(long)]
    pub sse: bool,

    /// Output the final answer as JSON
    #[arg(long, conflicts_with = "sse")]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let app = App::build(config).await?;
        let thread_id = self
            .thread
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut stream = app.orchestrator.run_turn(&thread_id, &self.question);
        let mut final_answer = None;
        let mut all_citations = Vec::new();

        while let Some(event) = stream.next().await {
            if self.sse {
                print!("{}", event.to_sse()?);
                std::io::stdout().flush().ok();
            }
            match event {
                StreamEvent::Citations { citations, .. } => {
                    all_citations.extend(citations);
                }
                StreamEvent::Final { answer, .. } => {
                    final_answer = Some(answer);
                }
                _ => {}
            }
        }

        let answer = final_answer
            .ok_or_else(|| AppError::Other("Turn ended without a final answer".to_string()))?;

        if self.sse {
            return Ok(());
        }

        if self.json {
            let output = serde_json::json!({
                "thread_id": thread_id,
                "answer": answer,
                "citations": all_citations,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", answer);
        }

        Ok(())
    }
}
