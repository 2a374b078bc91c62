//! Interactive chat loop.
//!
//! Reads one query per line, streams the turn's events to the terminal
//! and prints an elapsed-time line after each answer. `:q`, `:quit` and
//! `:exit` leave the loop.

use crate::app::App;
use benebot_agents::StreamEvent;
use benebot_core::{config::AppConfig, AppResult};
use clap::Args;
use futures::StreamExt;
use std::io::{BufRead, Write};
use std::time::Instant;

/// Interactive chat loop
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Thread id to resume (default: a fresh conversation)
    #[arg(short, long)]
    pub thread: Option<String>,
}

impl ChatCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let app = App::build(config).await?;
        let thread_id = self
            .thread
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        println!("Benebot chat (thread {}). Type :q to quit.", thread_id);

        let stdin = std::io::stdin();
        loop {
            print!("> ");
            std::io::stdout().flush().ok();

            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                break;
            }
            let query = line.trim();
            if query.is_empty() {
                continue;
            }
            if matches!(query, ":q" | ":quit" | ":exit") {
                break;
            }

            run_one_turn(&app, &thread_id, query).await;
        }

        println!("Bye.");
        Ok(())
    }
}

async fn run_one_turn(app: &App, thread_id: &str, query: &str) {
    let started = Instant::now();
    let mut stream = app.orchestrator.run_turn(thread_id, query);
    let mut current_agent: Option<String> = None;

    while let Some(event) = stream.next().await {
        match event {
            StreamEvent::Route { route, .. } => {
                println!("[route: {}]", route);
            }
            StreamEvent::Citations { agent, citations } => {
                println!("[{}: {} citation(s)]", agent, citations.len());
            }
            StreamEvent::Token { agent, token } => {
                if current_agent.as_deref() != Some(agent.as_str()) {
                    if current_agent.is_some() {
                        println!();
                    }
                    print!("[{}] ", agent);
                    current_agent = Some(agent);
                }
                print!("{}", token);
                std::io::stdout().flush().ok();
            }
            StreamEvent::Done { .. } => {}
            StreamEvent::Final { .. } => {
                println!();
            }
        }
    }

    println!("(elapsed {:.2}s)", started.elapsed().as_secs_f64());
}
