//! Document ingestion command.

use benebot_core::{config::AppConfig, AppError, AppResult};
use benebot_retrieval::{create_provider, ingest_jsonl, SqliteVectorIndex, VectorIndex};
use clap::Args;
use std::path::PathBuf;

/// Ingest a JSONL document file into a source index
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Target source index (pdf, claims)
    pub source: String,

    /// JSONL file of passage records ({"text", "source"?, "page"?, "id"?})
    pub file: PathBuf,

    /// Clear the index before ingesting
    #[arg(long)]
    pub reset: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        if !matches!(self.source.as_str(), "pdf" | "claims") {
            return Err(AppError::Config(format!(
                "Unknown source '{}'. Expected: pdf, claims",
                self.source
            )));
        }

        config.ensure_benebot_dir()?;
        let index = SqliteVectorIndex::open(&config.index_db_path(&self.source))?;
        if self.reset {
            index.reset()?;
            println!("Cleared {} index.", self.source);
        }

        let embeddings = create_provider(config)?;
        let report = ingest_jsonl(
            &self.file,
            &index,
            embeddings,
            config.tuning.chunk_size,
            config.tuning.chunk_overlap,
        )
        .await?;

        println!(
            "Ingested {:?} into {}: {} record(s), {} chunk(s), {} skipped. Index now holds {} passage(s).",
            self.file,
            self.source,
            report.records,
            report.chunks,
            report.skipped,
            index.count()?
        );

        Ok(())
    }
}
