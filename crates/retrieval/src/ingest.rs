//! Document ingestion.
//!
//! Reads JSONL files of passage records, chunks long texts, embeds them
//! in batches, and upserts into a source's vector index.

use crate::embeddings::EmbeddingProvider;
use crate::index::VectorIndex;
use crate::types::{Passage, PassageRecord};
use benebot_core::{AppError, AppResult};
use std::path::Path;
use std::sync::Arc;

const EMBED_BATCH_SIZE: usize = 32;

/// Summary of an ingestion run.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub records: usize,
    pub chunks: usize,
    pub skipped: usize,
}

/// Split text into character windows of `size` with `overlap` characters
/// carried between consecutive windows.
///
/// Splits on character boundaries, never inside a code point. Returns a
/// single chunk when the text fits.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    if size == 0 {
        return vec![text.to_string()];
    }

    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= size {
        return vec![text.to_string()];
    }

    let step = size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}

/// Ingest a JSONL file into the given index.
///
/// Each line is one [`PassageRecord`]. Blank lines are skipped; a
/// malformed line is skipped with a warning rather than aborting the run.
pub async fn ingest_jsonl(
    path: &Path,
    index: &dyn VectorIndex,
    embeddings: Arc<dyn EmbeddingProvider>,
    chunk_size: usize,
    chunk_overlap: usize,
) -> AppResult<IngestReport> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| AppError::Retrieval(format!("Failed to read {:?}: {}", path, e)))?;

    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string();

    let mut report = IngestReport::default();
    let mut pending: Vec<Passage> = Vec::new();

    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let record: PassageRecord = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Skipping malformed record at {}:{}: {}", file_name, line_no + 1, e);
                report.skipped += 1;
                continue;
            }
        };

        report.records += 1;
        let source = record.source.clone().unwrap_or_else(|| file_name.clone());
        let base_id = record
            .id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let chunks = chunk_text(&record.text, chunk_size, chunk_overlap);
        let multi = chunks.len() > 1;
        for (i, chunk) in chunks.into_iter().enumerate() {
            let id = if multi {
                format!("{}-{}", base_id, i)
            } else {
                base_id.clone()
            };
            pending.push(Passage {
                id,
                source: source.clone(),
                page: record.page,
                text: chunk,
                embedding: None,
            });
        }
    }

    for batch in pending.chunks_mut(EMBED_BATCH_SIZE) {
        let texts: Vec<String> = batch.iter().map(|p| p.text.clone()).collect();
        let vectors = embeddings.embed_batch(&texts).await?;
        for (passage, vector) in batch.iter_mut().zip(vectors) {
            passage.embedding = Some(vector);
            index.upsert(passage)?;
            report.chunks += 1;
        }
    }

    tracing::info!(
        "Ingested {} ({} records, {} chunks, {} skipped)",
        file_name,
        report.records,
        report.chunks,
        report.skipped
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::trigram::TrigramProvider;
    use crate::index::SqliteVectorIndex;

    #[test]
    fn test_chunk_text_short() {
        let chunks = chunk_text("short text", 800, 100);
        assert_eq!(chunks, vec!["short text".to_string()]);
    }

    #[test]
    fn test_chunk_text_overlap() {
        let text = "abcdefghij";
        let chunks = chunk_text(text, 4, 2);
        assert_eq!(chunks[0], "abcd");
        assert_eq!(chunks[1], "cdef");
        assert!(chunks.last().unwrap().ends_with('j'));
    }

    #[test]
    fn test_chunk_text_multibyte() {
        let text = "héllo wörld çafé time";
        let chunks = chunk_text(text, 6, 2);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 6);
        }
    }

    #[tokio::test]
    async fn test_ingest_jsonl() {
        let temp = tempfile::TempDir::new().unwrap();
        let file = temp.path().join("benefits.jsonl");
        std::fs::write(
            &file,
            concat!(
                r#"{"text": "Specialist copay is $40 per visit.", "source": "eoc.pdf", "page": 12}"#,
                "\n",
                r#"{"text": "Annual deductible is $500 for in-network care."}"#,
                "\n",
                "not json\n",
            ),
        )
        .unwrap();

        let index = SqliteVectorIndex::in_memory().unwrap();
        let embeddings = Arc::new(TrigramProvider::new(64));

        let report = ingest_jsonl(&file, &index, embeddings, 800, 100)
            .await
            .unwrap();

        assert_eq!(report.records, 2);
        assert_eq!(report.chunks, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(index.count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_ingest_chunks_long_text() {
        let temp = tempfile::TempDir::new().unwrap();
        let file = temp.path().join("long.jsonl");
        let long_text = "word ".repeat(100);
        std::fs::write(
            &file,
            format!(r#"{{"text": "{}", "id": "doc-1"}}"#, long_text.trim()),
        )
        .unwrap();

        let index = SqliteVectorIndex::in_memory().unwrap();
        let embeddings = Arc::new(TrigramProvider::new(64));

        let report = ingest_jsonl(&file, &index, embeddings, 100, 20).await.unwrap();
        assert_eq!(report.records, 1);
        assert!(report.chunks > 1);
        assert_eq!(index.count().unwrap() as usize, report.chunks);
    }
}
