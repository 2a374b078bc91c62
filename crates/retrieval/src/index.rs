//! SQLite-backed vector index.
//!
//! Each knowledge source owns one index database. Embeddings are stored as
//! little-endian f32 BLOBs; search is brute-force cosine similarity over
//! all rows, which is adequate for the per-member corpus sizes this tool
//! handles.

use crate::types::Passage;
use benebot_core::{AppError, AppResult};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

/// Trait for vector index backends.
///
/// Implementations must not treat an empty index or an empty result set as
/// an error.
pub trait VectorIndex: Send + Sync {
    /// Insert or update a passage with its embedding.
    fn upsert(&self, passage: &Passage) -> AppResult<()>;

    /// Top-k most similar passages, ordered by descending score.
    fn search(&self, query_embedding: &[f32], top_k: usize) -> AppResult<Vec<(Passage, f32)>>;

    /// Number of indexed passages.
    fn count(&self) -> AppResult<u64>;

    /// Remove all passages.
    fn reset(&self) -> AppResult<()>;
}

/// SQLite implementation of [`VectorIndex`].
pub struct SqliteVectorIndex {
    conn: Mutex<Connection>,
}

impl SqliteVectorIndex {
    /// Open (creating if needed) an index database at the given path.
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Retrieval(format!("Failed to create index directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::Retrieval(format!("Failed to open index: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS passages (
                id TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                page INTEGER,
                text TEXT NOT NULL,
                embedding BLOB NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_passages_source ON passages(source);
            "#,
        )
        .map_err(|e| AppError::Retrieval(format!("Failed to create tables: {}", e)))?;

        tracing::debug!("Opened vector index at {:?}", db_path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory index, used by tests.
    pub fn in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Retrieval(format!("Failed to open index: {}", e)))?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS passages (
                id TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                page INTEGER,
                text TEXT NOT NULL,
                embedding BLOB NOT NULL
            );
            "#,
        )
        .map_err(|e| AppError::Retrieval(format!("Failed to create tables: {}", e)))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Retrieval("Index lock poisoned".to_string()))
    }
}

impl VectorIndex for SqliteVectorIndex {
    fn upsert(&self, passage: &Passage) -> AppResult<()> {
        let embedding = passage
            .embedding
            .as_ref()
            .ok_or_else(|| AppError::Retrieval("Passage missing embedding".to_string()))?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO passages (id, source, page, text, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                passage.id,
                passage.source,
                passage.page.map(|p| p as i64),
                passage.text,
                embedding_to_bytes(embedding),
            ],
        )
        .map_err(|e| AppError::Retrieval(format!("Failed to insert passage: {}", e)))?;

        Ok(())
    }

    fn search(&self, query_embedding: &[f32], top_k: usize) -> AppResult<Vec<(Passage, f32)>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id, source, page, text, embedding FROM passages")
            .map_err(|e| AppError::Retrieval(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                let embedding_bytes: Vec<u8> = row.get(4)?;
                Ok(Passage {
                    id: row.get(0)?,
                    source: row.get(1)?,
                    page: row.get::<_, Option<i64>>(2)?.map(|p| p as u32),
                    text: row.get(3)?,
                    embedding: Some(bytes_to_embedding(&embedding_bytes)),
                })
            })
            .map_err(|e| AppError::Retrieval(format!("Failed to query passages: {}", e)))?;

        let mut results: Vec<(Passage, f32)> = rows
            .filter_map(|r| r.ok())
            .map(|passage| {
                let score = passage
                    .embedding
                    .as_deref()
                    .map(|e| cosine_similarity(query_embedding, e))
                    .unwrap_or(0.0);
                (passage, score)
            })
            .collect();

        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(top_k);

        tracing::debug!("Retrieved {} passages (requested top-{})", results.len(), top_k);

        Ok(results)
    }

    fn count(&self) -> AppResult<u64> {
        let conn = self.lock()?;
        conn.query_row("SELECT COUNT(*) FROM passages", [], |row| {
            row.get::<_, i64>(0).map(|v| v as u64)
        })
        .map_err(|e| AppError::Retrieval(format!("Failed to count passages: {}", e)))
    }

    fn reset(&self) -> AppResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM passages", [])
            .map_err(|e| AppError::Retrieval(format!("Failed to delete passages: {}", e)))?;
        tracing::info!("Reset vector index");
        Ok(())
    }
}

/// Convert an embedding vector to bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert stored bytes back to an embedding vector.
fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity between two vectors; 0.0 on dimension mismatch or
/// zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(id: &str, embedding: Vec<f32>) -> Passage {
        Passage {
            id: id.to_string(),
            source: "eoc.pdf".to_string(),
            page: Some(3),
            text: format!("passage {}", id),
            embedding: Some(embedding),
        }
    }

    #[test]
    fn test_upsert_and_search_ordering() {
        let index = SqliteVectorIndex::in_memory().unwrap();
        index.upsert(&passage("a", vec![1.0, 0.0, 0.0])).unwrap();
        index.upsert(&passage("b", vec![0.0, 1.0, 0.0])).unwrap();
        index.upsert(&passage("c", vec![0.7, 0.7, 0.0])).unwrap();

        let results = index.search(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0.id, "a");
        assert_eq!(results[1].0.id, "c");
        assert!(results[0].1 > results[1].1);
    }

    #[test]
    fn test_empty_index_returns_empty() {
        let index = SqliteVectorIndex::in_memory().unwrap();
        let results = index.search(&[1.0, 0.0], 5).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_upsert_replaces() {
        let index = SqliteVectorIndex::in_memory().unwrap();
        index.upsert(&passage("a", vec![1.0, 0.0])).unwrap();
        index.upsert(&passage("a", vec![0.0, 1.0])).unwrap();
        assert_eq!(index.count().unwrap(), 1);
    }

    #[test]
    fn test_count_and_reset() {
        let index = SqliteVectorIndex::in_memory().unwrap();
        index.upsert(&passage("a", vec![1.0])).unwrap();
        index.upsert(&passage("b", vec![0.5])).unwrap();
        assert_eq!(index.count().unwrap(), 2);

        index.reset().unwrap();
        assert_eq!(index.count().unwrap(), 0);
    }

    #[test]
    fn test_missing_embedding_is_error() {
        let index = SqliteVectorIndex::in_memory().unwrap();
        let mut p = passage("a", vec![1.0]);
        p.embedding = None;
        assert!(index.upsert(&p).is_err());
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 0.001);
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0])).abs() < 0.001);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_embedding_round_trip() {
        let original = vec![0.25_f32, -1.5, 3.125];
        let bytes = embedding_to_bytes(&original);
        assert_eq!(bytes_to_embedding(&bytes), original);
    }
}
