//! Benebot Retrieval
//!
//! Embedding providers, the SQLite vector index, and JSONL document
//! ingestion. Each knowledge source (benefits documents, claims history)
//! owns one index database under the workspace `.benebot/` directory.

pub mod embeddings;
pub mod index;
pub mod ingest;
pub mod types;

pub use embeddings::{create_provider, EmbeddingProvider};
pub use index::{cosine_similarity, SqliteVectorIndex, VectorIndex};
pub use ingest::{chunk_text, ingest_jsonl, IngestReport};
pub use types::{Passage, PassageRecord};
