//! Retrieval data types.

use serde::{Deserialize, Serialize};

/// A retrievable passage stored in a source's vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    /// Stable identifier within the index
    pub id: String,

    /// Originating document name (e.g., "evidence-of-coverage.pdf")
    pub source: String,

    /// Page number within the document, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,

    /// Passage text
    pub text: String,

    /// Embedding vector; present once indexed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// One record of a JSONL ingestion file.
///
/// `id` defaults to a fresh UUID, `source` to the file name.
#[derive(Debug, Clone, Deserialize)]
pub struct PassageRecord {
    pub text: String,

    #[serde(default)]
    pub source: Option<String>,

    #[serde(default)]
    pub page: Option<u32>,

    #[serde(default)]
    pub id: Option<String>,
}
