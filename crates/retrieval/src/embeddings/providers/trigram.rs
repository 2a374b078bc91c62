//! Offline trigram embedding provider.

use crate::embeddings::provider::EmbeddingProvider;
use benebot_core::AppResult;
use std::collections::HashMap;

/// Common short words carrying no retrieval signal.
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "was", "were", "with", "that", "this", "from", "have", "has",
    "had", "its", "but", "not", "can", "you", "your", "they", "them", "their", "what", "which",
];

/// Deterministic embedding provider for local, offline operation.
///
/// Hashes each word and its character trigrams into a fixed set of
/// bins, weighted by term frequency, then normalizes to a unit vector.
/// Nowhere near a neural model semantically, but consistent and
/// content-dependent, which is what development and tests need.
#[derive(Debug)]
pub struct TrigramProvider {
    dimensions: usize,
}

impl TrigramProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut bins = vec![0.0f32; self.dimensions];
        if self.dimensions == 0 {
            return bins;
        }

        let lower = text.to_lowercase();
        let mut frequencies: HashMap<&str, u32> = HashMap::new();
        for word in lower.split_whitespace() {
            if word.len() > 2 && !STOP_WORDS.contains(&word) {
                *frequencies.entry(word).or_insert(0) += 1;
            }
        }

        for (word, freq) in frequencies {
            let weight = freq as f32;
            bins[self.bin_for(word.bytes().map(u64::from), 31)] += weight;

            // Trigrams give partial credit for overlapping word forms.
            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let bin = self.bin_for(window.iter().map(|c| *c as u64), 37);
                bins[bin] += weight.sqrt();
            }
        }

        let norm = bins.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut bins {
                *v /= norm;
            }
        }
        bins
    }

    fn bin_for(&self, values: impl Iterator<Item = u64>, seed: u64) -> usize {
        let hash = values.fold(0u64, |acc, v| acc.wrapping_mul(seed).wrapping_add(v));
        (hash % self.dimensions as u64) as usize
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for TrigramProvider {
    fn provider_name(&self) -> &str {
        "trigram"
    }

    fn model_name(&self) -> &str {
        "trigram-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}
