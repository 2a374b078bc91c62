//! Semantic intent gate.
//!
//! Classifies a query as in-scope, medical, or off-topic by comparing its
//! embedding against three labeled prototype sets. Prototype embeddings
//! are computed once at construction.

use crate::types::{IntentLabel, IntentScores};
use benebot_core::{AppResult, Tuning};
use benebot_retrieval::{cosine_similarity, EmbeddingProvider};
use std::sync::Arc;

/// Prototype example sets, one per intent class.
///
/// These are tuning data. The defaults work for the insurance domain;
/// deployments can override them through configuration.
#[derive(Debug, Clone)]
pub struct IntentSeeds {
    pub in_scope: Vec<String>,
    pub medical: Vec<String>,
    pub off_topic: Vec<String>,
}

impl Default for IntentSeeds {
    fn default() -> Self {
        let to_owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            in_scope: to_owned(&[
                "what is my specialist copay",
                "how much of my deductible have I met",
                "is vision care covered under my plan",
                "show my latest claim and how much I owe",
                "why was my claim denied",
                "what is my out-of-pocket maximum",
                "does my plan cover dental cleanings",
                "what is the coinsurance for an MRI",
                "when was my last claim processed",
                "what does my evidence of coverage say about urgent care",
            ]),
            medical: to_owned(&[
                "what medicine should I take for a headache",
                "is this rash something to worry about",
                "how do I treat a fever at home",
                "should I see a doctor for chest pain",
                "what is the right dosage of ibuprofen",
                "can you diagnose my symptoms",
                "what are the side effects of this medication",
                "I have been feeling dizzy, what should I do",
            ]),
            off_topic: to_owned(&[
                "what is the weather today",
                "tell me a joke",
                "who won the game last night",
                "write me a poem about the ocean",
                "what is the capital of France",
                "recommend a good restaurant nearby",
                "help me plan a vacation",
                "what stocks should I buy",
            ]),
        }
    }
}

/// Per-class acceptance thresholds.
#[derive(Debug, Clone, Copy)]
pub struct IntentThresholds {
    pub in_scope: f32,
    pub medical: f32,
    pub off_topic: f32,
}

impl IntentThresholds {
    pub fn from_tuning(tuning: &Tuning) -> Self {
        Self {
            in_scope: tuning.th_in_scope,
            medical: tuning.th_medical,
            off_topic: tuning.th_off_topic,
        }
    }
}

impl Default for IntentThresholds {
    fn default() -> Self {
        Self {
            in_scope: 0.30,
            medical: 0.30,
            off_topic: 0.30,
        }
    }
}

/// Intent classifier with cached prototype embeddings.
pub struct IntentGate {
    embeddings: Arc<dyn EmbeddingProvider>,
    in_scope_vecs: Vec<Vec<f32>>,
    medical_vecs: Vec<Vec<f32>>,
    off_topic_vecs: Vec<Vec<f32>>,
    thresholds: IntentThresholds,
}

impl IntentGate {
    /// Build the gate, embedding every prototype up front.
    pub async fn new(
        embeddings: Arc<dyn EmbeddingProvider>,
        seeds: &IntentSeeds,
        thresholds: IntentThresholds,
    ) -> AppResult<Self> {
        let in_scope_vecs = embeddings.embed_batch(&seeds.in_scope).await?;
        let medical_vecs = embeddings.embed_batch(&seeds.medical).await?;
        let off_topic_vecs = embeddings.embed_batch(&seeds.off_topic).await?;

        tracing::debug!(
            "Intent gate ready ({} in-scope, {} medical, {} off-topic prototypes)",
            in_scope_vecs.len(),
            medical_vecs.len(),
            off_topic_vecs.len()
        );

        Ok(Self {
            embeddings,
            in_scope_vecs,
            medical_vecs,
            off_topic_vecs,
            thresholds,
        })
    }

    /// Classify a query.
    ///
    /// Pure apart from the query embedding call; prototype vectors are
    /// cached. Embedding failures propagate to the caller.
    pub async fn classify(&self, query: &str) -> AppResult<(IntentLabel, IntentScores)> {
        let query_vec = self.embeddings.embed(query).await?;

        let scores = IntentScores {
            in_scope: max_similarity(&query_vec, &self.in_scope_vecs),
            medical: max_similarity(&query_vec, &self.medical_vecs),
            off_topic: max_similarity(&query_vec, &self.off_topic_vecs),
        };

        let label = decide(scores, self.thresholds);
        tracing::debug!(
            "Intent: {} (in_scope={:.3} medical={:.3} off_topic={:.3})",
            label.as_str(),
            scores.in_scope,
            scores.medical,
            scores.off_topic
        );

        Ok((label, scores))
    }
}

fn max_similarity(query: &[f32], prototypes: &[Vec<f32>]) -> f32 {
    prototypes
        .iter()
        .map(|p| cosine_similarity(query, p))
        .fold(0.0_f32, f32::max)
}

/// Threshold policy. Priority: medical, then in-scope, then off-topic;
/// when nothing clears its threshold, the highest score wins with ties
/// resolving to off-topic first, then medical, then in-scope.
fn decide(scores: IntentScores, th: IntentThresholds) -> IntentLabel {
    if scores.medical >= th.medical
        && scores.medical >= scores.in_scope
        && scores.medical >= scores.off_topic
    {
        return IntentLabel::Medical;
    }
    if scores.in_scope >= th.in_scope
        && scores.in_scope >= scores.medical
        && scores.in_scope >= scores.off_topic
    {
        return IntentLabel::InScope;
    }
    if scores.off_topic >= th.off_topic {
        return IntentLabel::OffTopic;
    }

    // Nothing cleared its threshold.
    if scores.off_topic >= scores.medical && scores.off_topic >= scores.in_scope {
        IntentLabel::OffTopic
    } else if scores.medical >= scores.in_scope {
        IntentLabel::Medical
    } else {
        IntentLabel::InScope
    }
}
