//! Weighted fusion of the independent scoring signals.
//!
//! final = w_sem × sem_sim + w_key × key_score + w_ngram × ngram_score
//!
//! The n-gram channel is reserved: it always contributes 0.0 but keeps its
//! weight slot and its field in the breakdown. Weights are not validated;
//! a final score outside [0, 1] means the caller supplied weights that do not
//! sum to 1.

use serde::{Deserialize, Serialize};

use crate::embeddings::{EmbeddingBackend, EmbeddingError};
use crate::keywords::keyword_score;
use crate::normalize::normalize;
use crate::similarity::semantic_similarity;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub sem: f64,
    pub key: f64,
    pub ngram: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            sem: 0.6,
            key: 0.3,
            ngram: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub final_score: f64,
    pub sem_sim: f64,
    pub key_score: f64,
    pub ngram_score: f64,
}

impl ScoreWeights {
    pub fn combine(&self, sem_sim: f64, key_score: f64, ngram_score: f64) -> ScoreBreakdown {
        ScoreBreakdown {
            final_score: self.sem * sem_sim + self.key * key_score + self.ngram * ngram_score,
            sem_sim,
            key_score,
            ngram_score,
        }
    }
}

/// Reserved n-gram overlap channel.
pub fn ngram_score(_student_norm: &str, _ideal_norm: &str) -> f64 {
    0.0
}

/// Score a student answer against the ideal answer and keyword checklist.
/// Both texts are normalized first. An embedding failure propagates.
pub async fn fuse(
    backend: &dyn EmbeddingBackend,
    student_text: &str,
    ideal_text: &str,
    keywords: &[String],
    weights: &ScoreWeights,
) -> Result<ScoreBreakdown, EmbeddingError> {
    let student_norm = normalize(student_text);
    let ideal_norm = normalize(ideal_text);

    let sem_sim = semantic_similarity(backend, &student_norm, &ideal_norm).await?;
    let key_score = keyword_score(&student_norm, keywords);
    let ngram = ngram_score(&student_norm, &ideal_norm);

    let breakdown = weights.combine(sem_sim, key_score, ngram);
    tracing::debug!(
        final_score = breakdown.final_score,
        sem_sim,
        key_score,
        backend = backend.name(),
        "Fused score"
    );
    Ok(breakdown)
}
