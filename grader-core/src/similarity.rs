use crate::embeddings::{EmbeddingBackend, EmbeddingError};

/// Cosine similarity in [-1, 1]; 0.0 when either vector has zero norm.
pub fn cosine(u: &[f32], v: &[f32]) -> f64 {
    let (mut dot, mut nu, mut nv) = (0.0f64, 0.0f64, 0.0f64);
    for (a, b) in u.iter().zip(v.iter()) {
        let (a, b) = (*a as f64, *b as f64);
        dot += a * b;
        nu += a * a;
        nv += b * b;
    }
    let denom = nu.sqrt() * nv.sqrt();
    if denom == 0.0 {
        return 0.0;
    }
    (dot / denom).clamp(-1.0, 1.0)
}

/// Cosine rescaled from [-1, 1] to [0, 1] so it can be combined linearly with
/// the other signals.
pub fn rescale(cos: f64) -> f64 {
    (cos + 1.0) / 2.0
}

/// Semantic similarity of two texts in [0, 1]. Both texts are embedded
/// concurrently; either failure propagates.
pub async fn semantic_similarity(
    backend: &dyn EmbeddingBackend,
    a: &str,
    b: &str,
) -> Result<f64, EmbeddingError> {
    let (ea, eb) = tokio::try_join!(backend.embed(a), backend.embed(b))?;
    if ea.len() != eb.len() {
        return Err(EmbeddingError::InvalidDimensions {
            expected: ea.len(),
            actual: eb.len(),
        });
    }
    Ok(rescale(cosine(&ea, &eb)))
}
