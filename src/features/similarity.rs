//! Vector similarity used for nearest-cluster retrieval.

use super::FeatureVector;

/// Cosine similarity between two feature vectors.
///
/// Returns 0.0 when either vector has zero norm, so a degenerate centroid
/// never wins an arg-max over real candidates.
pub fn cosine_similarity(a: &FeatureVector, b: &FeatureVector) -> f64 {
    let a = a.as_array();
    let b = b.as_array();
    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for k in 0..FeatureVector::DIMS {
        dot += a[k] * b[k];
        norm_a += a[k] * a[k];
        norm_b += b[k] * b[k];
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
