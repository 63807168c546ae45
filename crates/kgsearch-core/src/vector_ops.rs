//! Small numeric helpers shared by Expand and both Rerank strategies.

/// Cosine similarity, clamped into `[0, 1]` the way §9 mandates: some
/// vector backends return negative cosine or mild over-range values under
/// quantization, and those get clipped rather than propagated.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        normalize_similarity(dot / (norm_a * norm_b))
    }
}

/// Clamps a raw similarity score into the `[0, 1]` confidence range used
/// everywhere a clue's `confidence` field is derived from a cosine score.
pub fn normalize_similarity(raw: f32) -> f32 {
    raw.clamp(0.0, 1.0)
}
