// src/memory/clustering/distance.rs

//! Distance and similarity functions over embedding vectors.
//!
//! Missing embeddings are a data anomaly and get a sentinel distance rather
//! than an error. Mismatched dimensions are a deployment/model mismatch and
//! fail loudly.

/// Cosine distance (1 - cosine similarity) between two optional embeddings.
/// Returns 2.0 (the maximum) when either embedding is missing or has zero
/// magnitude.
pub fn cosine_distance(a: Option<&[f32]>, b: Option<&[f32]>) -> f64 {
    let (a, b) = match (a, b) {
        (Some(a), Some(b)) => (a, b),
        _ => return 2.0,
    };
    assert_eq!(
        a.len(),
        b.len(),
        "embedding dimensions must match ({} vs {})",
        a.len(),
        b.len()
    );

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += (*x as f64) * (*y as f64);
        norm_a += (*x as f64) * (*x as f64);
        norm_b += (*y as f64) * (*y as f64);
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 2.0;
    }

    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Euclidean distance between two optional embeddings. Missing embeddings
/// are treated as infinitely distant.
pub fn euclidean_distance(a: Option<&[f32]>, b: Option<&[f32]>) -> f64 {
    let (a, b) = match (a, b) {
        (Some(a), Some(b)) => (a, b),
        _ => return f64::MAX,
    };
    assert_eq!(
        a.len(),
        b.len(),
        "embedding dimensions must match ({} vs {})",
        a.len(),
        b.len()
    );

    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = (*x as f64) - (*y as f64);
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// Cosine similarity in [-1, 1]; 0.0 for zero-magnitude vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(
        a.len(),
        b.len(),
        "embedding dimensions must match ({} vs {})",
        a.len(),
        b.len()
    );

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
