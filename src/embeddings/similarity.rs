//! Similarity metrics for embeddings

/// Euclidean length of a vector
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Compute cosine similarity between two embedding vectors
///
/// Returns a value between -1.0 and 1.0, where:
/// - 1.0 = identical direction
/// - 0.0 = orthogonal vectors (also returned when either vector is all zeros)
/// - -1.0 = opposite vectors
///
/// # Panics
/// Panics if vectors have different dimensions
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(
        a.len(),
        b.len(),
        "Vectors must have same dimension: {} vs {}",
        a.len(),
        b.len()
    );

    let magnitude_a = l2_norm(a);
    let magnitude_b = l2_norm(b);
    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot(a, b) / (magnitude_a * magnitude_b)
}

/// Cosine similarity when the query norm is already known
///
/// The selector computes the query norm once per scan instead of once per card.
pub(crate) fn cosine_with_norm(query: &[f32], query_norm: f32, card: &[f32]) -> f32 {
    let card_norm = l2_norm(card);
    if query_norm == 0.0 || card_norm == 0.0 {
        return 0.0;
    }
    dot(query, card) / (query_norm * card_norm)
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
