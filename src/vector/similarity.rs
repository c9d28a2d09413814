//! Similarity functions used to rank documents against a query.

/// Cosine similarity: dot(a, b) / (||a|| * ||b||)
/// Range: [-1, 1], where 1 = same direction, -1 = opposite.
///
/// A zero vector has no direction; any comparison involving one scores 0.
/// Vectors of different lengths are not rejected: the dot product covers the
/// shorter length while each norm covers its whole vector.
#[inline]
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let norm_a = norm(a);
    let norm_b = norm(b);

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let similarity = dot_product(a, b) / (norm_a * norm_b);
    // Clamp to handle floating point errors
    similarity.clamp(-1.0, 1.0)
}

/// Dot product of two vectors
#[inline]
pub fn dot_product(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// L2 norm (magnitude) of a vector
#[inline]
pub fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Normalize a vector to unit length in place
pub fn normalize(v: &mut [f64]) {
    let n = norm(v);
    if n > 0.0 {
        for x in v.iter_mut() {
            *x /= n;
        }
    }
}

/// Check if a vector has unit length
pub fn is_normalized(v: &[f64]) -> bool {
    (norm(v) - 1.0).abs() < 1e-9
}
