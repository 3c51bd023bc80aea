//! Vector math for embedding-based matching. Pure functions, no I/O.

/// Section weights for the overall match score. Sum to 1.0.
pub const SKILLS_WEIGHT: f64 = 0.50;
pub const EXPERIENCE_WEIGHT: f64 = 0.30;
pub const EDUCATION_WEIGHT: f64 = 0.20;

/// Cosine similarity of two vectors.
///
/// Returns 0.0 when either vector is empty, has zero norm, or the dimensions differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0_f64, 0.0_f64, 0.0_f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Weighted overall score on the 0–100 scale, rounded to one decimal.
pub fn weighted_overall(skills: f64, experience: f64, education: f64) -> f64 {
    round1(
        100.0
            * (SKILLS_WEIGHT * skills + EXPERIENCE_WEIGHT * experience + EDUCATION_WEIGHT * education),
    )
}

/// A single similarity on the 0–100 scale, rounded to one decimal.
pub fn section_score(similarity: f64) -> f64 {
    round1(similarity * 100.0)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
