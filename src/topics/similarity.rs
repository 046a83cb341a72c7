//! Vector similarity, the running-mean recurrence, and the lexical hint bonus.

/// Cosine similarity between two vectors, accumulated in `f64`.
///
/// Returns `0.0` when either vector has zero norm or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Fold one more vector into a mean of `count` vectors:
/// `(centroid * count + new) / (count + 1)`.
pub fn running_mean(centroid: &[f32], count: u64, new_vector: &[f32]) -> Vec<f32> {
    let n = count as f64;
    centroid
        .iter()
        .zip(new_vector)
        .map(|(&c, &v)| ((f64::from(c) * n + f64::from(v)) / (n + 1.0)) as f32)
        .collect()
}

/// Parameters of the lexical bonus added for topic hints that appear in a
/// topic's title or file stem.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HintBonus {
    pub per_match: f64,
    pub cap: f64,
}

impl Default for HintBonus {
    fn default() -> Self {
        Self {
            per_match: 0.04,
            cap: 0.12,
        }
    }
}

impl HintBonus {
    /// Bonus for `hints` (already normalized) against `title` and `stem`.
    ///
    /// Each distinct hint found as a case-insensitive substring counts once.
    /// The result is always in `[0, cap]`.
    pub fn score(&self, hints: &[String], title: &str, stem: &str) -> f64 {
        if hints.is_empty() {
            return 0.0;
        }
        let haystack = format!("{title} {stem}").to_lowercase();
        let matches = hints.iter().filter(|h| haystack.contains(h.as_str())).count();
        (matches as f64 * self.per_match).clamp(0.0, self.cap.max(0.0))
    }
}

/// Lower-case, trim, and deduplicate hints, dropping empty ones. Order of
/// first appearance is kept.
pub fn normalize_hints<S: AsRef<str>>(hints: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(hints.len());
    for hint in hints {
        let hint = hint.as_ref().trim().to_lowercase();
        if !hint.is_empty() && !out.contains(&hint) {
            out.push(hint);
        }
    }
    out
}
