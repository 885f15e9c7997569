use crate::normalize_word;

/// Result of one Similarity Gateway call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Similarity {
    pub score: f64,
    pub rank: Option<i32>,
}

/// A guess is correct on an exact (normalized) match, or when the
/// similarity reaches the threshold.
pub fn is_correct_guess(guess: &str, target: &str, similarity: f64, threshold: f64) -> bool {
    normalize_word(guess) == normalize_word(target) || similarity >= threshold
}
