//! Bounded string similarity with a length-aware penalty for short titles.

use crate::Thresholds;
use crate::normalize::word_count;

/// Symmetric similarity between two normalized strings in [0, 1].
/// 1.0 for identical strings, 0.0 when either side is empty.
pub fn score(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    rapidfuzz::fuzz::ratio(a.chars(), b.chars())
}

/// Multiplicative penalty for short/generic query titles.
///
/// Short titles are structurally more likely to produce spurious
/// high-similarity matches, so their effective score is scaled down
/// before threshold comparison.
pub fn length_penalty(query_title: &str, thresholds: &Thresholds) -> f64 {
    let words = word_count(query_title);
    if words <= thresholds.penalty_short_words {
        thresholds.penalty_short_factor
    } else if words <= thresholds.penalty_medium_words {
        thresholds.penalty_medium_factor
    } else {
        1.0
    }
}

/// Similarity of `candidate` against `query`, scaled by the query's
/// length penalty. This is the score the ranker and classifier see.
pub fn penalized_score(query: &str, candidate: &str, thresholds: &Thresholds) -> f64 {
    score(query, candidate) * length_penalty(query, thresholds)
}
