//! Candidate ranking and near-tie (ambiguity) detection.

use crate::normalize::normalize_title;
use crate::similarity::penalized_score;
use crate::{CandidateRecord, Thresholds};

/// Partial match outcome: best/second-best/ambiguity, before metadata
/// corroboration and classification.
#[derive(Debug, Clone)]
pub struct Ranking {
    pub best_index: Option<usize>,
    pub best_score: f64,
    pub second_score: Option<f64>,
    pub ambiguous: bool,
}

impl Ranking {
    pub fn empty() -> Self {
        Self {
            best_index: None,
            best_score: 0.0,
            second_score: None,
            ambiguous: false,
        }
    }
}

/// Score every candidate against the normalized query title and select
/// best and runner-up. Ties break toward the earliest candidate: the
/// lookup service's result order is treated as a relevance prior.
///
/// `ambiguous` is set when two or more candidates exist and the gap
/// between best and second-best is within the ambiguity gap: a
/// plausible match exists but not uniquely, distinct from an empty
/// candidate list.
pub fn rank(query_title: &str, candidates: &[CandidateRecord], thresholds: &Thresholds) -> Ranking {
    if candidates.is_empty() {
        return Ranking::empty();
    }

    let scores: Vec<f64> = candidates
        .iter()
        .map(|c| penalized_score(query_title, &normalize_title(&c.title), thresholds))
        .collect();

    let mut best_index = 0;
    for (i, &s) in scores.iter().enumerate().skip(1) {
        if s > scores[best_index] {
            best_index = i;
        }
    }
    let best_score = scores[best_index];

    let second_score = scores
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != best_index)
        .map(|(_, &s)| s)
        .fold(None, |acc: Option<f64>, s| {
            Some(acc.map_or(s, |a| a.max(s)))
        });

    let ambiguous = match second_score {
        Some(second) => best_score - second <= thresholds.ambiguity_gap,
        None => false,
    };

    Ranking {
        best_index: Some(best_index),
        best_score,
        second_score,
        ambiguous,
    }
}
