//! Verdict assignment: maps a ranked, corroborated match onto one of the
//! four confidence-graded verdicts.

use crate::{Thresholds, Verdict};

/// How the lookup call concluded. The policy branches differently on
/// "zero results" versus "service failed after retries", and the audit
/// trail must keep the two distinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOutcome {
    /// The lookup returned at least one candidate.
    Candidates,
    /// The lookup succeeded but returned nothing.
    Empty,
    /// Transient failures exhausted every retry.
    Failed { attempts: u32 },
}

/// Everything the decision policy looks at. Classification is a pure
/// function of this input: re-running it on an unchanged input yields
/// the same verdict.
#[derive(Debug, Clone, Copy)]
pub struct ClassifierInput {
    /// Corroborated score (title score + delta, clamped to [0, 1]).
    pub score: f64,
    pub ambiguous: bool,
    pub outcome: LookupOutcome,
    /// Word count of the normalized query title.
    pub word_count: usize,
}

/// Apply the decision policy, in fixed order:
///
/// 1. No usable title → UNVERIFIED (no meaningful comparison possible).
/// 2. No candidates (empty result or retries exhausted) → UNVERIFIED for
///    titles of at least `short_title_words` words, else SUSPICIOUS
///    (short titles failing to match look like extraction artifacts,
///    not genuine absence).
/// 3. Ambiguous and above the similarity threshold → REVIEW.
/// 4. Above the similarity threshold → VERIFIED.
/// 5. Above the suspicion floor → SUSPICIOUS.
/// 6. Otherwise → UNVERIFIED.
pub fn classify(input: &ClassifierInput, thresholds: &Thresholds) -> (Verdict, String) {
    if input.word_count == 0 {
        return (
            Verdict::Unverified,
            "no usable title after normalization".to_string(),
        );
    }

    match input.outcome {
        LookupOutcome::Failed { attempts } => {
            let verdict = if input.word_count >= thresholds.short_title_words {
                Verdict::Unverified
            } else {
                Verdict::Suspicious
            };
            let noun = if attempts == 1 { "attempt" } else { "attempts" };
            (verdict, format!("lookup failed after {} {}", attempts, noun))
        }
        LookupOutcome::Empty => {
            if input.word_count >= thresholds.short_title_words {
                (
                    Verdict::Unverified,
                    "no candidates returned for query".to_string(),
                )
            } else {
                (
                    Verdict::Suspicious,
                    format!("short title ({} words) with no match", input.word_count),
                )
            }
        }
        LookupOutcome::Candidates => {
            if input.ambiguous && input.score >= thresholds.similarity {
                (
                    Verdict::Review,
                    format!(
                        "ambiguous match: best score {:.2} within {:.2} of runner-up",
                        input.score, thresholds.ambiguity_gap
                    ),
                )
            } else if input.score >= thresholds.similarity {
                (
                    Verdict::Verified,
                    format!("matched with score {:.2}", input.score),
                )
            } else if input.score >= thresholds.suspicion_floor {
                (
                    Verdict::Suspicious,
                    format!(
                        "weak match: score {:.2} below threshold {:.2}",
                        input.score, thresholds.similarity
                    ),
                )
            } else {
                (
                    Verdict::Unverified,
                    format!("no plausible match: best score {:.2}", input.score),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t() -> Thresholds {
        Thresholds::default()
    }

    fn input(score: f64, ambiguous: bool, outcome: LookupOutcome, words: usize) -> ClassifierInput {
        ClassifierInput {
            score,
            ambiguous,
            outcome,
            word_count: words,
        }
    }

    #[test]
    fn empty_title_is_unverified() {
        let (v, reason) = classify(&input(0.0, false, LookupOutcome::Empty, 0), &t());
        assert_eq!(v, Verdict::Unverified);
        assert!(reason.contains("no usable title"));
    }

    #[test]
    fn no_candidates_long_title_unverified() {
        let (v, _) = classify(&input(0.0, false, LookupOutcome::Empty, 6), &t());
        assert_eq!(v, Verdict::Unverified);
    }

    #[test]
    fn no_candidates_short_title_suspicious() {
        // "A Study": 2 words, no match
        let (v, reason) = classify(&input(0.0, false, LookupOutcome::Empty, 2), &t());
        assert_eq!(v, Verdict::Suspicious);
        assert!(reason.contains("short title"));
    }

    #[test]
    fn lookup_failure_has_distinct_reason() {
        let (v, reason) = classify(
            &input(0.0, false, LookupOutcome::Failed { attempts: 2 }, 6),
            &t(),
        );
        assert_eq!(v, Verdict::Unverified);
        assert_eq!(reason, "lookup failed after 2 attempts");
    }

    #[test]
    fn single_attempt_failure_reads_singular() {
        // A non-transient error aborts the retry loop on the first call.
        let (_, reason) = classify(
            &input(0.0, false, LookupOutcome::Failed { attempts: 1 }, 6),
            &t(),
        );
        assert_eq!(reason, "lookup failed after 1 attempt");
    }

    #[test]
    fn strong_unambiguous_match_verified() {
        let (v, _) = classify(&input(1.0, false, LookupOutcome::Candidates, 5), &t());
        assert_eq!(v, Verdict::Verified);
    }

    #[test]
    fn ambiguous_strong_match_review() {
        // Two candidates at 0.82 / 0.80
        let (v, _) = classify(&input(0.82, true, LookupOutcome::Candidates, 6), &t());
        assert_eq!(v, Verdict::Review);
    }

    #[test]
    fn ambiguous_but_weak_not_review() {
        // Ambiguity only matters above the similarity threshold.
        let (v, _) = classify(&input(0.5, true, LookupOutcome::Candidates, 6), &t());
        assert_eq!(v, Verdict::Suspicious);
    }

    #[test]
    fn mid_score_suspicious() {
        let (v, _) = classify(&input(0.5, false, LookupOutcome::Candidates, 6), &t());
        assert_eq!(v, Verdict::Suspicious);
    }

    #[test]
    fn low_score_unverified() {
        let (v, _) = classify(&input(0.2, false, LookupOutcome::Candidates, 6), &t());
        assert_eq!(v, Verdict::Unverified);
    }

    #[test]
    fn corroborated_score_crosses_threshold() {
        // Title 0.65 + corroboration 0.10 = 0.75
        let (v, _) = classify(&input(0.65 + 0.10, false, LookupOutcome::Candidates, 6), &t());
        assert_eq!(v, Verdict::Verified);
    }

    #[test]
    fn idempotent() {
        let i = input(0.82, true, LookupOutcome::Candidates, 6);
        let first = classify(&i, &t());
        for _ in 0..3 {
            assert_eq!(classify(&i, &t()), first);
        }
    }
}
