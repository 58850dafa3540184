//! Author/year corroboration: secondary evidence adjusting the
//! title-based confidence score.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::similarity::score;
use crate::{CandidateRecord, Reference, Thresholds};

/// Trailing DBLP-style disambiguation numbers, e.g. "Nan Tang 0001".
static DISAMBIGUATION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\d{4}\s*$").unwrap());

/// Extract a lowercase surname from an author name string.
///
/// Handles "Surname, Initials" order, initials with periods, and
/// trailing disambiguation numbers. Particles ("van", "de") are treated
/// as middle tokens and dropped.
pub fn last_name(name: &str) -> String {
    let name = DISAMBIGUATION_RE.replace(name, "");
    if let Some((surname, _)) = name.split_once(',') {
        return surname.trim().to_lowercase();
    }
    let name = name.replace('.', " ");
    name.split_whitespace()
        .next_back()
        .unwrap_or("")
        .to_lowercase()
}

/// Compute the signed corroboration delta for a chosen candidate.
///
/// Author surnames are matched order-independently: a reference author
/// counts as matched when its surname similarity to some candidate
/// surname reaches the per-name threshold. The matched fraction scales
/// the author boost; zero matches (with authors on both sides) is
/// evidence against. Year agreement within the tolerance contributes an
/// independent boost; disagreement beyond it a penalty. Missing
/// metadata on either side contributes nothing.
///
/// A positive delta is suppressed when the title score is below the
/// corroboration floor, so metadata agreement can never promote a weak
/// title match on its own.
pub fn corroborate(
    reference: &Reference,
    candidate: &CandidateRecord,
    title_score: f64,
    thresholds: &Thresholds,
) -> f64 {
    let mut delta = 0.0;

    if !reference.authors.is_empty() && !candidate.authors.is_empty() {
        let candidate_surnames: Vec<String> =
            candidate.authors.iter().map(|a| last_name(a)).collect();

        let matched = reference
            .authors
            .iter()
            .map(|a| last_name(a))
            .filter(|surname| {
                !surname.is_empty()
                    && candidate_surnames
                        .iter()
                        .any(|c| score(surname, c) >= thresholds.author_name_similarity)
            })
            .count();

        let fraction = matched as f64 / reference.authors.len() as f64;
        if fraction > 0.0 {
            delta += fraction * thresholds.author_boost;
        } else {
            delta -= thresholds.author_boost;
        }
    }

    if let (Some(ref_year), Some(cand_year)) = (reference.year, candidate.year) {
        let diff = ref_year.abs_diff(cand_year);
        if diff <= thresholds.year_tolerance {
            delta += thresholds.year_boost;
        } else {
            delta -= thresholds.year_boost;
        }
    }

    if title_score < thresholds.corroboration_floor {
        delta = delta.min(0.0);
    }

    delta
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(authors: &[&str], year: Option<u16>) -> Reference {
        Reference {
            raw_title: "some title".into(),
            authors: authors.iter().map(|s| s.to_string()).collect(),
            year,
            number: 1,
            raw_citation: None,
        }
    }

    fn candidate(authors: &[&str], year: Option<u16>) -> CandidateRecord {
        CandidateRecord {
            title: "some title".into(),
            authors: authors.iter().map(|s| s.to_string()).collect(),
            year,
            venue: None,
            key: None,
        }
    }

    fn t() -> Thresholds {
        Thresholds::default()
    }

    #[test]
    fn last_name_variants() {
        assert_eq!(last_name("Jon Louis Bentley"), "bentley");
        assert_eq!(last_name("Bail, C. A."), "bail");
        assert_eq!(last_name("Nan Tang 0001"), "tang");
        assert_eq!(last_name("Raymond J. Mooney"), "mooney");
        assert_eq!(last_name("Smith"), "smith");
    }

    #[test]
    fn full_author_match_gives_full_boost() {
        let delta = corroborate(
            &reference(&["Smith", "Lee"], None),
            &candidate(&["John Smith", "Alice Lee"], None),
            0.65,
            &t(),
        );
        assert!((delta - 0.10).abs() < 1e-9);
    }

    #[test]
    fn partial_author_match_scales_boost() {
        let delta = corroborate(
            &reference(&["Smith", "Nobody"], None),
            &candidate(&["John Smith", "Alice Lee"], None),
            0.65,
            &t(),
        );
        assert!((delta - 0.05).abs() < 1e-9);
    }

    #[test]
    fn zero_author_overlap_penalizes() {
        let delta = corroborate(
            &reference(&["Garcia"], None),
            &candidate(&["Smith", "Lee"], None),
            0.8,
            &t(),
        );
        assert!((delta + 0.10).abs() < 1e-9);
    }

    #[test]
    fn year_within_tolerance_boosts() {
        let delta = corroborate(
            &reference(&[], Some(2020)),
            &candidate(&[], Some(2021)),
            0.8,
            &t(),
        );
        assert!((delta - 0.05).abs() < 1e-9);
    }

    #[test]
    fn year_disagreement_penalizes() {
        let delta = corroborate(
            &reference(&[], Some(2015)),
            &candidate(&[], Some(2021)),
            0.8,
            &t(),
        );
        assert!((delta + 0.05).abs() < 1e-9);
    }

    #[test]
    fn missing_metadata_is_neutral() {
        let delta = corroborate(&reference(&[], None), &candidate(&["Smith"], Some(2020)), 0.8, &t());
        assert_eq!(delta, 0.0);
    }

    #[test]
    fn positive_delta_suppressed_below_floor() {
        // Authors agree fully, but the title match is too weak to accept
        // metadata as promotion evidence.
        let delta = corroborate(
            &reference(&["Smith"], Some(2020)),
            &candidate(&["John Smith"], Some(2020)),
            0.3,
            &t(),
        );
        assert_eq!(delta, 0.0);
    }

    #[test]
    fn negative_delta_survives_below_floor() {
        let delta = corroborate(
            &reference(&["Garcia"], Some(2010)),
            &candidate(&["Smith"], Some(2020)),
            0.3,
            &t(),
        );
        assert!(delta < 0.0);
    }

    #[test]
    fn fuzzy_surname_transliteration() {
        // Minor spelling drift should still count under the 0.8 per-name
        // threshold.
        let delta = corroborate(
            &reference(&["Ordonez"], None),
            &candidate(&["Carlos Ordoñez"], None),
            0.8,
            &t(),
        );
        assert!(delta > 0.0);
    }
}
