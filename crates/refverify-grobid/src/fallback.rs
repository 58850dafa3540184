//! Regex-based title re-extraction from raw citation strings.
//!
//! GROBID sometimes mis-segments an entry, putting part of the venue or
//! author list into the title. When the raw bibliography string is
//! available, these patterns often recover the real title.

use once_cell::sync::Lazy;
use regex::Regex;

use refverify_core::normalize::normalize_title;
use refverify_core::{FallbackExtractor, Reference};

/// Quoted titles: `Author, "Title", Venue, Year.`
static QUOTED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#""([^"]+)""#).unwrap());

/// Title following a year: `Authors. 2020. Title Here. Venue.`
static YEAR_TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:19|20)\d{2}\b[.\s]+([A-Z][^.]+\.)").unwrap());

/// Sentence-like segments, for the longest-segment fallback.
static SENTENCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Z][^.]+\.").unwrap());

/// Author-list markers that disqualify a segment as a title.
static AUTHOR_MARKER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?i:and|et al)\b").unwrap());

pub struct RegexFallback;

impl RegexFallback {
    /// Pull a plausible title out of a raw citation string.
    fn title_from_citation(raw: &str) -> Option<String> {
        if let Some(caps) = QUOTED_RE.captures(raw) {
            return Some(caps[1].trim().to_string());
        }

        if let Some(caps) = YEAR_TITLE_RE.captures(raw) {
            return Some(caps[1].trim().trim_end_matches('.').trim().to_string());
        }

        // Longest sentence-like segment that doesn't look like an author list.
        SENTENCE_RE
            .find_iter(raw)
            .map(|m| m.as_str())
            .filter(|s| !AUTHOR_MARKER_RE.is_match(s) && s.matches(',').count() < 3)
            .max_by_key(|s| s.len())
            .map(|s| s.trim().trim_end_matches('.').trim().to_string())
    }
}

impl FallbackExtractor for RegexFallback {
    fn reextract_title(&self, reference: &Reference) -> Option<String> {
        let raw = reference.raw_citation.as_deref()?;
        let title = Self::title_from_citation(raw)?;
        // Only a title that differs from what already failed is useful.
        if normalize_title(&title) == normalize_title(&reference.raw_title) {
            return None;
        }
        Some(title)
    }
}
