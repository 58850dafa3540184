use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod adjudicate;
pub mod classifier;
pub mod config_file;
pub mod corroborate;
pub mod escalation;
pub mod lookup;
pub mod normalize;
pub mod pipeline;
pub mod ranker;
pub mod similarity;

// Re-export for convenience
pub use classifier::{ClassifierInput, LookupOutcome, classify};
pub use lookup::{LookupError, LookupService};
pub use pipeline::{Collaborators, verify_document, verify_references};

/// One citation extracted from a paper's bibliography.
///
/// Immutable after extraction: a corrected title produced by the
/// escalation controller lives on the superseding [`MatchResult`]
/// (`query_title`), never on the Reference itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reference {
    pub raw_title: String,
    pub authors: Vec<String>,
    pub year: Option<u16>,
    /// 1-based position in the paper's bibliography.
    pub number: usize,
    /// The raw bibliography string this reference was parsed from, when
    /// the extractor provides it. Used by fallback title re-extraction.
    pub raw_citation: Option<String>,
}

/// One result returned by the lookup service for a query title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub title: String,
    pub authors: Vec<String>,
    pub year: Option<u16>,
    pub venue: Option<String>,
    /// Lookup-service-assigned identifier (e.g. a DBLP record URL).
    pub key: Option<String>,
}

/// Confidence-graded verdict for a single reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Verified,
    Review,
    Unverified,
    Suspicious,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Verified => "VERIFIED",
            Verdict::Review => "REVIEW",
            Verdict::Unverified => "UNVERIFIED",
            Verdict::Suspicious => "SUSPICIOUS",
        }
    }

    /// Sort key for report output: most trustworthy first.
    pub fn severity(&self) -> u8 {
        match self {
            Verdict::Verified => 0,
            Verdict::Review => 1,
            Verdict::Unverified => 2,
            Verdict::Suspicious => 3,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which pass of the pipeline produced a [`MatchResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Initial,
    Reextraction,
    Adjudication,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Initial => "initial",
            Stage::Reextraction => "reextraction",
            Stage::Adjudication => "adjudication",
        }
    }
}

/// The ranked outcome of one classification attempt for one reference.
///
/// Invariant: `title_score >= second_score` whenever both exist, and
/// `ambiguous` is set iff a candidate exists and the gap between the two
/// is within the configured ambiguity gap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub stage: Stage,
    /// The title this attempt queried with (the re-extraction stage may
    /// use a corrected title that differs from `Reference::raw_title`).
    pub query_title: String,
    pub best: Option<CandidateRecord>,
    /// Length-penalized title similarity of the best candidate.
    pub title_score: f64,
    pub second_score: Option<f64>,
    pub ambiguous: bool,
    /// Signed author/year corroboration adjustment.
    pub corroboration: f64,
    /// Final confidence: `title_score + corroboration`, clamped to [0, 1].
    pub score: f64,
    pub verdict: Verdict,
    /// Human-readable audit trail entry explaining the verdict.
    pub reason: String,
}

/// Append-only audit trail for one reference: every classification
/// attempt in order. The last attempt carries the final verdict; earlier
/// attempts explain why the verdict changed across stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefReport {
    pub reference: Reference,
    pub attempts: Vec<MatchResult>,
}

impl RefReport {
    pub fn new(reference: Reference, first: MatchResult) -> Self {
        Self {
            reference,
            attempts: vec![first],
        }
    }

    /// The attempt carrying the current (final) verdict.
    pub fn latest(&self) -> &MatchResult {
        self.attempts.last().expect("a report has >= 1 attempt")
    }

    pub fn verdict(&self) -> Verdict {
        self.latest().verdict
    }

    /// Record a superseding attempt. Prior attempts are retained.
    pub fn supersede(&mut self, attempt: MatchResult) {
        self.attempts.push(attempt);
    }

    /// (from, to) verdict transitions across stages, for change tracking.
    pub fn verdict_changes(&self) -> impl Iterator<Item = (&MatchResult, &MatchResult)> {
        self.attempts
            .windows(2)
            .filter(|w| w[0].verdict != w[1].verdict)
            .map(|w| (&w[0], &w[1]))
    }
}

/// Errors from the extraction collaborator. `Document` and
/// `NoReferences` are the only fatal error class in the pipeline: with
/// nothing to classify, the whole run for the paper fails.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("document processing failed: {0}")]
    Document(String),
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("no references found in document")]
    NoReferences,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Extraction collaborator: turns a document into structured references.
pub trait ReferenceExtractor: Send + Sync {
    fn extract<'a>(
        &'a self,
        path: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Reference>, ExtractError>> + Send + 'a>>;
}

/// Fallback extraction collaborator: attempts to re-derive a cleaner
/// title for one reference (escalation Stage A). `None` means no better
/// candidate was found.
pub trait FallbackExtractor: Send + Sync {
    fn reextract_title(&self, reference: &Reference) -> Option<String>;
}

/// All pipeline tunables, threaded in at construction time. There is no
/// process-wide mutable configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub thresholds: Thresholds,
    /// Total lookup attempts per reference (initial + retries).
    pub lookup_attempts: u32,
    /// Backoff between lookup attempts (scaled by attempt number).
    pub retry_backoff: Duration,
    /// Per-call timeout for outbound lookup requests.
    pub lookup_timeout: Duration,
    /// Concurrent reference workers.
    pub num_workers: usize,
    /// References per adjudication request (rate-limit batching).
    pub adjudication_batch_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            lookup_attempts: 2,
            retry_backoff: Duration::from_millis(500),
            lookup_timeout: Duration::from_secs(10),
            num_workers: 4,
            adjudication_batch_size: 8,
        }
    }
}

/// Scoring and classification thresholds.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    /// Minimum adjusted score for VERIFIED.
    pub similarity: f64,
    /// Scores in [suspicion_floor, similarity) classify as SUSPICIOUS.
    pub suspicion_floor: f64,
    /// Best-vs-runner-up margin below which a match is ambiguous.
    pub ambiguity_gap: f64,
    /// Titles with fewer words than this are treated as short/generic
    /// when no candidates are found.
    pub short_title_words: usize,
    /// Length penalty: titles with <= this many words are scaled by
    /// `penalty_short_factor`.
    pub penalty_short_words: usize,
    pub penalty_short_factor: f64,
    /// Titles with <= this many words (but more than the short cutoff)
    /// are scaled by `penalty_medium_factor`.
    pub penalty_medium_words: usize,
    pub penalty_medium_factor: f64,
    /// Per-name similarity for a surname to count as matched.
    pub author_name_similarity: f64,
    /// Score boost when all reference authors match.
    pub author_boost: f64,
    /// Score boost for year agreement within `year_tolerance`.
    pub year_boost: f64,
    /// Absorbs preprint-vs-published year discrepancies.
    pub year_tolerance: u16,
    /// Positive corroboration is suppressed below this title score, so
    /// metadata alone can never promote a weak title match.
    pub corroboration_floor: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            similarity: 0.7,
            suspicion_floor: 0.4,
            ambiguity_gap: 0.05,
            short_title_words: 5,
            penalty_short_words: 3,
            penalty_short_factor: 0.5,
            penalty_medium_words: 4,
            penalty_medium_factor: 0.75,
            author_name_similarity: 0.8,
            author_boost: 0.10,
            year_boost: 0.05,
            year_tolerance: 1,
            corroboration_floor: 0.5,
        }
    }
}

/// Progress events emitted during a verification run.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Checking {
        index: usize,
        total: usize,
        title: String,
    },
    Classified {
        index: usize,
        total: usize,
        verdict: Verdict,
        score: f64,
    },
    LookupRetry {
        index: usize,
        attempt: u32,
        error: String,
    },
    Reextracting {
        index: usize,
        corrected_title: String,
    },
    AdjudicationBatch {
        batch: usize,
        total_batches: usize,
        size: usize,
    },
    VerdictChanged {
        index: usize,
        from: Verdict,
        to: Verdict,
        stage: Stage,
    },
}

/// Summary counts over the final verdicts of a run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct VerdictStats {
    pub total: usize,
    pub verified: usize,
    pub review: usize,
    pub unverified: usize,
    pub suspicious: usize,
}

impl VerdictStats {
    pub fn from_reports(reports: &[RefReport]) -> Self {
        let mut stats = Self {
            total: reports.len(),
            ..Self::default()
        };
        for report in reports {
            match report.verdict() {
                Verdict::Verified => stats.verified += 1,
                Verdict::Review => stats.review += 1,
                Verdict::Unverified => stats.unverified += 1,
                Verdict::Suspicious => stats.suspicious += 1,
            }
        }
        stats
    }
}
