//! Adjudicator trait and implementations: external judgment on
//! references the automated rules could not settle.

pub mod gemini;
pub mod mock;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use crate::{CandidateRecord, Verdict};

pub use gemini::GeminiAdjudicator;

/// One reference submitted for adjudication, with whatever the earlier
/// stages learned about it.
#[derive(Debug, Clone)]
pub struct AdjudicationItem {
    /// Position of the reference in the input order.
    pub index: usize,
    pub title: String,
    pub authors: Vec<String>,
    pub year: Option<u16>,
    /// Best lookup candidate from the earlier stages, if any.
    pub candidate: Option<CandidateRecord>,
    pub current_verdict: Verdict,
    pub current_score: f64,
}

/// The adjudicator's judgment on one item.
#[derive(Debug, Clone)]
pub struct AdjudicationOutcome {
    pub verdict: Verdict,
    pub confidence: f64,
    pub reasoning: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AdjudicationError {
    #[error("adjudication request failed: {0}")]
    Request(String),
    #[error("adjudication response unparseable: {0}")]
    Malformed(String),
    #[error("all adjudication models exhausted")]
    Exhausted,
}

/// A service that can pass judgment on a batch of references. Items
/// missing from the returned map keep their prior verdict.
pub trait Adjudicator: Send + Sync {
    fn name(&self) -> &str;

    fn adjudicate<'a>(
        &'a self,
        items: &'a [AdjudicationItem],
    ) -> Pin<
        Box<
            dyn Future<Output = Result<HashMap<usize, AdjudicationOutcome>, AdjudicationError>>
                + Send
                + 'a,
        >,
    >;
}
