//! Lookup service trait and implementations for querying bibliographic
//! search APIs.

pub mod dblp;
pub mod mock;

use std::future::Future;
use std::pin::Pin;

use crate::CandidateRecord;

pub use dblp::DblpLookup;

/// Errors a lookup call can produce. Transient variants are eligible
/// for retry; the rest fail the attempt immediately.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LookupError {
    #[error("request timed out")]
    Timeout,
    #[error("rate limited (429)")]
    RateLimited,
    #[error("http error: {0}")]
    Http(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl LookupError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LookupError::Timeout | LookupError::RateLimited | LookupError::Http(_)
        )
    }
}

/// A search service that can look up candidate records by title.
pub trait LookupService: Send + Sync {
    /// The canonical name of this service (e.g., "DBLP").
    fn name(&self) -> &str;

    /// Search for records matching the given normalized title. An empty
    /// vec means the service answered but had nothing plausible.
    fn search<'a>(
        &'a self,
        title: &'a str,
        client: &'a reqwest::Client,
        timeout: std::time::Duration,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<CandidateRecord>, LookupError>> + Send + 'a>>;
}
