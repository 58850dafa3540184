//! Mock adjudicator for testing.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{AdjudicationError, AdjudicationItem, AdjudicationOutcome, Adjudicator};
use crate::Verdict;

/// A mock implementing [`Adjudicator`] for tests.
///
/// Returns a fixed verdict override for a configured set of indices;
/// everything else is omitted from the response (and so keeps its prior
/// verdict). Can also be configured to fail every call, or only the
/// first few.
pub struct MockAdjudicator {
    overrides: HashMap<usize, Verdict>,
    fail: bool,
    /// Number of initial calls that fail before the mock starts answering.
    fail_first: usize,
    call_count: AtomicUsize,
}

impl MockAdjudicator {
    /// Adjudicate the given indices to the given verdicts; omit the rest.
    pub fn with_overrides(overrides: HashMap<usize, Verdict>) -> Self {
        Self {
            overrides,
            fail: false,
            fail_first: 0,
            call_count: AtomicUsize::new(0),
        }
    }

    /// Fail every batch with a request error.
    pub fn failing() -> Self {
        Self {
            overrides: HashMap::new(),
            fail: true,
            fail_first: 0,
            call_count: AtomicUsize::new(0),
        }
    }

    /// Fail the first `n` batches, then answer with the overrides.
    pub fn failing_first(n: usize, overrides: HashMap<usize, Verdict>) -> Self {
        Self {
            overrides,
            fail: false,
            fail_first: n,
            call_count: AtomicUsize::new(0),
        }
    }

    /// How many batches have been submitted.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

impl Adjudicator for MockAdjudicator {
    fn name(&self) -> &str {
        "mock"
    }

    fn adjudicate<'a>(
        &'a self,
        items: &'a [AdjudicationItem],
    ) -> Pin<
        Box<
            dyn Future<Output = Result<HashMap<usize, AdjudicationOutcome>, AdjudicationError>>
                + Send
                + 'a,
        >,
    > {
        let call = self.call_count.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            if self.fail || call < self.fail_first {
                return Err(AdjudicationError::Request("mock failure".to_string()));
            }
            let outcomes = items
                .iter()
                .filter_map(|item| {
                    self.overrides.get(&item.index).map(|&verdict| {
                        (
                            item.index,
                            AdjudicationOutcome {
                                verdict,
                                confidence: 0.9,
                                reasoning: "mock judgment".to_string(),
                            },
                        )
                    })
                })
                .collect();
            Ok(outcomes)
        })
    }
}
