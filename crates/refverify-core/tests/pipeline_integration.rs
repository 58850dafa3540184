//! Integration tests for the full verification pipeline.
//!
//! These tests drive `verify_references`/`verify_document` end to end
//! over mock collaborators, so no HTTP requests are made.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use refverify_core::adjudicate::Adjudicator;
use refverify_core::adjudicate::mock::MockAdjudicator;
use refverify_core::lookup::mock::{MockLookup, MockResponse};
use refverify_core::{
    CandidateRecord, Collaborators, Config, ExtractError, FallbackExtractor, LookupError,
    ProgressEvent, Reference, ReferenceExtractor, Stage, Verdict, VerdictStats, verify_document,
    verify_references,
};
use tokio_util::sync::CancellationToken;

fn reference(number: usize, title: &str) -> Reference {
    Reference {
        raw_title: title.to_string(),
        authors: vec![],
        year: None,
        number,
        raw_citation: Some(format!("[{number}] {title}.")),
    }
}

fn candidate(title: &str) -> CandidateRecord {
    CandidateRecord {
        title: title.to_string(),
        authors: vec![],
        year: None,
        venue: None,
        key: Some(format!("rec/{}", title.len())),
    }
}

fn collaborators(lookup: Arc<MockLookup>) -> Collaborators {
    Collaborators {
        lookup,
        fallback: None,
        adjudicator: None,
    }
}

/// Single-worker config so sequenced mock responses line up with input order.
fn serial_config() -> Config {
    Config {
        num_workers: 1,
        ..Config::default()
    }
}

#[tokio::test]
async fn exact_match_is_verified_with_full_score() {
    let lookup = Arc::new(MockLookup::new(MockResponse::Candidates(vec![candidate(
        "Attention Is All You Need",
    )])));

    let reports = verify_references(
        vec![reference(1, "Attention Is All You Need")],
        collaborators(lookup),
        Config::default(),
        |_| {},
        CancellationToken::new(),
    )
    .await;

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].verdict(), Verdict::Verified);
    assert_eq!(reports[0].latest().score, 1.0);
    assert!(!reports[0].latest().ambiguous);
}

#[tokio::test]
async fn results_preserve_input_order() {
    let lookup = Arc::new(MockLookup::new(MockResponse::Empty));
    let refs: Vec<Reference> = (1..=6)
        .map(|i| reference(i, &format!("Completely Unfindable Paper Number {i}")))
        .collect();

    let reports = verify_references(
        refs,
        collaborators(lookup),
        Config::default(),
        |_| {},
        CancellationToken::new(),
    )
    .await;

    assert_eq!(reports.len(), 6);
    for (i, report) in reports.iter().enumerate() {
        assert_eq!(report.reference.number, i + 1);
    }
}

#[tokio::test(start_paused = true)]
async fn lookup_timeout_exhausts_retries() {
    let lookup = Arc::new(MockLookup::new(MockResponse::Transient(
        LookupError::Timeout,
    )));
    let retries = Arc::new(Mutex::new(Vec::new()));
    let retries_seen = Arc::clone(&retries);

    let reports = verify_references(
        vec![reference(1, "A Perfectly Plausible Paper Title")],
        collaborators(Arc::clone(&lookup)),
        Config::default(),
        move |event| {
            if let ProgressEvent::LookupRetry { attempt, .. } = event {
                retries_seen.lock().unwrap().push(attempt);
            }
        },
        CancellationToken::new(),
    )
    .await;

    assert_eq!(reports[0].verdict(), Verdict::Unverified);
    assert_eq!(reports[0].latest().reason, "lookup failed after 2 attempts");
    assert_eq!(lookup.call_count(), 2);
    assert_eq!(*retries.lock().unwrap(), vec![1]);
}

#[tokio::test]
async fn mixed_verdicts_across_references() {
    // One worker, so responses pair with references in order.
    let lookup = Arc::new(MockLookup::with_sequence(vec![
        // 1: exact match
        MockResponse::Candidates(vec![candidate("Attention Is All You Need")]),
        // 2: short title, nothing found
        MockResponse::Empty,
        // 3: two near-tied candidates
        MockResponse::Candidates(vec![
            candidate("Robust Estimation for Streaming Data Systems"),
            candidate("Robust Estimation for Streaming Data System"),
        ]),
        // 4: long title, nothing found
        MockResponse::Empty,
    ]));

    let refs = vec![
        reference(1, "Attention Is All You Need"),
        reference(2, "A Study"),
        reference(3, "Robust Estimation for Streaming Data Systems"),
        reference(4, "An Entirely Fabricated Paper About Nothing"),
    ];

    let reports = verify_references(
        refs,
        collaborators(lookup),
        serial_config(),
        |_| {},
        CancellationToken::new(),
    )
    .await;

    assert_eq!(reports[0].verdict(), Verdict::Verified);
    assert_eq!(reports[1].verdict(), Verdict::Suspicious);
    assert_eq!(reports[2].verdict(), Verdict::Review);
    assert_eq!(reports[3].verdict(), Verdict::Unverified);

    let stats = VerdictStats::from_reports(&reports);
    assert_eq!(stats.total, 4);
    assert_eq!(stats.verified, 1);
    assert_eq!(stats.review, 1);
    assert_eq!(stats.suspicious, 1);
    assert_eq!(stats.unverified, 1);
}

struct RawCitationFallback;

impl FallbackExtractor for RawCitationFallback {
    fn reextract_title(&self, reference: &Reference) -> Option<String> {
        reference
            .raw_citation
            .as_deref()
            .map(|_| "Graph Neural Networks for Molecular Property Prediction".to_string())
    }
}

#[tokio::test]
async fn audit_trail_spans_all_stages() {
    // Initial lookup finds nothing; the re-extracted title matches; the
    // adjudicator is never consulted because nothing stays unsettled.
    let lookup = Arc::new(MockLookup::with_sequence(vec![
        MockResponse::Empty,
        MockResponse::Candidates(vec![candidate(
            "Graph Neural Networks for Molecular Property Prediction",
        )]),
    ]));
    let adjudicator = Arc::new(MockAdjudicator::with_overrides(HashMap::new()));

    let changes = Arc::new(Mutex::new(Vec::new()));
    let changes_seen = Arc::clone(&changes);

    let reports = verify_references(
        vec![reference(1, "Graph Neural Netwrks for Molecular Proprty")],
        Collaborators {
            lookup,
            fallback: Some(Arc::new(RawCitationFallback)),
            adjudicator: Some(Arc::clone(&adjudicator) as Arc<dyn Adjudicator>),
        },
        serial_config(),
        move |event| {
            if let ProgressEvent::VerdictChanged { from, to, stage, .. } = event {
                changes_seen.lock().unwrap().push((from, to, stage));
            }
        },
        CancellationToken::new(),
    )
    .await;

    let report = &reports[0];
    assert_eq!(report.verdict(), Verdict::Verified);
    assert_eq!(report.attempts.len(), 2);
    assert_eq!(report.attempts[0].stage, Stage::Initial);
    assert_eq!(report.attempts[0].verdict, Verdict::Unverified);
    assert_eq!(report.attempts[1].stage, Stage::Reextraction);

    let recorded: Vec<_> = report.verdict_changes().collect();
    assert_eq!(recorded.len(), 1);

    assert_eq!(
        *changes.lock().unwrap(),
        vec![(Verdict::Unverified, Verdict::Verified, Stage::Reextraction)]
    );
    assert_eq!(adjudicator.call_count(), 0);
}

#[tokio::test]
async fn adjudication_settles_remaining_references() {
    let lookup = Arc::new(MockLookup::new(MockResponse::Empty));
    let mut overrides = HashMap::new();
    overrides.insert(0, Verdict::Verified);
    overrides.insert(1, Verdict::Suspicious);
    let adjudicator = Arc::new(MockAdjudicator::with_overrides(overrides));

    let reports = verify_references(
        vec![
            reference(1, "A Real Paper the Index Does Not Cover"),
            reference(2, "A Fabricated Paper That Never Existed Anywhere"),
        ],
        Collaborators {
            lookup,
            fallback: None,
            adjudicator: Some(Arc::clone(&adjudicator) as Arc<dyn Adjudicator>),
        },
        serial_config(),
        |_| {},
        CancellationToken::new(),
    )
    .await;

    assert_eq!(reports[0].verdict(), Verdict::Verified);
    assert_eq!(reports[0].latest().stage, Stage::Adjudication);
    assert_eq!(reports[1].verdict(), Verdict::Suspicious);
    assert_eq!(adjudicator.call_count(), 1);
}

#[tokio::test]
async fn progress_events_cover_every_reference() {
    let lookup = Arc::new(MockLookup::new(MockResponse::Empty));
    let events = Arc::new(Mutex::new((0usize, 0usize)));
    let events_seen = Arc::clone(&events);

    let refs: Vec<Reference> = (1..=4)
        .map(|i| reference(i, &format!("Some Unfindable Paper Number {i} Title")))
        .collect();

    verify_references(
        refs,
        collaborators(lookup),
        Config::default(),
        move |event| {
            let mut counts = events_seen.lock().unwrap();
            match event {
                ProgressEvent::Checking { .. } => counts.0 += 1,
                ProgressEvent::Classified { .. } => counts.1 += 1,
                _ => {}
            }
        },
        CancellationToken::new(),
    )
    .await;

    let counts = events.lock().unwrap();
    assert_eq!(counts.0, 4);
    assert_eq!(counts.1, 4);
}

#[tokio::test]
async fn cancelled_run_submits_nothing() {
    let lookup = Arc::new(MockLookup::new(MockResponse::Empty));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let reports = verify_references(
        vec![reference(1, "Should Not Be Processed At All")],
        collaborators(Arc::clone(&lookup)),
        Config::default(),
        |_| {},
        cancel,
    )
    .await;

    assert!(reports.is_empty());
    assert_eq!(lookup.call_count(), 0);
}

struct EmptyExtractor;

impl ReferenceExtractor for EmptyExtractor {
    fn extract<'a>(
        &'a self,
        _path: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Reference>, ExtractError>> + Send + 'a>> {
        Box::pin(async { Ok(vec![]) })
    }
}

#[tokio::test]
async fn empty_bibliography_is_fatal() {
    let lookup = Arc::new(MockLookup::new(MockResponse::Empty));
    let result = verify_document(
        Path::new("/tmp/paper.pdf"),
        &EmptyExtractor,
        collaborators(lookup),
        Config::default(),
        |_| {},
        CancellationToken::new(),
    )
    .await;

    assert!(matches!(result, Err(ExtractError::NoReferences)));
}
