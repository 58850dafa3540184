//! Pipeline orchestration: fan reference classification out over a
//! worker pool, then run the escalation stages over the results.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::adjudicate::Adjudicator;
use crate::classifier::{ClassifierInput, LookupOutcome, classify};
use crate::corroborate::corroborate;
use crate::escalation;
use crate::lookup::LookupService;
use crate::normalize::{normalize_title, word_count};
use crate::ranker::rank;
use crate::{
    Config, ExtractError, FallbackExtractor, MatchResult, ProgressEvent, RefReport, Reference,
    ReferenceExtractor, Stage,
};

/// The external services a verification run talks to. Optional members
/// disable their escalation stage when absent.
#[derive(Clone)]
pub struct Collaborators {
    pub lookup: Arc<dyn LookupService>,
    pub fallback: Option<Arc<dyn FallbackExtractor>>,
    pub adjudicator: Option<Arc<dyn Adjudicator>>,
}

/// A classification job submitted to the worker pool.
struct RefJob {
    reference: Reference,
    index: usize,
    total: usize,
    result_tx: oneshot::Sender<RefReport>,
}

/// Run one full classification attempt for a reference: normalize the
/// title, consult the lookup service (with bounded retry), rank the
/// candidates, corroborate with author/year metadata, and classify.
pub(crate) async fn classify_once(
    reference: &Reference,
    raw_title: &str,
    stage: Stage,
    index: usize,
    lookup: &dyn LookupService,
    client: &reqwest::Client,
    config: &Config,
    progress: &(dyn Fn(ProgressEvent) + Send + Sync),
) -> MatchResult {
    let query_title = normalize_title(raw_title);
    let words = word_count(&query_title);

    if query_title.is_empty() {
        let (verdict, reason) = classify(
            &ClassifierInput {
                score: 0.0,
                ambiguous: false,
                outcome: LookupOutcome::Empty,
                word_count: 0,
            },
            &config.thresholds,
        );
        return MatchResult {
            stage,
            query_title,
            best: None,
            title_score: 0.0,
            second_score: None,
            ambiguous: false,
            corroboration: 0.0,
            score: 0.0,
            verdict,
            reason,
        };
    }

    // Lookup with bounded retry. A timed-out call is treated identically
    // to a transient service error.
    let mut candidates = Vec::new();
    let mut outcome = LookupOutcome::Failed { attempts: 0 };
    for attempt in 1..=config.lookup_attempts {
        let result = tokio::time::timeout(
            config.lookup_timeout,
            lookup.search(&query_title, client, config.lookup_timeout),
        )
        .await;

        let error = match result {
            Ok(Ok(found)) => {
                outcome = if found.is_empty() {
                    LookupOutcome::Empty
                } else {
                    LookupOutcome::Candidates
                };
                candidates = found;
                break;
            }
            Ok(Err(e)) if e.is_transient() => e.to_string(),
            Ok(Err(e)) => {
                tracing::warn!(service = lookup.name(), error = %e, "lookup failed");
                outcome = LookupOutcome::Failed { attempts: attempt };
                break;
            }
            Err(_) => "request timed out".to_string(),
        };

        outcome = LookupOutcome::Failed { attempts: attempt };
        if attempt < config.lookup_attempts {
            tracing::warn!(
                service = lookup.name(),
                attempt,
                error = %error,
                "transient lookup failure, retrying"
            );
            progress(ProgressEvent::LookupRetry {
                index,
                attempt,
                error,
            });
            tokio::time::sleep(config.retry_backoff * attempt).await;
        }
    }

    let ranking = rank(&query_title, &candidates, &config.thresholds);
    let best = ranking.best_index.map(|i| candidates[i].clone());

    let corroboration = match &best {
        Some(candidate) => corroborate(reference, candidate, ranking.best_score, &config.thresholds),
        None => 0.0,
    };
    let score = (ranking.best_score + corroboration).clamp(0.0, 1.0);

    let (verdict, reason) = classify(
        &ClassifierInput {
            score,
            ambiguous: ranking.ambiguous,
            outcome,
            word_count: words,
        },
        &config.thresholds,
    );

    MatchResult {
        stage,
        query_title,
        best,
        title_score: ranking.best_score,
        second_score: ranking.second_score,
        ambiguous: ranking.ambiguous,
        corroboration,
        score,
        verdict,
        reason,
    }
}

async fn worker_loop(
    job_rx: async_channel::Receiver<RefJob>,
    lookup: Arc<dyn LookupService>,
    client: reqwest::Client,
    config: Arc<Config>,
    progress: Arc<dyn Fn(ProgressEvent) + Send + Sync>,
    cancel: CancellationToken,
) {
    while let Ok(job) = job_rx.recv().await {
        if cancel.is_cancelled() {
            break;
        }

        progress(ProgressEvent::Checking {
            index: job.index,
            total: job.total,
            title: job.reference.raw_title.clone(),
        });

        let attempt = classify_once(
            &job.reference,
            &job.reference.raw_title,
            Stage::Initial,
            job.index,
            lookup.as_ref(),
            &client,
            &config,
            progress.as_ref(),
        )
        .await;

        progress(ProgressEvent::Classified {
            index: job.index,
            total: job.total,
            verdict: attempt.verdict,
            score: attempt.score,
        });

        let _ = job.result_tx.send(RefReport::new(job.reference, attempt));
    }
}

/// Verify a list of references.
///
/// Fans the initial classification out over `num_workers` tasks, then
/// runs the escalation stages sequentially over the collected reports.
/// The returned reports preserve the input order.
pub async fn verify_references(
    refs: Vec<Reference>,
    collaborators: Collaborators,
    config: Config,
    progress: impl Fn(ProgressEvent) + Send + Sync + 'static,
    cancel: CancellationToken,
) -> Vec<RefReport> {
    let total = refs.len();
    if total == 0 {
        return vec![];
    }

    let config = Arc::new(config);
    let progress: Arc<dyn Fn(ProgressEvent) + Send + Sync> = Arc::new(progress);
    let client = reqwest::Client::new();

    let (job_tx, job_rx) = async_channel::unbounded::<RefJob>();
    let mut workers = Vec::with_capacity(config.num_workers.max(1));
    for _ in 0..config.num_workers.max(1) {
        workers.push(tokio::spawn(worker_loop(
            job_rx.clone(),
            Arc::clone(&collaborators.lookup),
            client.clone(),
            Arc::clone(&config),
            Arc::clone(&progress),
            cancel.clone(),
        )));
    }
    drop(job_rx);

    let mut receivers = Vec::with_capacity(total);
    for (index, reference) in refs.into_iter().enumerate() {
        if cancel.is_cancelled() {
            break;
        }
        let (result_tx, result_rx) = oneshot::channel();
        let _ = job_tx
            .send(RefJob {
                reference,
                index,
                total,
                result_tx,
            })
            .await;
        receivers.push((index, result_rx));
    }
    job_tx.close();

    let mut slots: Vec<Option<RefReport>> = Vec::new();
    slots.resize_with(total, || None);
    for (index, rx) in receivers {
        if let Ok(report) = rx.await {
            slots[index] = Some(report);
        }
    }
    for handle in workers {
        let _ = handle.await;
    }

    let mut reports: Vec<RefReport> = slots.into_iter().flatten().collect();

    escalation::run(
        &mut reports,
        &collaborators,
        &config,
        &client,
        progress.as_ref(),
        &cancel,
    )
    .await;

    reports
}

/// Extract references from a document and verify them.
///
/// Extraction failure and an empty bibliography are the only fatal
/// outcomes; everything downstream recovers locally into verdicts.
pub async fn verify_document(
    path: &Path,
    extractor: &dyn ReferenceExtractor,
    collaborators: Collaborators,
    config: Config,
    progress: impl Fn(ProgressEvent) + Send + Sync + 'static,
    cancel: CancellationToken,
) -> Result<Vec<RefReport>, ExtractError> {
    let refs = extractor.extract(path).await?;
    if refs.is_empty() {
        return Err(ExtractError::NoReferences);
    }
    tracing::info!(count = refs.len(), path = %path.display(), "extracted references");
    Ok(verify_references(refs, collaborators, config, progress, cancel).await)
}
