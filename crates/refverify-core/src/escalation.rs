//! Escalation controller: conditional secondary passes for references
//! the initial classification could not settle.
//!
//! VERIFIED and SUSPICIOUS are terminal. Stage A (title re-extraction)
//! applies to UNVERIFIED references only and runs at most once per
//! reference. Stage B (adjudication) applies to whatever is still
//! REVIEW or UNVERIFIED afterwards, in fixed-size sequential batches.

use tokio_util::sync::CancellationToken;

use crate::adjudicate::AdjudicationItem;
use crate::normalize::normalize_title;
use crate::pipeline::{Collaborators, classify_once};
use crate::{Config, MatchResult, ProgressEvent, RefReport, Stage, Verdict};

/// What the controller does with a reference at a given stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Keep,
    Reextract,
    Adjudicate,
}

/// The (verdict, stage) transition table.
pub fn next_action(verdict: Verdict, stage: Stage) -> Action {
    match (verdict, stage) {
        (Verdict::Unverified, Stage::Reextraction) => Action::Reextract,
        (Verdict::Review | Verdict::Unverified, Stage::Adjudication) => Action::Adjudicate,
        _ => Action::Keep,
    }
}

pub(crate) async fn run(
    reports: &mut [RefReport],
    collaborators: &Collaborators,
    config: &Config,
    client: &reqwest::Client,
    progress: &(dyn Fn(ProgressEvent) + Send + Sync),
    cancel: &CancellationToken,
) {
    run_reextraction(reports, collaborators, config, client, progress, cancel).await;
    run_adjudication(reports, collaborators, config, progress, cancel).await;
}

/// Stage A: ask the fallback extractor for a corrected title and re-run
/// the classification chain once with it.
async fn run_reextraction(
    reports: &mut [RefReport],
    collaborators: &Collaborators,
    config: &Config,
    client: &reqwest::Client,
    progress: &(dyn Fn(ProgressEvent) + Send + Sync),
    cancel: &CancellationToken,
) {
    let Some(fallback) = &collaborators.fallback else {
        return;
    };

    for (index, report) in reports.iter_mut().enumerate() {
        if cancel.is_cancelled() {
            return;
        }
        if next_action(report.verdict(), Stage::Reextraction) != Action::Reextract {
            continue;
        }
        // At most one re-extraction attempt per reference.
        if report.attempts.iter().any(|a| a.stage == Stage::Reextraction) {
            continue;
        }

        let Some(corrected) = fallback.reextract_title(&report.reference) else {
            continue;
        };
        if normalize_title(&corrected) == report.latest().query_title {
            continue;
        }

        progress(ProgressEvent::Reextracting {
            index,
            corrected_title: corrected.clone(),
        });

        let previous = report.verdict();
        let attempt = classify_once(
            &report.reference,
            &corrected,
            Stage::Reextraction,
            index,
            collaborators.lookup.as_ref(),
            client,
            config,
            progress,
        )
        .await;

        if attempt.verdict != previous {
            progress(ProgressEvent::VerdictChanged {
                index,
                from: previous,
                to: attempt.verdict,
                stage: Stage::Reextraction,
            });
        }
        report.supersede(attempt);
    }
}

/// Stage B: batch the remaining unsettled references and accept the
/// adjudicator's judgment as final. A failed batch leaves its references
/// at their pre-adjudication verdict.
async fn run_adjudication(
    reports: &mut [RefReport],
    collaborators: &Collaborators,
    config: &Config,
    progress: &(dyn Fn(ProgressEvent) + Send + Sync),
    cancel: &CancellationToken,
) {
    let Some(adjudicator) = &collaborators.adjudicator else {
        return;
    };

    let eligible: Vec<usize> = reports
        .iter()
        .enumerate()
        .filter(|(_, r)| next_action(r.verdict(), Stage::Adjudication) == Action::Adjudicate)
        .map(|(i, _)| i)
        .collect();
    if eligible.is_empty() {
        return;
    }

    let batch_size = config.adjudication_batch_size.max(1);
    let total_batches = eligible.len().div_ceil(batch_size);

    for (batch_no, chunk) in eligible.chunks(batch_size).enumerate() {
        if cancel.is_cancelled() {
            return;
        }

        progress(ProgressEvent::AdjudicationBatch {
            batch: batch_no + 1,
            total_batches,
            size: chunk.len(),
        });

        let items: Vec<AdjudicationItem> = chunk
            .iter()
            .map(|&i| {
                let report = &reports[i];
                let latest = report.latest();
                AdjudicationItem {
                    index: i,
                    title: latest.query_title.clone(),
                    authors: report.reference.authors.clone(),
                    year: report.reference.year,
                    candidate: latest.best.clone(),
                    current_verdict: latest.verdict,
                    current_score: latest.score,
                }
            })
            .collect();

        let outcomes = match adjudicator.adjudicate(&items).await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                tracing::warn!(
                    service = adjudicator.name(),
                    batch = batch_no + 1,
                    error = %e,
                    "adjudication batch failed, keeping prior verdicts"
                );
                continue;
            }
        };

        for &i in chunk {
            let Some(outcome) = outcomes.get(&i) else {
                continue;
            };
            let report = &mut reports[i];
            let latest = report.latest();
            let previous = latest.verdict;

            let attempt = MatchResult {
                stage: Stage::Adjudication,
                query_title: latest.query_title.clone(),
                best: latest.best.clone(),
                title_score: latest.title_score,
                second_score: latest.second_score,
                ambiguous: latest.ambiguous,
                corroboration: latest.corroboration,
                score: outcome.confidence,
                verdict: outcome.verdict,
                reason: format!("adjudicated: {}", outcome.reasoning),
            };

            if outcome.verdict != previous {
                progress(ProgressEvent::VerdictChanged {
                    index: i,
                    from: previous,
                    to: outcome.verdict,
                    stage: Stage::Adjudication,
                });
            }
            report.supersede(attempt);
        }
    }
}
