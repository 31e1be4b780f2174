//! Batch orchestrator — the sequential matching state machine.
//!
//! One run owns its accumulator outright. Chunks are scored strictly one at
//! a time: a single outstanding workflow call bounds load on the scoring
//! service and keeps progress reporting deterministic.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};
use uuid::Uuid;

use crate::matching::cache::CacheGate;
use crate::matching::cancel::CancelToken;
use crate::matching::chunk::chunk_jobs;
use crate::matching::retry::{with_retry, RetryPolicy};
use crate::models::match_result::{MatchSummary, NewMatchResult, ResultType, Source};
use crate::scoring_client::{JobForScoring, ScoringClient, ScoringError};

/// One matching session's input.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub resume_id: Uuid,
    pub resume_hash: String,
    pub resume_text: String,
    pub jobs: Vec<JobForScoring>,
    /// When true, `prior_results` seeds the accumulator and only jobs absent
    /// from it are scored.
    pub incremental: bool,
    pub prior_results: Vec<MatchSummary>,
    /// Stable progress denominator for incremental continuations. Defaults
    /// to prior + pending when not supplied.
    pub total_jobs_count: Option<usize>,
}

/// How a run ended. Cancellation is a third, silent terminal state — neither
/// completed nor failed.
#[derive(Debug)]
pub enum BatchOutcome {
    Completed,
    Failed(ScoringError),
    Cancelled,
}

/// Final state of a run.
#[derive(Debug)]
pub struct BatchReport {
    pub results: Vec<MatchSummary>,
    pub processed_count: usize,
    pub total_count: usize,
    pub outcome: BatchOutcome,
}

/// Progress snapshot emitted after every chunk (and once at start). The
/// orchestrator never persists these itself — mirroring them to a session
/// store is the caller's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSnapshot {
    pub results: Vec<MatchSummary>,
    pub processed_count: usize,
    pub total_count: usize,
    pub is_complete: bool,
    pub error: Option<String>,
}

pub struct BatchMatcher {
    client: Arc<dyn ScoringClient>,
    gate: CacheGate,
    policy: RetryPolicy,
    chunk_size: usize,
}

impl BatchMatcher {
    pub fn new(
        client: Arc<dyn ScoringClient>,
        gate: CacheGate,
        policy: RetryPolicy,
        chunk_size: usize,
    ) -> Self {
        Self {
            client,
            gate,
            policy,
            chunk_size,
        }
    }

    /// Runs one matching session to a terminal state.
    ///
    /// Chunk failures are logged and skipped; only a run where no chunk
    /// succeeds ends in `Failed`. Cancellation aborts the in-flight call and
    /// stops silently with whatever was merged so far.
    pub async fn run(
        &self,
        req: &BatchRequest,
        progress: Option<UnboundedSender<BatchSnapshot>>,
        cancel: &CancelToken,
    ) -> BatchReport {
        let mut accumulator: Vec<MatchSummary> = if req.incremental {
            req.prior_results.clone()
        } else {
            Vec::new()
        };

        let pending: Vec<JobForScoring> = req
            .jobs
            .iter()
            .filter(|job| !accumulator.iter().any(|m| m.job_id == job.id))
            .cloned()
            .collect();

        let total_count = req
            .total_jobs_count
            .unwrap_or(accumulator.len() + pending.len());

        if pending.is_empty() {
            // Everything was already scored; complete without a single call.
            info!(
                "Batch run for resume {} has no unscored jobs, short-circuiting",
                req.resume_id
            );
            emit(&progress, &accumulator, total_count, true, None);
            return BatchReport {
                processed_count: accumulator.len(),
                results: accumulator,
                total_count,
                outcome: BatchOutcome::Completed,
            };
        }

        emit(&progress, &accumulator, total_count, false, None);

        let chunks = chunk_jobs(&pending, self.chunk_size);
        info!(
            "Batch run for resume {}: {} jobs to score in {} chunk(s), {} prior",
            req.resume_id,
            pending.len(),
            chunks.len(),
            accumulator.len()
        );

        let mut any_success = false;
        let mut last_error: Option<ScoringError> = None;

        for (index, chunk) in chunks.iter().enumerate() {
            if cancel.is_cancelled() {
                return self.cancelled(req, accumulator, total_count);
            }

            let call = with_retry(&self.policy, || {
                self.client.score_batch(&req.resume_text, chunk)
            });
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    return self.cancelled(req, accumulator, total_count);
                }
                result = call => result,
            };

            match result {
                Ok(summaries) => {
                    any_success = true;
                    // Drop anything already merged — a retried chunk may
                    // resend jobs a previous attempt partially returned.
                    let mut fresh = Vec::new();
                    for summary in summaries {
                        if accumulator.iter().any(|m| m.job_id == summary.job_id) {
                            continue;
                        }
                        fresh.push(summary.clone());
                        accumulator.push(summary);
                    }
                    self.persist_chunk(req, &fresh).await;
                    emit(&progress, &accumulator, total_count, false, None);
                }
                Err(e) => {
                    warn!(
                        "Chunk {}/{} failed after retries for resume {}: {e}",
                        index + 1,
                        chunks.len(),
                        req.resume_id
                    );
                    last_error = Some(e);
                }
            }
        }

        if any_success {
            emit(&progress, &accumulator, total_count, true, None);
            BatchReport {
                processed_count: accumulator.len(),
                results: accumulator,
                total_count,
                outcome: BatchOutcome::Completed,
            }
        } else {
            let error =
                last_error.unwrap_or_else(|| ScoringError::Workflow("all batches failed".into()));
            emit(
                &progress,
                &accumulator,
                total_count,
                false,
                Some(error.to_string()),
            );
            BatchReport {
                processed_count: accumulator.len(),
                results: accumulator,
                total_count,
                outcome: BatchOutcome::Failed(error),
            }
        }
    }

    fn cancelled(
        &self,
        req: &BatchRequest,
        accumulator: Vec<MatchSummary>,
        total_count: usize,
    ) -> BatchReport {
        info!(
            "Batch run for resume {} cancelled after {} result(s)",
            req.resume_id,
            accumulator.len()
        );
        BatchReport {
            processed_count: accumulator.len(),
            results: accumulator,
            total_count,
            outcome: BatchOutcome::Cancelled,
        }
    }

    /// Best-effort persistence of one chunk's fresh results. Failures are
    /// logged and never alter the in-memory outcome.
    async fn persist_chunk(&self, req: &BatchRequest, fresh: &[MatchSummary]) {
        for summary in fresh {
            let new = NewMatchResult {
                resume_id: req.resume_id,
                job_id: summary.job_id.clone(),
                resume_hash: req.resume_hash.clone(),
                source: Source::Batch,
                result_type: ResultType::Scoring,
                data: json!({
                    "overall": summary.overall,
                    "scores": summary.scores,
                }),
            };
            if let Err(e) = self.gate.record(new).await {
                warn!(
                    "Failed to persist batch score for job {}: {e}",
                    summary.job_id
                );
            }
        }
    }
}

fn emit(
    progress: &Option<UnboundedSender<BatchSnapshot>>,
    results: &[MatchSummary],
    total_count: usize,
    is_complete: bool,
    error: Option<String>,
) {
    if let Some(tx) = progress {
        // A dropped receiver just means nobody is watching anymore.
        let _ = tx.send(BatchSnapshot {
            results: results.to_vec(),
            processed_count: results.len(),
            total_count,
            is_complete,
            error,
        });
    }
}
