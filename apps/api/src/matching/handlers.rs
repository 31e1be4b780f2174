use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::errors::AppError;
use crate::matching::orchestrator::{BatchOutcome, BatchRequest, BatchSnapshot};
use crate::matching::progress::{load_progress, mirror_progress};
use crate::matching::resolver::{JobMatchDetail, PhaseRequest};
use crate::models::match_result::{DetailsData, MatchEnvelope, MatchSummary, ScoringData};
use crate::scoring_client::JobForScoring;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct JobInput {
    pub id: String,
    pub job_description: String,
}

#[derive(Debug, Deserialize)]
pub struct BatchMatchRequest {
    pub resume_id: Uuid,
    pub resume_text: String,
    pub jobs: Vec<JobInput>,
    #[serde(default)]
    pub incremental: bool,
    #[serde(default)]
    pub prior_results: Vec<MatchSummary>,
    pub total_jobs_count: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct BatchMatchResponse {
    pub match_results: Vec<MatchSummary>,
    pub processed_count: usize,
    pub total_count: usize,
    pub is_complete: bool,
}

/// POST /api/v1/match/batch
///
/// Runs one matching session to completion. Progress snapshots are mirrored
/// to redis while the run is in flight so `GET /match/progress/:resume_id`
/// can observe it, and the session is cancellable via `/match/cancel`.
pub async fn handle_batch_match(
    State(state): State<AppState>,
    Json(req): Json<BatchMatchRequest>,
) -> Result<Json<BatchMatchResponse>, AppError> {
    if req.resume_text.trim().is_empty() {
        return Err(AppError::Validation("resume_text must not be empty".into()));
    }
    for job in &req.jobs {
        if job.id.trim().is_empty() {
            return Err(AppError::Validation("every job needs an id".into()));
        }
        if job.job_description.trim().is_empty() {
            return Err(AppError::Validation(format!(
                "job {} has an empty description",
                job.id
            )));
        }
    }

    let resume = state
        .resumes
        .find_by_id(req.resume_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {} not found", req.resume_id)))?;

    // Incremental runs without an explicit prior list lean on the store:
    // whatever is already persisted at the current version counts as done.
    let prior_results = if req.incremental && req.prior_results.is_empty() {
        state
            .matches
            .scored_summaries(req.resume_id, &state.config.matching.cache_version)
            .await?
    } else {
        req.prior_results
    };

    let batch_request = BatchRequest {
        resume_id: req.resume_id,
        resume_hash: resume.resume_hash,
        resume_text: req.resume_text,
        jobs: req
            .jobs
            .into_iter()
            .map(|j| JobForScoring {
                id: j.id,
                description: j.job_description,
            })
            .collect(),
        incremental: req.incremental,
        prior_results,
        total_jobs_count: req.total_jobs_count,
    };

    let cancel = state.sessions.begin(req.resume_id);
    let (tx, rx) = mpsc::unbounded_channel::<BatchSnapshot>();
    let mirror = mirror_progress(
        state.redis.clone(),
        req.resume_id,
        state.config.matching.progress_ttl_secs,
        rx,
    );

    let report = state.matcher.run(&batch_request, Some(tx), &cancel).await;

    state.sessions.end(req.resume_id, &cancel);
    // The sender side is gone; wait for the last snapshot to land in redis.
    let _ = mirror.await;

    match report.outcome {
        BatchOutcome::Completed => Ok(Json(BatchMatchResponse {
            match_results: report.results,
            processed_count: report.processed_count,
            total_count: report.total_count,
            is_complete: true,
        })),
        // Cancellation is silent: return what was merged, not an error.
        BatchOutcome::Cancelled => Ok(Json(BatchMatchResponse {
            match_results: report.results,
            processed_count: report.processed_count,
            total_count: report.total_count,
            is_complete: false,
        })),
        BatchOutcome::Failed(e) => Err(e.into()),
    }
}

/// GET /api/v1/match/progress/:resume_id
pub async fn handle_progress(
    State(state): State<AppState>,
    Path(resume_id): Path<Uuid>,
) -> Result<Json<BatchSnapshot>, AppError> {
    load_progress(&state.redis, resume_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No progress for resume {resume_id}")))
}

/// POST /api/v1/match/cancel/:resume_id
pub async fn handle_cancel(
    State(state): State<AppState>,
    Path(resume_id): Path<Uuid>,
) -> (StatusCode, Json<Value>) {
    let cancelled = state.sessions.cancel(resume_id);
    (StatusCode::ACCEPTED, Json(json!({ "cancelled": cancelled })))
}

#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    pub resume_id: Uuid,
    pub job_id: String,
    pub job_description: String,
    /// Score carried over from a prior batch run; short-circuits the phase.
    pub prior: Option<ScoringData>,
}

impl ScoreRequest {
    fn validate(&self) -> Result<(), AppError> {
        if self.job_id.trim().is_empty() {
            return Err(AppError::Validation("job_id must not be empty".into()));
        }
        if self.job_description.trim().is_empty() {
            return Err(AppError::Validation(
                "job_description must not be empty".into(),
            ));
        }
        Ok(())
    }

    fn phase_request(self) -> PhaseRequest {
        PhaseRequest {
            resume_id: self.resume_id,
            job_id: self.job_id,
            job_description: self.job_description,
            prior: self.prior,
        }
    }
}

/// POST /api/v1/match/score — the scoring phase for one job.
pub async fn handle_score(
    State(state): State<AppState>,
    Json(req): Json<ScoreRequest>,
) -> Result<Json<MatchEnvelope<ScoringData>>, AppError> {
    req.validate()?;
    let envelope = state.resolver.resolve_scoring(&req.phase_request()).await?;
    Ok(Json(envelope))
}

#[derive(Debug, Deserialize)]
pub struct DetailsRequest {
    pub resume_id: Uuid,
    pub job_id: String,
    pub job_description: String,
    /// The overall score produced by the scoring phase.
    pub overall: f64,
}

/// POST /api/v1/match/details — the details phase; requires the scoring
/// phase's overall score as input.
pub async fn handle_details(
    State(state): State<AppState>,
    Json(req): Json<DetailsRequest>,
) -> Result<Json<MatchEnvelope<DetailsData>>, AppError> {
    if req.job_id.trim().is_empty() {
        return Err(AppError::Validation("job_id must not be empty".into()));
    }
    if req.job_description.trim().is_empty() {
        return Err(AppError::Validation(
            "job_description must not be empty".into(),
        ));
    }
    let phase = PhaseRequest {
        resume_id: req.resume_id,
        job_id: req.job_id,
        job_description: req.job_description,
        prior: None,
    };
    let envelope = state.resolver.resolve_details(&phase, req.overall).await?;
    Ok(Json(envelope))
}

/// POST /api/v1/match/report — both phases for a job-detail view in one
/// round trip. Phase errors are reported per phase, never as a whole-request
/// failure.
pub async fn handle_report(
    State(state): State<AppState>,
    Json(req): Json<ScoreRequest>,
) -> Result<Json<JobMatchDetail>, AppError> {
    req.validate()?;
    let detail = state.resolver.resolve(&req.phase_request()).await;
    Ok(Json(detail))
}
