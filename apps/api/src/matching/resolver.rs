//! Two-phase resolver for the job-detail view: a numeric scoring phase, then
//! a qualitative details phase that takes the scoring output as an input.
//! Each phase is cache-or-call-and-persist through the cache gate, and their
//! failures are independent — details is merely blocked until scoring lands.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::matching::cache::CacheGate;
use crate::models::match_result::{
    DetailsData, EnvelopeMeta, MatchEnvelope, MatchResultRow, NewMatchResult, ResultType,
    ScoringData, Source,
};
use crate::models::resume::ResumeRow;
use crate::resumes::store::ResumeStore;
use crate::scoring_client::{ScoringClient, ScoringError};
use crate::storage::BlobStore;

const EMPTY_SCORING_HINT: &str = "The scoring model returned no usable scores. This usually \
indicates an upstream problem such as workflow quota exhaustion — try again later.";
const EMPTY_DETAILS_HINT: &str = "The details model returned an entirely empty report. This \
usually indicates an upstream problem such as workflow quota exhaustion — try again later.";

/// Input for one phase of a job-detail resolution.
#[derive(Debug, Clone)]
pub struct PhaseRequest {
    pub resume_id: Uuid,
    pub job_id: String,
    pub job_description: String,
    /// Score carried over from a prior batch run. When present, the scoring
    /// phase short-circuits without touching cache or network.
    pub prior: Option<ScoringData>,
}

/// Per-phase state as rendered to the client.
#[derive(Debug, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PhaseOutcome<T> {
    Done { envelope: MatchEnvelope<T> },
    Error { message: String },
    Blocked,
}

/// Both phases for one job-detail view.
#[derive(Debug, Serialize)]
pub struct JobMatchDetail {
    pub scoring: PhaseOutcome<ScoringData>,
    pub details: PhaseOutcome<DetailsData>,
}

pub struct DetailResolver {
    client: Arc<dyn ScoringClient>,
    gate: CacheGate,
    resumes: Arc<dyn ResumeStore>,
    blobs: Arc<dyn BlobStore>,
}

impl DetailResolver {
    pub fn new(
        client: Arc<dyn ScoringClient>,
        gate: CacheGate,
        resumes: Arc<dyn ResumeStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            client,
            gate,
            resumes,
            blobs,
        }
    }

    /// Scoring phase. Precedence: caller-supplied prior score, then the
    /// persisted cache row, then a single-job workflow call.
    pub async fn resolve_scoring(
        &self,
        req: &PhaseRequest,
    ) -> Result<MatchEnvelope<ScoringData>, AppError> {
        let resume = self.load_resume(req.resume_id).await?;

        if let Some(prior) = &req.prior {
            return Ok(self.caller_cached_envelope(req, &resume, prior.clone()));
        }

        if let Some(row) = self
            .gate
            .lookup(req.resume_id, &req.job_id, ResultType::Scoring)
            .await?
        {
            match cached_envelope::<ScoringData>(&row) {
                Some(envelope) => return Ok(envelope),
                None => warn!(
                    "Unreadable cached scoring row for job {}, recomputing",
                    req.job_id
                ),
            }
        }

        let resume_text = self.load_resume_text(&resume).await?;
        let data = self
            .client
            .score_single(&resume_text, &req.job_id, &req.job_description)
            .await?;
        ensure_usable_scoring(&data)?;

        let row = self
            .persist(req, &resume, ResultType::Scoring, json!(&data))
            .await;
        Ok(self.envelope(req, &resume, row, Source::Dify, ResultType::Scoring, data))
    }

    /// Details phase. `overall` is the scoring phase's output and is passed
    /// through to the workflow — this phase must never run before scoring.
    pub async fn resolve_details(
        &self,
        req: &PhaseRequest,
        overall: f64,
    ) -> Result<MatchEnvelope<DetailsData>, AppError> {
        let resume = self.load_resume(req.resume_id).await?;

        if let Some(row) = self
            .gate
            .lookup(req.resume_id, &req.job_id, ResultType::Details)
            .await?
        {
            match cached_envelope::<DetailsData>(&row) {
                Some(envelope) => return Ok(envelope),
                None => warn!(
                    "Unreadable cached details row for job {}, recomputing",
                    req.job_id
                ),
            }
        }

        let resume_text = self.load_resume_text(&resume).await?;
        let data = self
            .client
            .job_details(&resume_text, &req.job_id, &req.job_description, overall)
            .await?;
        ensure_usable_details(&data)?;

        let row = self
            .persist(req, &resume, ResultType::Details, json!(&data))
            .await;
        Ok(self.envelope(req, &resume, row, Source::Dify, ResultType::Details, data))
    }

    /// Resolves both phases for one view. Details stays `Blocked` when
    /// scoring fails; a details failure leaves the scoring result intact.
    pub async fn resolve(&self, req: &PhaseRequest) -> JobMatchDetail {
        let scoring = match self.resolve_scoring(req).await {
            Ok(envelope) => envelope,
            Err(e) => {
                return JobMatchDetail {
                    scoring: PhaseOutcome::Error {
                        message: e.to_string(),
                    },
                    details: PhaseOutcome::Blocked,
                }
            }
        };

        let overall = scoring.data.overall;
        let details = match self.resolve_details(req, overall).await {
            Ok(envelope) => PhaseOutcome::Done { envelope },
            Err(e) => PhaseOutcome::Error {
                message: e.to_string(),
            },
        };

        JobMatchDetail {
            scoring: PhaseOutcome::Done { envelope: scoring },
            details,
        }
    }

    async fn load_resume(&self, resume_id: Uuid) -> Result<ResumeRow, AppError> {
        self.resumes
            .find_by_id(resume_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Resume {resume_id} not found")))
    }

    async fn load_resume_text(&self, resume: &ResumeRow) -> Result<String, AppError> {
        let key = resume.storage_key.as_deref().ok_or_else(|| {
            AppError::Validation(format!("Resume {} has no stored text", resume.id))
        })?;
        self.blobs.get_text(key).await
    }

    /// Best-effort persist. A write failure is logged and the in-memory
    /// result is still returned.
    async fn persist(
        &self,
        req: &PhaseRequest,
        resume: &ResumeRow,
        result_type: ResultType,
        data: serde_json::Value,
    ) -> Option<MatchResultRow> {
        let new = NewMatchResult {
            resume_id: req.resume_id,
            job_id: req.job_id.clone(),
            resume_hash: resume.resume_hash.clone(),
            source: Source::Dify,
            result_type,
            data,
        };
        match self.gate.record(new).await {
            Ok(row) => Some(row),
            Err(e) => {
                warn!(
                    "Failed to persist {result_type} result for job {}: {e}",
                    req.job_id
                );
                None
            }
        }
    }

    fn caller_cached_envelope(
        &self,
        req: &PhaseRequest,
        resume: &ResumeRow,
        data: ScoringData,
    ) -> MatchEnvelope<ScoringData> {
        self.envelope(req, resume, None, Source::Cache, ResultType::Scoring, data)
    }

    fn envelope<T>(
        &self,
        req: &PhaseRequest,
        resume: &ResumeRow,
        row: Option<MatchResultRow>,
        source: Source,
        result_type: ResultType,
        data: T,
    ) -> MatchEnvelope<T> {
        let timestamp = row.as_ref().map(|r| r.created_at).unwrap_or_else(Utc::now);
        MatchEnvelope {
            meta: EnvelopeMeta {
                job_id: req.job_id.clone(),
                resume_hash: resume.resume_hash.clone(),
                source: source.to_string(),
                timestamp,
                version: self.gate.version().to_string(),
                result_type: result_type.to_string(),
            },
            data,
        }
    }
}

/// A persisted row read back as an envelope tagged `source=cache`. Returns
/// `None` when the stored payload no longer deserializes.
fn cached_envelope<T: serde::de::DeserializeOwned>(
    row: &MatchResultRow,
) -> Option<MatchEnvelope<T>> {
    let mut envelope = MatchEnvelope::<T>::from_row(row).ok()?;
    envelope.meta.source = Source::Cache.to_string();
    Some(envelope)
}

/// An empty dimension map or an overall of exactly 0 is treated as "the
/// model produced nothing", not as a valid zero score.
fn ensure_usable_scoring(data: &ScoringData) -> Result<(), ScoringError> {
    if data.scores.is_empty() || data.overall == 0.0 {
        return Err(ScoringError::Empty {
            hint: EMPTY_SCORING_HINT.to_string(),
        });
    }
    Ok(())
}

/// Reject only when every qualitative field is empty at once.
fn ensure_usable_details(data: &DetailsData) -> Result<(), ScoringError> {
    if data.advantages.is_empty()
        && data.disadvantages.is_empty()
        && data.advice.is_empty()
        && data.overview.is_empty()
    {
        return Err(ScoringError::Empty {
            hint: EMPTY_DETAILS_HINT.to_string(),
        });
    }
    Ok(())
}
