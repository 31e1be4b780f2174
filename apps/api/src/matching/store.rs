use async_trait::async_trait;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::match_result::{
    MatchResultRow, MatchSummary, NewMatchResult, ResultType, ScoringData,
};

/// Persistence seam for match results. Carried as `Arc<dyn MatchStore>` so
/// the orchestrator and resolver can be exercised against in-memory doubles.
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Most recent row for `(resume_id, job_id, result_type, version)`.
    /// Rows of other versions are invisible to this query.
    async fn latest(
        &self,
        resume_id: Uuid,
        job_id: &str,
        result_type: ResultType,
        version: &str,
    ) -> Result<Option<MatchResultRow>, AppError>;

    /// Inserts a new row. Returns `None` when the unique constraint on the
    /// identity tuple fired — the caller lost a first-writer race and should
    /// re-read the winner's row.
    async fn insert(
        &self,
        new: &NewMatchResult,
        version: &str,
    ) -> Result<Option<MatchResultRow>, AppError>;

    /// Latest scoring summaries per job for a resume at one cache version.
    /// Used to seed incremental batch runs with already-scored jobs.
    async fn scored_summaries(
        &self,
        resume_id: Uuid,
        version: &str,
    ) -> Result<Vec<MatchSummary>, AppError>;
}

pub struct PgMatchStore {
    pool: PgPool,
}

impl PgMatchStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MatchStore for PgMatchStore {
    async fn latest(
        &self,
        resume_id: Uuid,
        job_id: &str,
        result_type: ResultType,
        version: &str,
    ) -> Result<Option<MatchResultRow>, AppError> {
        Ok(sqlx::query_as::<_, MatchResultRow>(
            r#"
            SELECT * FROM match_results
            WHERE resume_id = $1 AND job_id = $2 AND result_type = $3 AND version = $4
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(resume_id)
        .bind(job_id)
        .bind(result_type.as_str())
        .bind(version)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn insert(
        &self,
        new: &NewMatchResult,
        version: &str,
    ) -> Result<Option<MatchResultRow>, AppError> {
        // ON CONFLICT DO NOTHING + RETURNING: no row back means another
        // writer already owns the tuple.
        Ok(sqlx::query_as::<_, MatchResultRow>(
            r#"
            INSERT INTO match_results
                (id, resume_id, job_id, resume_hash, source, version, result_type, data)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (resume_id, job_id, result_type, version) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.resume_id)
        .bind(&new.job_id)
        .bind(&new.resume_hash)
        .bind(new.source.as_str())
        .bind(version)
        .bind(new.result_type.as_str())
        .bind(&new.data)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn scored_summaries(
        &self,
        resume_id: Uuid,
        version: &str,
    ) -> Result<Vec<MatchSummary>, AppError> {
        let rows = sqlx::query_as::<_, MatchResultRow>(
            r#"
            SELECT DISTINCT ON (job_id) * FROM match_results
            WHERE resume_id = $1 AND result_type = 'scoring' AND version = $2
            ORDER BY job_id, created_at DESC
            "#,
        )
        .bind(resume_id)
        .bind(version)
        .fetch_all(&self.pool)
        .await?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_value::<ScoringData>(row.data.clone()) {
                Ok(data) => summaries.push(MatchSummary {
                    job_id: row.job_id,
                    overall: data.overall,
                    scores: data.scores,
                }),
                Err(e) => {
                    // A row we can't read is simply not a prior result.
                    warn!("Skipping unreadable scoring row for job {}: {e}", row.job_id);
                }
            }
        }
        Ok(summaries)
    }
}
