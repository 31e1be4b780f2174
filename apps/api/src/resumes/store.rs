use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::ResumeRow;

/// Persistence seam for resume rows.
#[async_trait]
pub trait ResumeStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ResumeRow>, AppError>;
    async fn find_by_hash(&self, resume_hash: &str) -> Result<Option<ResumeRow>, AppError>;

    /// Inserts a new resume row. Returns `None` when the unique hash
    /// constraint fired — a concurrent upload of the same content won.
    async fn insert(&self, id: Uuid, resume_hash: &str) -> Result<Option<ResumeRow>, AppError>;

    /// Backfills the blob key once the text write succeeded.
    async fn set_storage_key(&self, id: Uuid, storage_key: &str) -> Result<(), AppError>;

    /// Compensating rollback for a failed blob write after row insert.
    async fn delete(&self, id: Uuid) -> Result<(), AppError>;
}

pub struct PgResumeStore {
    pool: PgPool,
}

impl PgResumeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResumeStore for PgResumeStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ResumeRow>, AppError> {
        Ok(
            sqlx::query_as::<_, ResumeRow>("SELECT * FROM resumes WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_by_hash(&self, resume_hash: &str) -> Result<Option<ResumeRow>, AppError> {
        Ok(
            sqlx::query_as::<_, ResumeRow>("SELECT * FROM resumes WHERE resume_hash = $1")
                .bind(resume_hash)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn insert(&self, id: Uuid, resume_hash: &str) -> Result<Option<ResumeRow>, AppError> {
        Ok(sqlx::query_as::<_, ResumeRow>(
            r#"
            INSERT INTO resumes (id, resume_hash)
            VALUES ($1, $2)
            ON CONFLICT (resume_hash) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(resume_hash)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn set_storage_key(&self, id: Uuid, storage_key: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE resumes SET storage_key = $1 WHERE id = $2")
            .bind(storage_key)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM resumes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
