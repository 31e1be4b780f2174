use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A stored resume. One row per unique resume content — `resume_hash` is the
/// SHA-256 of the text and carries a UNIQUE constraint, so re-uploading the
/// same text converges on the existing row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeRow {
    pub id: Uuid,
    pub resume_hash: String,
    /// Blob store key for the resume text. Backfilled after the blob write;
    /// `None` only transiently during creation.
    pub storage_key: Option<String>,
    pub created_at: DateTime<Utc>,
}
