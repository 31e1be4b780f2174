use sha2::{Digest, Sha256};
use tracing::{error, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::ResumeRow;
use crate::resumes::store::ResumeStore;
use crate::storage::BlobStore;

/// SHA-256 hex digest of the resume text. This is the resume's identity:
/// uploads with the same digest converge on one row and one blob, and the
/// digest is denormalized onto match rows for cache invalidation.
pub fn resume_fingerprint(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Blob key for a resume's text. Keyed by row id, not by hash.
pub fn resume_storage_key(id: Uuid) -> String {
    format!("resumes/{id}.txt")
}

#[derive(Debug)]
pub struct CreatedResume {
    pub resume: ResumeRow,
    /// False when an identical upload already existed.
    pub created: bool,
}

/// Idempotently creates a resume from its text.
///
/// Order matters: row first, then blob, then storage-key backfill. A failed
/// blob write rolls the row back so no record ever points at a missing blob.
pub async fn create_resume(
    store: &dyn ResumeStore,
    blobs: &dyn BlobStore,
    text: &str,
) -> Result<CreatedResume, AppError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::Validation("resume text must not be empty".into()));
    }

    let resume_hash = resume_fingerprint(text);
    if let Some(existing) = store.find_by_hash(&resume_hash).await? {
        info!("Resume upload matched existing hash {resume_hash}, reusing row");
        return Ok(CreatedResume {
            resume: existing,
            created: false,
        });
    }

    let id = Uuid::new_v4();
    let mut resume = match store.insert(id, &resume_hash).await? {
        Some(row) => row,
        None => {
            // A concurrent identical upload won the unique race; its row is
            // just as good as ours.
            let winner = store.find_by_hash(&resume_hash).await?.ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!(
                    "resume insert conflicted on hash {resume_hash} but the winning row is missing"
                ))
            })?;
            return Ok(CreatedResume {
                resume: winner,
                created: false,
            });
        }
    };

    let storage_key = resume_storage_key(id);
    if let Err(e) = blobs.put_text(&storage_key, text.to_string()).await {
        if let Err(rollback) = store.delete(id).await {
            error!("Rollback of resume {id} after failed blob write also failed: {rollback}");
        }
        return Err(e);
    }

    store.set_storage_key(id, &storage_key).await?;
    resume.storage_key = Some(storage_key);

    info!("Created resume {id} (hash {resume_hash})");
    Ok(CreatedResume {
        resume,
        created: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{InMemoryBlobStore, InMemoryResumeStore};

    #[test]
    fn test_fingerprint_is_deterministic_sha256_hex() {
        let a = resume_fingerprint("X");
        assert_eq!(a, resume_fingerprint("X"));
        assert_eq!(a.len(), 64);
        assert_ne!(a, resume_fingerprint("Y"));
    }

    #[test]
    fn test_storage_key_scheme() {
        let id = Uuid::new_v4();
        assert_eq!(resume_storage_key(id), format!("resumes/{id}.txt"));
    }

    #[tokio::test]
    async fn test_identical_upload_is_idempotent() {
        let store = InMemoryResumeStore::default();
        let blobs = InMemoryBlobStore::default();

        let first = create_resume(&store, &blobs, "resume text").await.unwrap();
        let second = create_resume(&store, &blobs, "resume text").await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.resume.id, second.resume.id);
        assert_eq!(first.resume.resume_hash, second.resume.resume_hash);
        assert_eq!(store.row_count(), 1);
        assert_eq!(blobs.blob_count(), 1);
    }

    #[tokio::test]
    async fn test_blob_failure_rolls_back_the_row() {
        let store = InMemoryResumeStore::default();
        let blobs = InMemoryBlobStore::failing();

        let err = create_resume(&store, &blobs, "resume text").await.unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
        assert_eq!(store.row_count(), 0, "orphaned row must be rolled back");
    }

    #[tokio::test]
    async fn test_empty_text_is_a_validation_error() {
        let store = InMemoryResumeStore::default();
        let blobs = InMemoryBlobStore::default();
        let err = create_resume(&store, &blobs, "   \n").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_insert_conflict_converges_on_winner() {
        // Simulate losing the unique race: the store reports a conflict and
        // a row with our hash already exists.
        let store = InMemoryResumeStore::default();
        let blobs = InMemoryBlobStore::default();
        let winner = create_resume(&store, &blobs, "resume text").await.unwrap();

        store.force_conflict_once();
        store.hide_from_prefetch_once();
        let loser = create_resume(&store, &blobs, "resume text").await.unwrap();
        assert!(!loser.created);
        assert_eq!(loser.resume.id, winner.resume.id);
    }
}
