use std::sync::Arc;

use anyhow::anyhow;
use uuid::Uuid;

use crate::errors::AppError;
use crate::matching::store::MatchStore;
use crate::models::match_result::{MatchResultRow, NewMatchResult, ResultType};

/// Read-before-write gate over persisted match results.
///
/// Centralizes the cache-epoch tag: every lookup and write goes through one
/// version string, so bumping `MATCH_CACHE_VERSION` invalidates stale result
/// shapes without a migration — old rows are simply never read again.
#[derive(Clone)]
pub struct CacheGate {
    store: Arc<dyn MatchStore>,
    version: String,
}

impl CacheGate {
    pub fn new(store: Arc<dyn MatchStore>, version: String) -> Self {
        Self { store, version }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Most recent row for the tuple at the current version, or `None`.
    pub async fn lookup(
        &self,
        resume_id: Uuid,
        job_id: &str,
        result_type: ResultType,
    ) -> Result<Option<MatchResultRow>, AppError> {
        self.store
            .latest(resume_id, job_id, result_type, &self.version)
            .await
    }

    /// Writes a result, converging on the winner's row if a concurrent
    /// first-writer got there first. Never surfaces a conflict to callers.
    pub async fn record(&self, new: NewMatchResult) -> Result<MatchResultRow, AppError> {
        match self.store.insert(&new, &self.version).await? {
            Some(row) => Ok(row),
            None => self
                .store
                .latest(new.resume_id, &new.job_id, new.result_type, &self.version)
                .await?
                .ok_or_else(|| {
                    AppError::Internal(anyhow!(
                        "insert conflicted for job {} but the winning row is missing",
                        new.job_id
                    ))
                }),
        }
    }
}
