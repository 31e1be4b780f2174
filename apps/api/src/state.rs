use std::sync::Arc;

use redis::Client as RedisClient;
use sqlx::PgPool;

use crate::config::Config;
use crate::matching::orchestrator::BatchMatcher;
use crate::matching::progress::SessionRegistry;
use crate::matching::resolver::DetailResolver;
use crate::matching::store::MatchStore;
use crate::resumes::store::ResumeStore;
use crate::storage::BlobStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Progress snapshots are mirrored here under a TTL key per session.
    pub redis: RedisClient,
    pub config: Config,
    pub resumes: Arc<dyn ResumeStore>,
    pub matches: Arc<dyn MatchStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub matcher: Arc<BatchMatcher>,
    pub resolver: Arc<DetailResolver>,
    /// Live cancel tokens, one per in-flight matching session.
    pub sessions: SessionRegistry,
}
