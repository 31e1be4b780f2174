mod config;
mod db;
mod errors;
mod jobs;
mod matching;
mod models;
mod resumes;
mod routes;
mod scoring_client;
mod state;
mod storage;
#[cfg(test)]
mod test_support;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::matching::cache::CacheGate;
use crate::matching::orchestrator::BatchMatcher;
use crate::matching::progress::SessionRegistry;
use crate::matching::resolver::DetailResolver;
use crate::matching::retry::RetryPolicy;
use crate::matching::store::{MatchStore, PgMatchStore};
use crate::resumes::store::{PgResumeStore, ResumeStore};
use crate::routes::build_router;
use crate::scoring_client::{DifyWorkflowClient, ScoringClient};
use crate::state::AppState;
use crate::storage::{BlobStore, S3BlobStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ResuMatch API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let pool = create_pool(&config.database_url).await?;

    // Initialize Redis (progress snapshot mirror)
    let redis = redis::Client::open(config.redis_url.clone())?;
    info!("Redis client initialized");

    // Initialize S3 / MinIO (resume text blobs)
    let s3 = build_s3_client(&config).await;
    let blobs: Arc<dyn BlobStore> =
        Arc::new(S3BlobStore::new(s3, config.s3_bucket.clone()));
    info!("S3 client initialized");

    // Initialize the scoring workflow client
    let scoring: Arc<dyn ScoringClient> = Arc::new(DifyWorkflowClient::new(
        config.dify_workflow_url.clone(),
        config.dify_api_key.clone(),
        &config.matching,
    ));
    info!(
        "Scoring client initialized (batch size {}, cache version {})",
        config.matching.batch_size, config.matching.cache_version
    );

    // Stores and the cache gate shared by both matching paths
    let resumes: Arc<dyn ResumeStore> = Arc::new(PgResumeStore::new(pool.clone()));
    let matches: Arc<dyn MatchStore> = Arc::new(PgMatchStore::new(pool.clone()));
    let gate = CacheGate::new(matches.clone(), config.matching.cache_version.clone());

    let matcher = Arc::new(BatchMatcher::new(
        scoring.clone(),
        gate.clone(),
        RetryPolicy::from_config(&config.matching),
        config.matching.batch_size,
    ));
    let resolver = Arc::new(DetailResolver::new(
        scoring,
        gate,
        resumes.clone(),
        blobs.clone(),
    ));

    // Build app state
    let state = AppState {
        db: pool,
        redis,
        config: config.clone(),
        resumes,
        matches,
        blobs,
        matcher,
        resolver,
        sessions: SessionRegistry::new(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "resumatch-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
