use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub dify_api_key: String,
    pub dify_workflow_url: String,
    pub port: u16,
    pub rust_log: String,
    pub matching: MatchConfig,
}

/// Matching policy knobs. The source of truth for batch size, retry budget
/// and per-call timeouts — never hard-code these at call sites.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Jobs per workflow call.
    pub batch_size: usize,
    /// Retries after the first failed attempt, per chunk.
    pub max_retries: u32,
    /// Fixed delay between attempts. No backoff, no jitter.
    pub retry_delay_ms: u64,
    /// Timeout for a batch scoring call.
    pub batch_timeout_secs: u64,
    /// Timeout for single scoring/details calls (heavier prompts).
    pub single_timeout_secs: u64,
    /// Cache epoch tag. Bump to invalidate persisted result shapes without
    /// a migration — rows of other versions are treated as absent.
    pub cache_version: String,
    /// TTL for progress snapshots mirrored into redis.
    pub progress_ttl_secs: u64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        MatchConfig {
            batch_size: 3,
            max_retries: 1,
            retry_delay_ms: 1000,
            batch_timeout_secs: 15,
            single_timeout_secs: 90,
            cache_version: "v2".to_string(),
            progress_ttl_secs: 3600,
        }
    }
}

impl MatchConfig {
    fn from_env() -> Result<Self> {
        let defaults = MatchConfig::default();
        Ok(MatchConfig {
            batch_size: env_or("MATCH_BATCH_SIZE", defaults.batch_size)?,
            max_retries: env_or("MATCH_MAX_RETRIES", defaults.max_retries)?,
            retry_delay_ms: env_or("MATCH_RETRY_DELAY_MS", defaults.retry_delay_ms)?,
            batch_timeout_secs: env_or("MATCH_BATCH_TIMEOUT_SECS", defaults.batch_timeout_secs)?,
            single_timeout_secs: env_or("MATCH_SINGLE_TIMEOUT_SECS", defaults.single_timeout_secs)?,
            cache_version: std::env::var("MATCH_CACHE_VERSION")
                .unwrap_or(defaults.cache_version),
            progress_ttl_secs: env_or("MATCH_PROGRESS_TTL_SECS", defaults.progress_ttl_secs)?,
        })
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            dify_api_key: require_env("DIFY_API_KEY")?,
            dify_workflow_url: require_env("DIFY_WORKFLOW_URL")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            matching: MatchConfig::from_env()?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("'{key}' must be a valid value")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_config_defaults() {
        let cfg = MatchConfig::default();
        assert_eq!(cfg.batch_size, 3);
        assert_eq!(cfg.max_retries, 1);
        assert_eq!(cfg.retry_delay_ms, 1000);
        assert_eq!(cfg.batch_timeout_secs, 15);
        assert_eq!(cfg.single_timeout_secs, 90);
        assert_eq!(cfg.cache_version, "v2");
    }
}
