//! Session-scoped plumbing around a batch run: progress snapshots mirrored
//! into redis under a TTL key, and the registry of live cancel tokens.
//! Both are caller concerns — the orchestrator core never touches redis.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use redis::AsyncCommands;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::matching::cancel::CancelToken;
use crate::matching::orchestrator::BatchSnapshot;

fn progress_key(resume_id: Uuid) -> String {
    format!("match:progress:{resume_id}")
}

/// Drains progress snapshots into redis, best-effort. A redis outage costs
/// only the progress view, never the run itself.
pub fn mirror_progress(
    redis: redis::Client,
    resume_id: Uuid,
    ttl_secs: u64,
    mut rx: UnboundedReceiver<BatchSnapshot>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut conn = match redis.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Progress mirror disabled, redis unavailable: {e}");
                return;
            }
        };
        while let Some(snapshot) = rx.recv().await {
            let payload = match serde_json::to_string(&snapshot) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("Failed to serialize progress snapshot: {e}");
                    continue;
                }
            };
            let result: redis::RedisResult<()> =
                conn.set_ex(progress_key(resume_id), payload, ttl_secs).await;
            if let Err(e) = result {
                warn!("Failed to mirror progress for resume {resume_id}: {e}");
            }
        }
    })
}

/// Latest mirrored snapshot for a resume, if any.
pub async fn load_progress(
    redis: &redis::Client,
    resume_id: Uuid,
) -> Result<Option<BatchSnapshot>, AppError> {
    let mut conn = redis
        .get_multiplexed_async_connection()
        .await
        .map_err(|e| AppError::Storage(format!("redis: {e}")))?;
    let raw: Option<String> = conn
        .get(progress_key(resume_id))
        .await
        .map_err(|e| AppError::Storage(format!("redis: {e}")))?;
    match raw {
        Some(raw) => {
            let snapshot = serde_json::from_str(&raw)
                .map_err(|e| AppError::Storage(format!("corrupt progress snapshot: {e}")))?;
            Ok(Some(snapshot))
        }
        None => Ok(None),
    }
}

/// Live cancel tokens, one per resume currently matching in this process.
/// A new run for the same resume supersedes (and cancels) the previous one.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<Mutex<HashMap<Uuid, CancelToken>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh token for a session, cancelling any previous run
    /// still registered for the same resume.
    pub fn begin(&self, resume_id: Uuid) -> CancelToken {
        let token = CancelToken::new();
        let mut sessions = self.inner.lock().expect("session registry poisoned");
        if let Some(previous) = sessions.insert(resume_id, token.clone()) {
            previous.cancel();
        }
        token
    }

    /// Trips the session's token. Returns false when no session is live.
    pub fn cancel(&self, resume_id: Uuid) -> bool {
        let sessions = self.inner.lock().expect("session registry poisoned");
        match sessions.get(&resume_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Removes a finished session, unless a newer run already replaced it.
    pub fn end(&self, resume_id: Uuid, token: &CancelToken) {
        let mut sessions = self.inner.lock().expect("session registry poisoned");
        if let Some(current) = sessions.get(&resume_id) {
            if current.same_token(token) {
                sessions.remove(&resume_id);
            }
        }
    }
}
