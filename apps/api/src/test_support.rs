//! In-memory trait doubles shared across unit tests. These stand in for
//! Postgres, S3 and the scoring workflow so the orchestration logic can be
//! exercised hermetically.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::AppError;
use crate::matching::cancel::CancelToken;
use crate::matching::store::MatchStore;
use crate::models::match_result::{
    AdviceItem, DetailsData, MatchResultRow, MatchSummary, NewMatchResult, ResultType, ScoringData,
};
use crate::models::resume::ResumeRow;
use crate::resumes::store::ResumeStore;
use crate::scoring_client::{JobForScoring, ScoringClient, ScoringError};
use crate::storage::BlobStore;

pub fn job(id: &str) -> JobForScoring {
    JobForScoring {
        id: id.to_string(),
        description: format!("description of {id}"),
    }
}

pub fn summary(job_id: &str, overall: f64) -> MatchSummary {
    let mut scores = BTreeMap::new();
    for dim in ["skills", "experience", "projects", "education", "soft"] {
        scores.insert(dim.to_string(), overall);
    }
    MatchSummary {
        job_id: job_id.to_string(),
        overall,
        scores,
    }
}

pub fn scoring_data(overall: f64) -> ScoringData {
    let s = summary("_", overall);
    ScoringData {
        overall,
        scores: s.scores,
    }
}

pub fn details_data() -> DetailsData {
    DetailsData {
        advantages: vec!["strong Rust background".to_string()],
        disadvantages: vec!["no fintech exposure".to_string()],
        advice: vec![AdviceItem {
            title: "Lead with systems work".to_string(),
            detail: "Walk through the caching project first.".to_string(),
        }],
        overview: "Good overall fit.".to_string(),
    }
}

pub fn upstream_error() -> ScoringError {
    ScoringError::Upstream {
        status: 500,
        body: "boom".to_string(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scoring client double — scripted responses, consumed in call order
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct TestScoringClient {
    batch_script: Mutex<VecDeque<Result<Vec<MatchSummary>, ScoringError>>>,
    pub batch_calls: AtomicUsize,
    cancel_on_batch_call: Mutex<Option<(usize, CancelToken)>>,
    single_script: Mutex<VecDeque<Result<ScoringData, ScoringError>>>,
    pub single_calls: AtomicUsize,
    details_script: Mutex<VecDeque<Result<DetailsData, ScoringError>>>,
    pub details_calls: AtomicUsize,
    /// The `overall` argument of the most recent details call.
    pub last_details_overall: Mutex<Option<f64>>,
}

impl TestScoringClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_batch(&self, result: Result<Vec<MatchSummary>, ScoringError>) {
        self.batch_script.lock().unwrap().push_back(result);
    }

    pub fn push_single(&self, result: Result<ScoringData, ScoringError>) {
        self.single_script.lock().unwrap().push_back(result);
    }

    pub fn push_details(&self, result: Result<DetailsData, ScoringError>) {
        self.details_script.lock().unwrap().push_back(result);
    }

    /// Trips `token` as a side effect of batch call number `call` (1-based),
    /// simulating a cancellation racing an in-flight run.
    pub fn cancel_on_batch_call(&self, call: usize, token: CancelToken) {
        *self.cancel_on_batch_call.lock().unwrap() = Some((call, token));
    }
}

#[async_trait]
impl ScoringClient for TestScoringClient {
    async fn score_batch(
        &self,
        _resume_text: &str,
        _jobs: &[JobForScoring],
    ) -> Result<Vec<MatchSummary>, ScoringError> {
        let call = self.batch_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((at, token)) = &*self.cancel_on_batch_call.lock().unwrap() {
            if call == *at {
                token.cancel();
            }
        }
        self.batch_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unscripted score_batch call #{call}"))
    }

    async fn score_single(
        &self,
        _resume_text: &str,
        _job_id: &str,
        _job_description: &str,
    ) -> Result<ScoringData, ScoringError> {
        let call = self.single_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.single_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unscripted score_single call #{call}"))
    }

    async fn job_details(
        &self,
        _resume_text: &str,
        _job_id: &str,
        _job_description: &str,
        overall: f64,
    ) -> Result<DetailsData, ScoringError> {
        let call = self.details_calls.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_details_overall.lock().unwrap() = Some(overall);
        self.details_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unscripted job_details call #{call}"))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Match store double
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryMatchStore {
    rows: Mutex<Vec<MatchResultRow>>,
    seq: AtomicUsize,
    pub lookups: AtomicUsize,
    fail_inserts: AtomicUsize,
}

impl InMemoryMatchStore {
    /// Directly plants a row, bypassing conflict handling. Returns it.
    pub fn seed(
        &self,
        resume_id: Uuid,
        job_id: &str,
        result_type: ResultType,
        version: &str,
        data: Value,
    ) -> MatchResultRow {
        let row = self.make_row(resume_id, job_id, "h1", "cache", result_type.as_str(), version, data);
        self.rows.lock().unwrap().push(row.clone());
        row
    }

    /// Makes every subsequent insert fail with a storage error.
    pub fn fail_all_inserts(&self) {
        self.fail_inserts.store(usize::MAX, Ordering::SeqCst);
    }

    pub fn rows(&self) -> Vec<MatchResultRow> {
        self.rows.lock().unwrap().clone()
    }

    #[allow(clippy::too_many_arguments)]
    fn make_row(
        &self,
        resume_id: Uuid,
        job_id: &str,
        resume_hash: &str,
        source: &str,
        result_type: &str,
        version: &str,
        data: Value,
    ) -> MatchResultRow {
        // Strictly increasing timestamps so "most recent wins" is decidable.
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) as i64;
        MatchResultRow {
            id: Uuid::new_v4(),
            resume_id,
            job_id: job_id.to_string(),
            resume_hash: resume_hash.to_string(),
            source: source.to_string(),
            version: version.to_string(),
            result_type: result_type.to_string(),
            data,
            created_at: Utc::now() + Duration::seconds(seq),
        }
    }
}

#[async_trait]
impl MatchStore for InMemoryMatchStore {
    async fn latest(
        &self,
        resume_id: Uuid,
        job_id: &str,
        result_type: ResultType,
        version: &str,
    ) -> Result<Option<MatchResultRow>, AppError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| {
                r.resume_id == resume_id
                    && r.job_id == job_id
                    && r.result_type == result_type.as_str()
                    && r.version == version
            })
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn insert(
        &self,
        new: &NewMatchResult,
        version: &str,
    ) -> Result<Option<MatchResultRow>, AppError> {
        if self.fail_inserts.load(Ordering::SeqCst) > 0 {
            return Err(AppError::Storage("insert disabled by test".to_string()));
        }
        let mut rows = self.rows.lock().unwrap();
        let conflict = rows.iter().any(|r| {
            r.resume_id == new.resume_id
                && r.job_id == new.job_id
                && r.result_type == new.result_type.as_str()
                && r.version == version
        });
        if conflict {
            return Ok(None);
        }
        let row = self.make_row(
            new.resume_id,
            &new.job_id,
            &new.resume_hash,
            new.source.as_str(),
            new.result_type.as_str(),
            version,
            new.data.clone(),
        );
        rows.push(row.clone());
        Ok(Some(row))
    }

    async fn scored_summaries(
        &self,
        resume_id: Uuid,
        version: &str,
    ) -> Result<Vec<MatchSummary>, AppError> {
        let rows = self.rows.lock().unwrap();
        let mut summaries = Vec::new();
        for row in rows.iter() {
            if row.resume_id != resume_id
                || row.result_type != ResultType::Scoring.as_str()
                || row.version != version
            {
                continue;
            }
            if summaries.iter().any(|s: &MatchSummary| s.job_id == row.job_id) {
                continue;
            }
            if let Ok(data) = serde_json::from_value::<ScoringData>(row.data.clone()) {
                summaries.push(MatchSummary {
                    job_id: row.job_id.clone(),
                    overall: data.overall,
                    scores: data.scores,
                });
            }
        }
        Ok(summaries)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Resume store double
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryResumeStore {
    rows: Mutex<Vec<ResumeRow>>,
    hidden_hash_finds: AtomicUsize,
    forced_conflicts: AtomicUsize,
}

impl InMemoryResumeStore {
    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    /// Plants a ready-made resume with stored text key for resolver tests.
    pub fn seed(&self, resume_hash: &str, storage_key: Option<&str>) -> ResumeRow {
        let row = ResumeRow {
            id: Uuid::new_v4(),
            resume_hash: resume_hash.to_string(),
            storage_key: storage_key.map(str::to_string),
            created_at: Utc::now(),
        };
        self.rows.lock().unwrap().push(row.clone());
        row
    }

    /// Makes the next `find_by_hash` miss, simulating the window where a
    /// concurrent writer has not committed yet.
    pub fn hide_from_prefetch_once(&self) {
        self.hidden_hash_finds.fetch_add(1, Ordering::SeqCst);
    }

    /// Makes the next insert report a unique-constraint conflict.
    pub fn force_conflict_once(&self) {
        self.forced_conflicts.fetch_add(1, Ordering::SeqCst);
    }

    fn take(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ResumeStore for InMemoryResumeStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ResumeRow>, AppError> {
        Ok(self.rows.lock().unwrap().iter().find(|r| r.id == id).cloned())
    }

    async fn find_by_hash(&self, resume_hash: &str) -> Result<Option<ResumeRow>, AppError> {
        if Self::take(&self.hidden_hash_finds) {
            return Ok(None);
        }
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.resume_hash == resume_hash)
            .cloned())
    }

    async fn insert(&self, id: Uuid, resume_hash: &str) -> Result<Option<ResumeRow>, AppError> {
        if Self::take(&self.forced_conflicts) {
            return Ok(None);
        }
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|r| r.resume_hash == resume_hash) {
            return Ok(None);
        }
        let row = ResumeRow {
            id,
            resume_hash: resume_hash.to_string(),
            storage_key: None,
            created_at: Utc::now(),
        };
        rows.push(row.clone());
        Ok(Some(row))
    }

    async fn set_storage_key(&self, id: Uuid, storage_key: &str) -> Result<(), AppError> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|r| r.id == id) {
            row.storage_key = Some(storage_key.to_string());
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        self.rows.lock().unwrap().retain(|r| r.id != id);
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Blob store double
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: Mutex<HashMap<String, String>>,
    fail_puts: bool,
}

impl InMemoryBlobStore {
    /// A store whose writes always fail, for rollback tests.
    pub fn failing() -> Self {
        Self {
            blobs: Mutex::new(HashMap::new()),
            fail_puts: true,
        }
    }

    pub fn blob_count(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }

    pub fn put(&self, key: &str, body: &str) {
        self.blobs
            .lock()
            .unwrap()
            .insert(key.to_string(), body.to_string());
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put_text(&self, key: &str, body: String) -> Result<(), AppError> {
        if self.fail_puts {
            return Err(AppError::Storage("blob store offline".to_string()));
        }
        self.blobs.lock().unwrap().insert(key.to_string(), body);
        Ok(())
    }

    async fn get_text(&self, key: &str) -> Result<String, AppError> {
        self.blobs
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| AppError::Storage(format!("no blob at {key}")))
    }
}
