use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Phase of the match pipeline a result row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultType {
    Scoring,
    Details,
}

impl ResultType {
    pub fn as_str(self) -> &'static str {
        match self {
            ResultType::Scoring => "scoring",
            ResultType::Details => "details",
        }
    }
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance of a match result row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Served from a persisted row or carried over by the caller.
    Cache,
    /// Produced by a single-job workflow call.
    Dify,
    /// Produced by a batch orchestration run.
    Batch,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Cache => "cache",
            Source::Dify => "dify",
            Source::Batch => "batch",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted match result. Identity is the tuple
/// `(resume_id, job_id, result_type, version)`; when duplicates exist the
/// most recent `created_at` is authoritative. Rows are never updated in
/// place — recomputation inserts a new row or is prevented by the cache gate.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MatchResultRow {
    pub id: Uuid,
    pub resume_id: Uuid,
    pub job_id: String,
    pub resume_hash: String,
    pub source: String,
    pub version: String,
    pub result_type: String,
    pub data: Value,
    pub created_at: DateTime<Utc>,
}

/// A match result about to be written. The cache gate stamps the version.
#[derive(Debug, Clone)]
pub struct NewMatchResult {
    pub resume_id: Uuid,
    pub job_id: String,
    pub resume_hash: String,
    pub source: Source,
    pub result_type: ResultType,
    pub data: Value,
}

/// Numeric score output of the scoring phase. The per-dimension map is kept
/// as a map rather than a fixed struct: an empty map is a meaningful signal
/// that the upstream model produced nothing usable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoringData {
    pub overall: f64,
    #[serde(default)]
    pub scores: BTreeMap<String, f64>,
}

/// One scored job as accumulated by the batch orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSummary {
    pub job_id: String,
    pub overall: f64,
    #[serde(default)]
    pub scores: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdviceItem {
    pub title: String,
    pub detail: String,
}

/// Qualitative output of the details phase. All fields default so a sparse
/// upstream payload parses — emptiness is then rejected by validation, not
/// by the deserializer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetailsData {
    #[serde(default)]
    pub advantages: Vec<String>,
    #[serde(default)]
    pub disadvantages: Vec<String>,
    #[serde(default)]
    pub advice: Vec<AdviceItem>,
    #[serde(default)]
    pub overview: String,
}

/// Provenance metadata returned alongside every scoring/details payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeMeta {
    pub job_id: String,
    pub resume_hash: String,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub result_type: String,
}

/// The `{meta, data}` wrapper handed to callers of the single-job endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchEnvelope<T> {
    pub meta: EnvelopeMeta,
    pub data: T,
}

impl<T: DeserializeOwned> MatchEnvelope<T> {
    /// Rehydrates an envelope from a persisted row.
    pub fn from_row(row: &MatchResultRow) -> Result<Self, serde_json::Error> {
        Ok(MatchEnvelope {
            meta: EnvelopeMeta {
                job_id: row.job_id.clone(),
                resume_hash: row.resume_hash.clone(),
                source: row.source.clone(),
                timestamp: row.created_at,
                version: row.version.clone(),
                result_type: row.result_type.clone(),
            },
            data: serde_json::from_value(row.data.clone())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_from_row_carries_meta_and_data() {
        let row = MatchResultRow {
            id: Uuid::new_v4(),
            resume_id: Uuid::new_v4(),
            job_id: "job-1".to_string(),
            resume_hash: "abc".to_string(),
            source: "cache".to_string(),
            version: "v2".to_string(),
            result_type: "scoring".to_string(),
            data: json!({"overall": 72.0, "scores": {"skills": 80.0}}),
            created_at: Utc::now(),
        };
        let env: MatchEnvelope<ScoringData> = MatchEnvelope::from_row(&row).unwrap();
        assert_eq!(env.meta.job_id, "job-1");
        assert_eq!(env.meta.version, "v2");
        assert_eq!(env.data.overall, 72.0);
        assert_eq!(env.data.scores.get("skills"), Some(&80.0));
    }

    #[test]
    fn test_details_data_defaults_all_fields() {
        let data: DetailsData = serde_json::from_value(json!({})).unwrap();
        assert!(data.advantages.is_empty());
        assert!(data.disadvantages.is_empty());
        assert!(data.advice.is_empty());
        assert!(data.overview.is_empty());
    }
}
