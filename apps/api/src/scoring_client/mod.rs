//! Scoring client — the single point of entry for all calls to the external
//! match-scoring workflow (a Dify-hosted LLM workflow).
//!
//! ARCHITECTURAL RULE: no other module may call the workflow endpoint
//! directly. All scoring interactions go through the `ScoringClient` trait,
//! which also gives tests a seam for doubles — there is no dev-mode branch
//! inside business logic.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::config::MatchConfig;
use crate::models::match_result::{DetailsData, MatchSummary, ScoringData};

/// Workflows are always invoked in blocking mode — no streaming.
const RESPONSE_MODE: &str = "blocking";
/// Caller label sent as the workflow `user` field.
const CALLER_LABEL: &str = "resumatch-api";

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Scoring call timed out")]
    Timeout,

    #[error("Workflow endpoint returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Workflow reported failure: {0}")]
    Workflow(String),

    #[error("Malformed workflow output: {0}")]
    Parse(String),

    #[error("{hint}")]
    Empty { hint: String },
}

impl ScoringError {
    /// Whether the retry wrapper may re-attempt after this error.
    /// Empty output and malformed payloads will not improve on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScoringError::Http(_)
                | ScoringError::Timeout
                | ScoringError::Upstream { .. }
                | ScoringError::Workflow(_)
        )
    }
}

/// A job as presented to the scoring workflow: id plus the flattened
/// description text (see `JobRow::scoring_text`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobForScoring {
    #[serde(rename = "job_id")]
    pub id: String,
    #[serde(rename = "job_description")]
    pub description: String,
}

/// The external scoring workflow, seen through its contract only.
#[async_trait]
pub trait ScoringClient: Send + Sync {
    /// Scores a chunk of jobs against one resume in a single workflow call.
    async fn score_batch(
        &self,
        resume_text: &str,
        jobs: &[JobForScoring],
    ) -> Result<Vec<MatchSummary>, ScoringError>;

    /// Scores one job (the heavier single-job prompt variant).
    async fn score_single(
        &self,
        resume_text: &str,
        job_id: &str,
        job_description: &str,
    ) -> Result<ScoringData, ScoringError>;

    /// Produces the qualitative report for one job. Takes the overall score
    /// from the scoring phase — the workflow calibrates its advice on it.
    async fn job_details(
        &self,
        resume_text: &str,
        job_id: &str,
        job_description: &str,
        overall: f64,
    ) -> Result<DetailsData, ScoringError>;
}

#[derive(Debug, Deserialize)]
struct WorkflowResponse {
    data: WorkflowData,
}

#[derive(Debug, Deserialize)]
struct WorkflowData {
    status: String,
    #[serde(default)]
    outputs: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Production `ScoringClient` talking to a Dify workflow endpoint over HTTP
/// with bearer auth.
pub struct DifyWorkflowClient {
    http: Client,
    workflow_url: String,
    api_key: String,
    batch_timeout: Duration,
    single_timeout: Duration,
}

impl DifyWorkflowClient {
    pub fn new(workflow_url: String, api_key: String, matching: &MatchConfig) -> Self {
        Self {
            http: Client::builder()
                .build()
                .expect("Failed to build HTTP client"),
            workflow_url,
            api_key,
            batch_timeout: Duration::from_secs(matching.batch_timeout_secs),
            single_timeout: Duration::from_secs(matching.single_timeout_secs),
        }
    }

    /// One blocking workflow invocation. Returns the `data.outputs` object.
    async fn invoke(&self, inputs: Value, timeout: Duration) -> Result<Value, ScoringError> {
        let body = json!({
            "inputs": inputs,
            "response_mode": RESPONSE_MODE,
            "user": CALLER_LABEL,
        });

        let response = self
            .http
            .post(&self.workflow_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .timeout(timeout)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScoringError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: WorkflowResponse = response
            .json()
            .await
            .map_err(classify_transport_error)?;

        debug!("Workflow call finished with status '{}'", parsed.data.status);
        extract_outputs(parsed)
    }
}

fn classify_transport_error(err: reqwest::Error) -> ScoringError {
    if err.is_timeout() {
        ScoringError::Timeout
    } else {
        ScoringError::Http(err)
    }
}

/// Unwraps a 2xx workflow response: the workflow's own status must be
/// "succeeded" and outputs must be present.
fn extract_outputs(response: WorkflowResponse) -> Result<Value, ScoringError> {
    if response.data.status != "succeeded" {
        return Err(ScoringError::Workflow(
            response
                .data
                .error
                .unwrap_or_else(|| format!("workflow status was '{}'", response.data.status)),
        ));
    }
    response
        .data
        .outputs
        .ok_or_else(|| ScoringError::Parse("missing data.outputs".to_string()))
}

fn parse_batch_results(outputs: Value) -> Result<Vec<MatchSummary>, ScoringError> {
    let results = outputs
        .get("match_results")
        .cloned()
        .ok_or_else(|| ScoringError::Parse("missing outputs.match_results".to_string()))?;
    serde_json::from_value(results).map_err(|e| ScoringError::Parse(e.to_string()))
}

#[async_trait]
impl ScoringClient for DifyWorkflowClient {
    async fn score_batch(
        &self,
        resume_text: &str,
        jobs: &[JobForScoring],
    ) -> Result<Vec<MatchSummary>, ScoringError> {
        let job_list_json =
            serde_json::to_string(jobs).map_err(|e| ScoringError::Parse(e.to_string()))?;
        let inputs = json!({
            "resume_text": resume_text,
            "job_list_json": job_list_json,
        });
        let outputs = self.invoke(inputs, self.batch_timeout).await?;
        parse_batch_results(outputs)
    }

    async fn score_single(
        &self,
        resume_text: &str,
        job_id: &str,
        job_description: &str,
    ) -> Result<ScoringData, ScoringError> {
        let inputs = json!({
            "resume_text": resume_text,
            "job_id": job_id,
            "job_description": job_description,
        });
        let outputs = self.invoke(inputs, self.single_timeout).await?;
        serde_json::from_value(outputs).map_err(|e| ScoringError::Parse(e.to_string()))
    }

    async fn job_details(
        &self,
        resume_text: &str,
        job_id: &str,
        job_description: &str,
        overall: f64,
    ) -> Result<DetailsData, ScoringError> {
        let inputs = json!({
            "resume_text": resume_text,
            "job_id": job_id,
            "job_description": job_description,
            "overall_score": overall,
        });
        let outputs = self.invoke(inputs, self.single_timeout).await?;
        serde_json::from_value(outputs).map_err(|e| ScoringError::Parse(e.to_string()))
    }
}
