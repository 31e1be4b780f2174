// Job listing reads — conventional glue around the jobs table. The one
// interesting bit is the scoring-text projection on JobRow, which is what
// the matching endpoints expect as `job_description`.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::errors::AppError;
use crate::models::job::JobRow;
use crate::state::AppState;

const LISTING_LIMIT: i64 = 50;

#[derive(Debug, Serialize)]
pub struct JobListing {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub salary_range: Option<String>,
    /// Flattened posting text, ready to pass to the matching endpoints.
    pub job_description: String,
}

impl From<JobRow> for JobListing {
    fn from(row: JobRow) -> Self {
        let job_description = row.scoring_text();
        JobListing {
            id: row.id,
            title: row.title,
            company: row.company,
            location: row.location,
            salary_range: row.salary_range,
            job_description,
        }
    }
}

/// GET /api/v1/jobs — recent postings.
pub async fn handle_list_jobs(
    State(state): State<AppState>,
) -> Result<Json<Vec<JobListing>>, AppError> {
    let rows = sqlx::query_as::<_, JobRow>(
        "SELECT * FROM jobs ORDER BY created_at DESC LIMIT $1",
    )
    .bind(LISTING_LIMIT)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(rows.into_iter().map(JobListing::from).collect()))
}
