use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::ResumeRow;
use crate::resumes::ingest::create_resume;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateResumeRequest {
    pub resume_text: String,
}

#[derive(Debug, Serialize)]
pub struct CreateResumeResponse {
    pub resume_id: Uuid,
    pub resume_hash: String,
    pub created: bool,
}

/// POST /api/v1/resumes — pasted resume text.
pub async fn handle_create_resume(
    State(state): State<AppState>,
    Json(req): Json<CreateResumeRequest>,
) -> Result<Json<CreateResumeResponse>, AppError> {
    let created = create_resume(
        state.resumes.as_ref(),
        state.blobs.as_ref(),
        &req.resume_text,
    )
    .await?;
    Ok(Json(CreateResumeResponse {
        resume_id: created.resume.id,
        resume_hash: created.resume.resume_hash,
        created: created.created,
    }))
}

/// POST /api/v1/resumes/upload — multipart PDF upload (field `file`).
/// Text extraction failures are the uploader's problem, not a server error.
pub async fn handle_upload_resume(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<CreateResumeResponse>, AppError> {
    let mut pdf_bytes: Option<Vec<u8>> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("invalid multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("could not read upload: {e}")))?;
            pdf_bytes = Some(bytes.to_vec());
            break;
        }
    }
    let pdf_bytes =
        pdf_bytes.ok_or_else(|| AppError::Validation("missing 'file' field".to_string()))?;

    let text = pdf_extract::extract_text_from_mem(&pdf_bytes)
        .map_err(|e| AppError::Validation(format!("could not extract text from PDF: {e}")))?;

    let created = create_resume(state.resumes.as_ref(), state.blobs.as_ref(), &text).await?;
    Ok(Json(CreateResumeResponse {
        resume_id: created.resume.id,
        resume_hash: created.resume.resume_hash,
        created: created.created,
    }))
}

#[derive(Debug, Serialize)]
pub struct ResumeResponse {
    #[serde(flatten)]
    pub resume: ResumeRow,
    pub resume_text: Option<String>,
}

/// GET /api/v1/resumes/:id — row plus the stored text.
pub async fn handle_get_resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResumeResponse>, AppError> {
    let resume = state
        .resumes
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))?;

    let resume_text = match &resume.storage_key {
        Some(key) => Some(state.blobs.get_text(key).await?),
        None => None,
    };

    Ok(Json(ResumeResponse {
        resume,
        resume_text,
    }))
}
