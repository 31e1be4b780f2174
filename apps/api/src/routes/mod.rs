pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::jobs;
use crate::matching::handlers as match_handlers;
use crate::resumes::handlers as resume_handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Resume intake
        .route(
            "/api/v1/resumes",
            post(resume_handlers::handle_create_resume),
        )
        .route(
            "/api/v1/resumes/upload",
            post(resume_handlers::handle_upload_resume),
        )
        .route(
            "/api/v1/resumes/:id",
            get(resume_handlers::handle_get_resume),
        )
        // Job listings
        .route("/api/v1/jobs", get(jobs::handle_list_jobs))
        // Batch matching session
        .route(
            "/api/v1/match/batch",
            post(match_handlers::handle_batch_match),
        )
        .route(
            "/api/v1/match/progress/:resume_id",
            get(match_handlers::handle_progress),
        )
        .route(
            "/api/v1/match/cancel/:resume_id",
            post(match_handlers::handle_cancel),
        )
        // Two-phase job detail
        .route("/api/v1/match/score", post(match_handlers::handle_score))
        .route(
            "/api/v1/match/details",
            post(match_handlers::handle_details),
        )
        .route("/api/v1/match/report", post(match_handlers::handle_report))
        .with_state(state)
}
