use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{JobPostingDto, JobSearchQuery},
    services,
};
use crate::{activity::log_activity, auth::AuthUser, errors::AppError, pagination::Page, state::AppState};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/jobs/:id", get(get_job))
        .route("/jobs/:id/related", get(related_jobs))
}

#[instrument(skip(state))]
pub async fn list_jobs(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<JobSearchQuery>,
) -> Result<Json<Page<JobPostingDto>>, AppError> {
    let page = services::search(&state, query).await?;
    log_activity(&state.db, user_id, "GET /jobs", "listed job postings").await;
    Ok(Json(page))
}

#[instrument(skip(state))]
pub async fn get_job(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<JobPostingDto>, AppError> {
    let job = services::detail(&state, id).await?;
    log_activity(
        &state.db,
        user_id,
        &format!("GET /jobs/{id}"),
        &format!("viewed job posting '{}'", job.title),
    )
    .await;
    Ok(Json(job))
}

#[instrument(skip(state))]
pub async fn related_jobs(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<JobPostingDto>>, AppError> {
    let jobs = services::related(&state, id).await?;
    log_activity(
        &state.db,
        user_id,
        &format!("GET /jobs/{id}/related"),
        "viewed related job postings",
    )
    .await;
    Ok(Json(jobs))
}
