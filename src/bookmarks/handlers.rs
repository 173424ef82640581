use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{BookmarkDto, ToggleResponse},
    services,
};
use crate::{
    auth::AuthUser,
    errors::AppError,
    pagination::{Page, PageParams},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/bookmarks", get(list_bookmarks))
        .route("/bookmarks/:job_posting_id", post(toggle_bookmark))
}

#[instrument(skip(state))]
pub async fn toggle_bookmark(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(job_posting_id): Path<Uuid>,
) -> Result<Json<ToggleResponse>, AppError> {
    let outcome = services::toggle(&state, user_id, job_posting_id).await?;
    Ok(Json(ToggleResponse {
        job_posting_id,
        outcome,
        bookmarked: outcome.bookmarked(),
        message: outcome.message(),
    }))
}

#[instrument(skip(state))]
pub async fn list_bookmarks(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<BookmarkDto>>, AppError> {
    Ok(Json(services::list(&state, user_id, &params).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::{Request, StatusCode}};
    use tower::ServiceExt;

    #[tokio::test]
    async fn toggle_requires_authentication() {
        let app = routes().with_state(AppState::fake());
        let uri = format!("/bookmarks/{}", Uuid::new_v4());
        let res = app
            .oneshot(Request::post(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
