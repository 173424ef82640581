use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::Redirect,
    routing::{delete, get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{ApplicationDto, ApplyRequest, ApplyResponse, ListApplicationsQuery, UploadedResume},
    services::{self, MAX_RESUME_BYTES},
};
use crate::{auth::AuthUser, errors::AppError, pagination::MessageResponse, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/applications", post(apply).get(list_applications))
        .route("/applications/:id", delete(cancel_application))
        .route("/applications/:id/resume", get(get_resume))
}

pub fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/applications/resume", post(upload_resume))
        // multipart framing on top of the file itself
        .layer(DefaultBodyLimit::max(MAX_RESUME_BYTES + 64 * 1024))
}

#[instrument(skip(state, req))]
pub async fn apply(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(req): Json<ApplyRequest>,
) -> Result<(StatusCode, Json<ApplyResponse>), AppError> {
    let res = services::apply(
        &state,
        user_id,
        req.job_id,
        req.resume_path.as_deref(),
        req.proficiency_level,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(res)))
}

#[instrument(skip(state))]
pub async fn list_applications(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<ListApplicationsQuery>,
) -> Result<Json<Vec<ApplicationDto>>, AppError> {
    Ok(Json(services::list(&state, user_id, &q).await?))
}

#[instrument(skip(state))]
pub async fn cancel_application(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    services::cancel(&state, user_id, id).await?;
    Ok(Json(MessageResponse::new("application cancelled")))
}

/// POST /applications/resume, multipart with a single `file` field
#[instrument(skip(state, mp))]
pub async fn upload_resume(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut mp: Multipart,
) -> Result<(StatusCode, Json<UploadedResume>), AppError> {
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::invalid(format!("malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| "application/octet-stream".into());
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::invalid(format!("could not read upload: {e}")))?;

        let res =
            services::upload_resume(&state, user_id, file_name.as_deref(), &content_type, data)
                .await?;
        return Ok((StatusCode::CREATED, Json(res)));
    }
    Err(AppError::invalid("multipart field 'file' is required"))
}

/// Redirects to a short-lived download link for the application's resume.
#[instrument(skip(state))]
pub async fn get_resume(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Redirect, AppError> {
    let url = services::resume_link(&state, user_id, id).await?;
    Ok(Redirect::temporary(&url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::JwtKeys;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request},
    };
    use tower::ServiceExt;

    fn app() -> Router {
        routes().merge(upload_routes()).with_state(AppState::fake())
    }

    fn bearer() -> String {
        let state = AppState::fake();
        let token = JwtKeys::from(&state.config.jwt)
            .sign_access(Uuid::new_v4())
            .unwrap();
        format!("Bearer {token}")
    }

    #[tokio::test]
    async fn listing_requires_authentication() {
        let res = app()
            .oneshot(Request::get("/applications").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_status_filter_is_bad_request() {
        let res = app()
            .oneshot(
                Request::get("/applications?status=bogus")
                    .header(header::AUTHORIZATION, bearer())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn multipart_upload_stores_resume() {
        let boundary = "X-BOUNDARY";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"cv.pdf\"\r\n\
             Content-Type: application/pdf\r\n\r\n\
             %PDF-1.4 test\r\n\
             --{boundary}--\r\n"
        );
        let res = app()
            .oneshot(
                Request::post("/applications/resume")
                    .header(header::AUTHORIZATION, bearer())
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["file_name"], "cv.pdf");
        assert!(v["resume_path"].as_str().unwrap().ends_with(".pdf"));
    }

    #[tokio::test]
    async fn upload_without_file_field_is_bad_request() {
        let boundary = "X-BOUNDARY";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"note\"\r\n\r\n\
             hello\r\n\
             --{boundary}--\r\n"
        );
        let res = app()
            .oneshot(
                Request::post("/applications/resume")
                    .header(header::AUTHORIZATION, bearer())
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
