use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{
        AccessTokenResponse, AuthResponse, LoginRequest, PublicUser, RefreshRequest,
        RegisterRequest, UpdateProfileRequest, UserProfile,
    },
    jwt::AuthUser,
    services,
};
use crate::{errors::AppError, pagination::MessageResponse, state::AppState};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/profile", get(get_profile).put(update_profile))
        .route("/auth/delete", delete(delete_account))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let res = services::register(&state, &payload.email, &payload.name, &payload.password).await?;
    Ok((StatusCode::CREATED, Json(res)))
}

#[instrument(skip(state, headers, payload))]
pub async fn login(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let ip = services::client_ip(&headers, peer.map(|ConnectInfo(addr)| addr));
    let res = services::login(&state, &payload.email, &payload.password, &ip).await?;
    Ok(Json(res))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AccessTokenResponse>, AppError> {
    let access_token = services::refresh(&state, &payload.refresh_token).await?;
    Ok(Json(AccessTokenResponse {
        access_token,
        token_type: "Bearer",
    }))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UserProfile>, AppError> {
    Ok(Json(services::profile(&state, user_id).await?))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<PublicUser>, AppError> {
    let user = services::update_profile(
        &state,
        user_id,
        &payload.name,
        payload.password.as_deref(),
    )
    .await?;
    Ok(Json(user))
}

#[instrument(skip(state))]
pub async fn delete_account(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<MessageResponse>, AppError> {
    services::delete_account(&state, user_id).await?;
    Ok(Json(MessageResponse::new("account deleted")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .merge(auth_routes())
            .merge(profile_routes())
            .with_state(AppState::fake())
    }

    #[tokio::test]
    async fn profile_requires_bearer_token() {
        let res = app()
            .oneshot(Request::get("/auth/profile").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn register_rejects_bad_email_with_400() {
        let req = Request::post("/auth/register")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"email":"nope","name":"x","password":"long-enough-pass"}"#,
            ))
            .unwrap();
        let res = app().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn refresh_with_garbage_token_is_unauthorized() {
        let req = Request::post("/auth/refresh")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"refresh_token":"garbage"}"#))
            .unwrap();
        let res = app().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn public_user_serialization_hides_nothing_sensitive() {
        let response = PublicUser {
            id: uuid::Uuid::new_v4(),
            email: "test@example.com".to_string(),
            name: "Tester".to_string(),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(!json.contains("password"));
    }
}
