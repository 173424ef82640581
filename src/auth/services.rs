use std::net::SocketAddr;

use axum::http::HeaderMap;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::{AuthResponse, PublicUser, UserProfile},
    jwt::JwtKeys,
    password::{hash_new_password, verify_password},
    repo::{record_login, User},
};
use crate::{applications::services::is_own_resume, errors::AppError, state::AppState};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[A-Za-z0-9+_.-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,6}$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// First `X-Forwarded-For` hop, else the peer address.
pub(crate) fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|p| p.ip().to_string()))
        .unwrap_or_else(|| "unknown".into())
}

fn issue_pair(keys: &JwtKeys, user: User) -> Result<AuthResponse, AppError> {
    let access_token = keys.sign_access(user.id)?;
    let refresh_token = keys.sign_refresh(user.id)?;
    Ok(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser::from(user),
    })
}

pub async fn register(
    state: &AppState,
    email: &str,
    name: &str,
    password: &str,
) -> Result<AuthResponse, AppError> {
    let email = normalize_email(email);
    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(AppError::invalid("invalid email format"));
    }
    let hash = hash_new_password(password)?;

    if User::find_by_email(&state.db, &email).await?.is_some() {
        warn!(%email, "email already registered");
        return Err(AppError::conflict("email already registered"));
    }

    let user = User::create(&state.db, &email, name.trim(), &hash)
        .await?
        // lost a race with a concurrent registration
        .ok_or_else(|| AppError::conflict("email already registered"))?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    issue_pair(&JwtKeys::from(&state.config.jwt), user)
}

pub async fn login(
    state: &AppState,
    email: &str,
    password: &str,
    ip_address: &str,
) -> Result<AuthResponse, AppError> {
    let email = normalize_email(email);
    let user = match User::find_by_email(&state.db, &email).await? {
        Some(u) => u,
        None => {
            warn!(%email, "login unknown email");
            return Err(AppError::unauthorized("invalid credentials"));
        }
    };

    if !verify_password(password, &user.password_hash)? {
        warn!(%email, user_id = %user.id, "login invalid password");
        return Err(AppError::unauthorized("invalid credentials"));
    }

    record_login(&state.db, user.id, ip_address).await?;
    info!(user_id = %user.id, ip = ip_address, "user logged in");
    issue_pair(&JwtKeys::from(&state.config.jwt), user)
}

/// Exchanges a refresh token for a fresh access token.
pub async fn refresh(state: &AppState, refresh_token: &str) -> Result<String, AppError> {
    let keys = JwtKeys::from(&state.config.jwt);
    let claims = keys.verify_refresh(refresh_token)?;

    User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| AppError::unauthorized("user not found"))?;

    Ok(keys.sign_access(claims.sub)?)
}

pub async fn profile(state: &AppState, user_id: Uuid) -> Result<UserProfile, AppError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::unauthorized("user not found"))?;
    let skills = User::skills(&state.db, user_id).await?;

    Ok(UserProfile {
        id: user.id,
        email: user.email,
        name: user.name,
        role: user.role,
        skills: skills.into_iter().map(Into::into).collect(),
    })
}

pub async fn update_profile(
    state: &AppState,
    user_id: Uuid,
    name: &str,
    password: Option<&str>,
) -> Result<PublicUser, AppError> {
    let new_hash = match password.filter(|p| !p.is_empty()) {
        Some(p) => Some(hash_new_password(p)?),
        None => None,
    };

    let user = User::update_profile(&state.db, user_id, name.trim(), new_hash.as_deref())
        .await?
        .ok_or_else(|| AppError::unauthorized("user not found"))?;

    info!(%user_id, password_changed = new_hash.is_some(), "profile updated");
    Ok(PublicUser::from(user))
}

/// Attachment paths that point at the user's own uploads. Anything else is left alone.
fn own_resume_keys(user_id: Uuid, paths: Vec<String>) -> Vec<String> {
    paths
        .into_iter()
        .filter(|k| is_own_resume(user_id, k))
        .collect()
}

pub async fn delete_account(state: &AppState, user_id: Uuid) -> Result<(), AppError> {
    let resume_keys = User::attachment_paths(&state.db, user_id).await?;

    if !User::delete(&state.db, user_id).await? {
        return Err(AppError::unauthorized("user not found"));
    }

    let stored = own_resume_keys(user_id, resume_keys);
    if let Err(e) = state.storage.delete_objects(&stored).await {
        warn!(error = ?e, %user_id, objects = stored.len(), "failed to remove resume objects");
    }

    info!(%user_id, "account deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("someone@example.com"));
        assert!(is_valid_email("first.last+tag@sub.example.co"));
        assert!(!is_valid_email("no-at-sign.example.com"));
        assert!(!is_valid_email("two@@example.com"));
        assert!(!is_valid_email("user@example"));
        assert!(!is_valid_email("user@example.toolongtld"));
        assert!(!is_valid_email("spaces in@example.com"));
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Mixed.Case@Example.COM "), "mixed.case@example.com");
    }

    #[test]
    fn client_ip_prefers_forwarded_header() {
        let peer: SocketAddr = "10.0.0.9:5555".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, Some(peer)), "10.0.0.9");
        assert_eq!(client_ip(&headers, None), "unknown");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_ip(&headers, Some(peer)), "203.0.113.7");
    }

    #[tokio::test]
    async fn register_validates_before_touching_the_database() {
        let state = AppState::fake();
        let err = register(&state, "not-an-email", "n", "longenough").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
        let err = register(&state, "a@b.com", "n", "short").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn refresh_rejects_access_tokens_without_db() {
        let state = AppState::fake();
        let keys = JwtKeys::from(&state.config.jwt);
        let access = keys.sign_access(Uuid::new_v4()).unwrap();
        let err = refresh(&state, &access).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn only_own_uploads_are_scheduled_for_removal() {
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();
        let paths = vec![
            format!("resumes/{user}/a.pdf"),
            format!("resumes/{other}/b.pdf"),
            "C:\\docs\\cv.docx".to_string(),
        ];
        assert_eq!(own_resume_keys(user, paths), vec![format!("resumes/{user}/a.pdf")]);
    }

    #[tokio::test]
    async fn deleting_an_account_keeps_other_users_resumes() {
        use crate::state::test_support::{seed_user, state_with, test_db, MemoryStorage};
        use crate::storage::StorageClient;
        use std::sync::Arc;

        let Some(db) = test_db().await else { return };
        let storage = Arc::new(MemoryStorage::default());
        let state = state_with(db.clone(), storage.clone());
        let owner = seed_user(&db).await;
        let leaver = seed_user(&db).await;

        let foreign = format!("resumes/{owner}/{}.pdf", Uuid::new_v4());
        let own = format!("resumes/{leaver}/{}.pdf", Uuid::new_v4());
        for key in [&foreign, &own] {
            storage
                .put_object(key, bytes::Bytes::from_static(b"%PDF"), "application/pdf")
                .await
                .unwrap();
        }
        for key in [&foreign, &own] {
            sqlx::query(
                "INSERT INTO file_attachments (user_id, file_name, file_path) VALUES ($1, 'cv.pdf', $2)",
            )
            .bind(leaver)
            .bind(key)
            .execute(&db)
            .await
            .unwrap();
        }

        delete_account(&state, leaver).await.unwrap();

        let objects = storage.objects.lock().unwrap();
        assert!(objects.contains_key(&foreign));
        assert!(!objects.contains_key(&own));
    }
}
