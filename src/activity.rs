use anyhow::Context;
use sqlx::PgPool;
use tracing::{debug, warn};
use uuid::Uuid;

pub async fn insert_activity(
    db: &PgPool,
    user_id: Uuid,
    action_type: &str,
    description: &str,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO user_activity_log (user_id, action_type, description)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(user_id)
    .bind(action_type)
    .bind(description)
    .execute(db)
    .await
    .context("insert user activity")?;
    Ok(())
}

/// Records a user action. Failures are logged and swallowed; the audit trail never fails a request.
pub async fn log_activity(db: &PgPool, user_id: Uuid, action_type: &str, description: &str) {
    match insert_activity(db, user_id, action_type, description).await {
        Ok(()) => debug!(%user_id, action_type, "activity recorded"),
        Err(e) => warn!(error = ?e, %user_id, action_type, "activity log write failed"),
    }
}
