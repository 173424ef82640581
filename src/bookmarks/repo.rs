use anyhow::Context;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::pagination::PageRequest;

#[derive(Debug, Clone, FromRow)]
pub struct BookmarkRow {
    pub id: Uuid,
    pub job_posting_id: Uuid,
    pub job_title: String,
    pub created_at: OffsetDateTime,
}

pub const BOOKMARK_SORT_COLUMNS: &[(&str, &str)] = &[
    ("created_at", "b.created_at"),
    ("job_title", "j.title"),
];

/// Removes the bookmark if present. Returns whether a row was deleted.
pub async fn delete_bookmark(db: &PgPool, user_id: Uuid, job_id: Uuid) -> anyhow::Result<bool> {
    let res = sqlx::query("DELETE FROM bookmarks WHERE user_id = $1 AND job_posting_id = $2")
        .bind(user_id)
        .bind(job_id)
        .execute(db)
        .await
        .context("delete bookmark")?;
    Ok(res.rows_affected() > 0)
}

pub async fn insert_bookmark(db: &PgPool, user_id: Uuid, job_id: Uuid) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO bookmarks (user_id, job_posting_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id, job_posting_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(job_id)
    .execute(db)
    .await
    .context("insert bookmark")?;
    Ok(())
}

pub async fn list_by_user(
    db: &PgPool,
    user_id: Uuid,
    page: &PageRequest,
) -> anyhow::Result<(Vec<BookmarkRow>, i64)> {
    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bookmarks WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(db)
        .await
        .context("count bookmarks")?;

    // order_by() only yields whitelisted column names
    let rows = sqlx::query_as::<_, BookmarkRow>(&format!(
        r#"
        SELECT b.id, b.job_posting_id, j.title AS job_title, b.created_at
          FROM bookmarks b
          JOIN job_postings j ON j.id = b.job_posting_id
         WHERE b.user_id = $1
         ORDER BY {}, b.id ASC
         LIMIT $2 OFFSET $3
        "#,
        page.order_by()
    ))
    .bind(user_id)
    .bind(page.size)
    .bind(page.offset())
    .fetch_all(db)
    .await
    .context("list bookmarks")?;

    Ok((rows, total))
}
