use anyhow::Context;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use super::model::{ApplicationStatus, ProficiencyLevel};
use crate::pagination::SortDirection;

#[derive(Debug, Clone, FromRow)]
pub struct Application {
    pub id: Uuid,
    pub user_id: Uuid,
    pub job_posting_id: Uuid,
    pub status: String,
    pub resume_path: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Application joined with applicant email and posting title.
#[derive(Debug, Clone, FromRow)]
pub struct ApplicationListRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_email: String,
    pub job_posting_id: Uuid,
    pub job_title: String,
    pub status: String,
    pub resume_path: Option<String>,
    pub created_at: OffsetDateTime,
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Application>> {
    let row = sqlx::query_as::<_, Application>(
        r#"
        SELECT id, user_id, job_posting_id, status, resume_path, created_at
          FROM applications
         WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await
    .context("find application")?;
    Ok(row)
}

pub async fn exists_for_user_job(db: &PgPool, user_id: Uuid, job_id: Uuid) -> anyhow::Result<bool> {
    let found: Option<(Uuid,)> = sqlx::query_as(
        "SELECT id FROM applications WHERE user_id = $1 AND job_posting_id = $2",
    )
    .bind(user_id)
    .bind(job_id)
    .fetch_optional(db)
    .await
    .context("check existing application")?;
    Ok(found.is_some())
}

/// Inserts a pending application. `None` when the user already applied to this posting.
pub async fn insert_application_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    job_id: Uuid,
    resume_path: Option<&str>,
) -> anyhow::Result<Option<Uuid>> {
    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO applications (user_id, job_posting_id, status, resume_path)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id, job_posting_id) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(job_id)
    .bind(ApplicationStatus::Pending.as_str())
    .bind(resume_path)
    .fetch_optional(&mut **tx)
    .await
    .context("insert application")?;
    Ok(row.map(|(id,)| id))
}

pub async fn insert_attachment_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    application_id: Uuid,
    file_name: &str,
    file_path: &str,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO file_attachments (user_id, application_id, file_name, file_path)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(user_id)
    .bind(application_id)
    .bind(file_name)
    .bind(file_path)
    .execute(&mut **tx)
    .await
    .context("insert file attachment")?;
    Ok(())
}

/// Finds or creates the skill and links it to the user unless already linked.
/// Returns true when a new user skill was recorded.
pub async fn link_skill_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    skill_name: &str,
    level: ProficiencyLevel,
) -> anyhow::Result<bool> {
    let (skill_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO skills (name, description)
        VALUES ($1, $1)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(skill_name)
    .fetch_one(&mut **tx)
    .await
    .with_context(|| format!("upsert skill {skill_name}"))?;

    let res = sqlx::query(
        r#"
        INSERT INTO user_skills (user_id, skill_id, proficiency_level, acquired_at)
        VALUES ($1, $2, $3, now())
        ON CONFLICT (user_id, skill_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(skill_id)
    .bind(level.as_str())
    .execute(&mut **tx)
    .await
    .context("insert user skill")?;
    Ok(res.rows_affected() == 1)
}

pub async fn list_by_user(
    db: &PgPool,
    user_id: Uuid,
    status: Option<ApplicationStatus>,
    direction: SortDirection,
) -> anyhow::Result<Vec<ApplicationListRow>> {
    let rows = sqlx::query_as::<_, ApplicationListRow>(&format!(
        r#"
        SELECT a.id, a.user_id, u.email AS user_email, a.job_posting_id,
               j.title AS job_title, a.status, a.resume_path, a.created_at
          FROM applications a
          JOIN users u ON u.id = a.user_id
          JOIN job_postings j ON j.id = a.job_posting_id
         WHERE a.user_id = $1
           AND ($2::text IS NULL OR a.status = $2)
         ORDER BY a.created_at {}, a.id ASC
        "#,
        direction.as_sql()
    ))
    .bind(user_id)
    .bind(status.map(ApplicationStatus::as_str))
    .fetch_all(db)
    .await
    .context("list applications")?;
    Ok(rows)
}

/// Conditional update so a concurrent status change is not overwritten.
pub async fn update_status(
    db: &PgPool,
    id: Uuid,
    from: ApplicationStatus,
    to: ApplicationStatus,
) -> anyhow::Result<bool> {
    let res = sqlx::query("UPDATE applications SET status = $3 WHERE id = $1 AND status = $2")
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(db)
        .await
        .context("update application status")?;
    Ok(res.rows_affected() == 1)
}
