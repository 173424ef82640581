use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub role: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub struct UserSkillRow {
    pub skill_id: Uuid,
    pub skill_name: String,
    pub proficiency_level: String,
    pub acquired_at: OffsetDateTime,
}

const USER_COLUMNS: &str = "id, email, name, password_hash, role, created_at";

impl User {
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    /// Inserts a user. Returns `None` when the email is already taken.
    pub async fn create(
        db: &PgPool,
        email: &str,
        name: &str,
        password_hash: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, name, password_hash)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(name)
        .bind(password_hash)
        .fetch_optional(db)
        .await
        .context("insert user")?;
        Ok(user)
    }

    /// Updates the name and, when given, the password hash.
    pub async fn update_profile(
        db: &PgPool,
        id: Uuid,
        name: &str,
        password_hash: Option<&str>,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET name = $2,
                   password_hash = COALESCE($3, password_hash)
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(name)
        .bind(password_hash)
        .fetch_optional(db)
        .await
        .context("update user profile")?;
        Ok(user)
    }

    /// Deletes the user; owned rows go with it via ON DELETE CASCADE.
    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(db)
            .await
            .context("delete user")?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn skills(db: &PgPool, id: Uuid) -> anyhow::Result<Vec<UserSkillRow>> {
        let rows = sqlx::query_as::<_, UserSkillRow>(
            r#"
            SELECT s.id AS skill_id, s.name AS skill_name,
                   us.proficiency_level, us.acquired_at
              FROM user_skills us
              JOIN skills s ON s.id = us.skill_id
             WHERE us.user_id = $1
             ORDER BY us.acquired_at ASC, s.name ASC
            "#,
        )
        .bind(id)
        .fetch_all(db)
        .await
        .context("list user skills")?;
        Ok(rows)
    }

    /// Storage keys of every resume the user attached.
    pub async fn attachment_paths(db: &PgPool, id: Uuid) -> anyhow::Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT file_path FROM file_attachments WHERE user_id = $1",
        )
        .bind(id)
        .fetch_all(db)
        .await
        .context("list attachment paths")?;
        Ok(rows.into_iter().map(|(p,)| p).collect())
    }
}

pub async fn record_login(db: &PgPool, user_id: Uuid, ip_address: &str) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO login_history (user_id, ip_address, login_time)
        VALUES ($1, $2, now())
        "#,
    )
    .bind(user_id)
    .bind(ip_address)
    .execute(db)
    .await
    .context("insert login history")?;
    Ok(())
}
