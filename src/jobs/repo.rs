use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::pagination::PageRequest;

/// Posting joined with its company name.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobPosting {
    pub id: Uuid,
    pub company_id: Uuid,
    pub company_name: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub salary: String,
    pub experience: String,
    pub employment_type: String,
    pub deadline: String,
    pub education: String,
    pub view_count: i32,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub industry: String,
    pub ceo_name: String,
    pub business_content: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewCompany {
    pub name: String,
    pub address: String,
    pub industry: String,
    pub ceo_name: String,
    pub business_content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewJobPosting {
    pub company_id: Uuid,
    pub title: String,
    pub description: String,
    pub location: String,
    pub salary: String,
    pub experience: String,
    pub employment_type: String,
    pub deadline: String,
    pub education: String,
}

/// Search filters. Each present value is a case-insensitive substring match.
#[derive(Debug, Clone, Default)]
pub struct JobFilters {
    pub location: Option<String>,
    pub experience: Option<String>,
    pub salary: Option<String>,
    pub tech_stack: Option<String>,
    pub keyword: Option<String>,
    pub company_name: Option<String>,
    pub position: Option<String>,
}

pub const JOB_SORT_COLUMNS: &[(&str, &str)] = &[
    ("created_at", "j.created_at"),
    ("title", "j.title"),
    ("view_count", "j.view_count"),
    ("deadline", "j.deadline"),
    ("salary", "j.salary"),
    ("location", "j.location"),
];

const JOB_SELECT: &str = r#"
    SELECT j.id, j.company_id, c.name AS company_name, j.title, j.description,
           j.location, j.salary, j.experience, j.employment_type, j.deadline,
           j.education, j.view_count, j.created_at
      FROM job_postings j
      JOIN companies c ON c.id = j.company_id
"#;

pub(crate) fn like_pattern(raw: &str) -> String {
    let escaped = raw
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn present(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, f: &JobFilters) {
    qb.push(" WHERE TRUE");
    let single: [(&Option<String>, &str); 6] = [
        (&f.location, "j.location"),
        (&f.experience, "j.experience"),
        (&f.salary, "j.salary"),
        (&f.tech_stack, "j.description"),
        (&f.company_name, "c.name"),
        (&f.position, "j.title"),
    ];
    for (value, column) in single {
        if let Some(v) = present(value) {
            qb.push(format!(" AND {column} ILIKE "))
                .push_bind(like_pattern(v))
                .push(" ESCAPE '\\'");
        }
    }
    if let Some(k) = present(&f.keyword) {
        let pat = like_pattern(k);
        qb.push(" AND (j.title ILIKE ")
            .push_bind(pat.clone())
            .push(" ESCAPE '\\' OR j.description ILIKE ")
            .push_bind(pat)
            .push(" ESCAPE '\\')");
    }
}

impl JobPosting {
    pub async fn search(
        db: &PgPool,
        filters: &JobFilters,
        page: &PageRequest,
    ) -> anyhow::Result<(Vec<JobPosting>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM job_postings j JOIN companies c ON c.id = j.company_id",
        );
        push_filters(&mut count, filters);
        let total: i64 = count
            .build_query_scalar::<i64>()
            .fetch_one(db)
            .await
            .context("count job postings")?;

        let mut qb = QueryBuilder::<Postgres>::new(JOB_SELECT);
        push_filters(&mut qb, filters);
        // order_by() only yields whitelisted column names
        qb.push(format!(" ORDER BY {}, j.id ASC", page.order_by()))
            .push(" LIMIT ")
            .push_bind(page.size)
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = qb
            .build_query_as::<JobPosting>()
            .fetch_all(db)
            .await
            .context("search job postings")?;

        Ok((rows, total))
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<JobPosting>> {
        let row = sqlx::query_as::<_, JobPosting>(&format!("{JOB_SELECT} WHERE j.id = $1"))
            .bind(id)
            .fetch_optional(db)
            .await
            .context("find job posting")?;
        Ok(row)
    }

    /// Bumps the view counter and returns the updated posting.
    pub async fn record_view(db: &PgPool, id: Uuid) -> anyhow::Result<Option<JobPosting>> {
        let row = sqlx::query_as::<_, JobPosting>(
            r#"
            WITH bumped AS (
                UPDATE job_postings SET view_count = view_count + 1
                 WHERE id = $1
                RETURNING *
            )
            SELECT j.id, j.company_id, c.name AS company_name, j.title, j.description,
                   j.location, j.salary, j.experience, j.employment_type, j.deadline,
                   j.education, j.view_count, j.created_at
              FROM bumped j
              JOIN companies c ON c.id = j.company_id
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
        .context("record job view")?;
        Ok(row)
    }

    /// Same company, or description containing `keyword` when one is given.
    pub async fn related(
        db: &PgPool,
        exclude_id: Uuid,
        company_id: Uuid,
        keyword: Option<&str>,
        limit: i64,
    ) -> anyhow::Result<Vec<JobPosting>> {
        let pattern = keyword.map(like_pattern);
        let rows = sqlx::query_as::<_, JobPosting>(&format!(
            r#"{JOB_SELECT}
             WHERE j.id <> $1
               AND (j.company_id = $2
                    OR ($3::text IS NOT NULL AND j.description ILIKE $3 ESCAPE '\'))
             ORDER BY j.created_at DESC
             LIMIT $4"#
        ))
        .bind(exclude_id)
        .bind(company_id)
        .bind(pattern)
        .bind(limit)
        .fetch_all(db)
        .await
        .context("related job postings")?;
        Ok(rows)
    }

    pub async fn exists_for_company(
        db: &PgPool,
        title: &str,
        company_id: Uuid,
    ) -> anyhow::Result<bool> {
        let found: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM job_postings WHERE title = $1 AND company_id = $2",
        )
        .bind(title)
        .bind(company_id)
        .fetch_optional(db)
        .await
        .context("check posting exists")?;
        Ok(found.is_some())
    }

    /// Returns false when (title, company) already exists.
    pub async fn insert(db: &PgPool, p: &NewJobPosting) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            INSERT INTO job_postings
                (company_id, title, description, location, salary, experience,
                 employment_type, deadline, education, view_count)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 0)
            ON CONFLICT (title, company_id) DO NOTHING
            "#,
        )
        .bind(p.company_id)
        .bind(&p.title)
        .bind(&p.description)
        .bind(&p.location)
        .bind(&p.salary)
        .bind(&p.experience)
        .bind(&p.employment_type)
        .bind(&p.deadline)
        .bind(&p.education)
        .execute(db)
        .await
        .context("insert job posting")?;
        Ok(res.rows_affected() == 1)
    }
}

impl Company {
    pub async fn find_by_name(db: &PgPool, name: &str) -> anyhow::Result<Option<Company>> {
        let row = sqlx::query_as::<_, Company>(
            r#"
            SELECT id, name, address, industry, ceo_name, business_content, created_at
              FROM companies
             WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(db)
        .await
        .context("find company by name")?;
        Ok(row)
    }

    /// Inserts the company, or resolves the existing row with the same name.
    /// The flag is true only when this call created the row.
    pub async fn insert_or_get(db: &PgPool, c: &NewCompany) -> anyhow::Result<(Uuid, bool)> {
        // xmax is 0 only for a tuple this statement inserted
        let row: (Uuid, bool) = sqlx::query_as(
            r#"
            INSERT INTO companies (name, address, industry, ceo_name, business_content)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, (xmax = 0) AS inserted
            "#,
        )
        .bind(&c.name)
        .bind(&c.address)
        .bind(&c.industry)
        .bind(&c.ceo_name)
        .bind(&c.business_content)
        .fetch_one(db)
        .await
        .context("insert company")?;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(" rust "), "%rust%");
        assert_eq!(like_pattern("100%"), "%100\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
    }

    #[test]
    fn blank_filters_are_ignored() {
        let f = JobFilters {
            location: Some("   ".into()),
            keyword: Some("java".into()),
            ..Default::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM job_postings j");
        push_filters(&mut qb, &f);
        let sql = qb.sql();
        assert!(!sql.contains("j.location"));
        assert!(sql.contains("j.title ILIKE $1"));
        assert!(sql.contains("j.description ILIKE $2"));
    }

    #[test]
    fn every_filter_adds_one_clause() {
        let f = JobFilters {
            location: Some("Seoul".into()),
            experience: Some("신입".into()),
            salary: Some("3000".into()),
            tech_stack: Some("Rust".into()),
            keyword: None,
            company_name: Some("Acme".into()),
            position: Some("backend".into()),
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM job_postings j");
        push_filters(&mut qb, &f);
        assert_eq!(qb.sql().matches("ILIKE").count(), 6);
        assert!(qb.sql().contains("c.name ILIKE"));
    }

    #[tokio::test]
    async fn company_insert_reports_whether_it_created_the_row() {
        let Some(db) = crate::state::test_support::test_db().await else { return };
        let company = NewCompany {
            name: format!("Acme {}", Uuid::new_v4()),
            address: String::new(),
            industry: "Software".into(),
            ceo_name: String::new(),
            business_content: String::new(),
        };
        let (first, created) = Company::insert_or_get(&db, &company).await.unwrap();
        assert!(created);
        let (second, created) = Company::insert_or_get(&db, &company).await.unwrap();
        assert!(!created);
        assert_eq!(first, second);
    }
}
