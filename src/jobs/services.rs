use uuid::Uuid;

use super::{
    dto::{JobPostingDto, JobSearchQuery},
    repo::{JobPosting, JOB_SORT_COLUMNS},
};
use crate::{
    errors::AppError,
    pagination::{Page, PageRequest},
    state::AppState,
};

pub const RELATED_LIMIT: i64 = 20;

/// First comma-separated token of a description, trimmed. Postings store their
/// sector tags as `"Rust, Backend, ..."`.
pub fn first_keyword(description: &str) -> Option<&str> {
    description
        .split(',')
        .next()
        .map(str::trim)
        .filter(|k| !k.is_empty())
}

pub async fn search(state: &AppState, query: JobSearchQuery) -> Result<Page<JobPostingDto>, AppError> {
    let (filters, params) = query.split();
    let page = PageRequest::resolve(&params, JOB_SORT_COLUMNS)?;
    let (rows, total) = JobPosting::search(&state.db, &filters, &page).await?;
    Ok(Page::new(
        rows.into_iter().map(JobPostingDto::from).collect(),
        &page,
        total,
    ))
}

pub async fn detail(state: &AppState, id: Uuid) -> Result<JobPostingDto, AppError> {
    JobPosting::record_view(&state.db, id)
        .await?
        .map(JobPostingDto::from)
        .ok_or_else(|| AppError::invalid("job posting not found"))
}

pub async fn related(state: &AppState, id: Uuid) -> Result<Vec<JobPostingDto>, AppError> {
    let current = JobPosting::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| AppError::invalid("job posting not found"))?;

    let keyword = first_keyword(&current.description);
    let rows = JobPosting::related(&state.db, current.id, current.company_id, keyword, RELATED_LIMIT)
        .await?;
    Ok(rows.into_iter().map(JobPostingDto::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_keyword_takes_leading_tag() {
        assert_eq!(first_keyword("Rust, Backend, AWS"), Some("Rust"));
        assert_eq!(first_keyword("  Java  "), Some("Java"));
        assert_eq!(first_keyword(""), None);
        assert_eq!(first_keyword(" , Go"), None);
    }

    #[tokio::test]
    async fn bad_sort_is_rejected_before_querying() {
        let state = AppState::fake();
        let query = JobSearchQuery {
            sort_by: Some("password_hash".into()),
            ..Default::default()
        };
        let err = search(&state, query).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }
}
