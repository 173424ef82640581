use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::{
    dto::BookmarkDto,
    repo::{delete_bookmark, insert_bookmark, list_by_user, BOOKMARK_SORT_COLUMNS},
};
use crate::{
    activity::log_activity,
    errors::AppError,
    jobs::repo::JobPosting,
    pagination::{Page, PageParams, PageRequest},
    state::AppState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleOutcome {
    Added,
    Removed,
}

impl ToggleOutcome {
    pub fn bookmarked(self) -> bool {
        matches!(self, Self::Added)
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::Added => "bookmark added",
            Self::Removed => "bookmark removed",
        }
    }
}

pub async fn toggle(state: &AppState, user_id: Uuid, job_id: Uuid) -> Result<ToggleOutcome, AppError> {
    let job = JobPosting::find_by_id(&state.db, job_id)
        .await?
        .ok_or_else(|| AppError::invalid("job posting not found"))?;

    // delete-first keeps the toggle correct without a read-then-write window
    let outcome = if delete_bookmark(&state.db, user_id, job_id).await? {
        ToggleOutcome::Removed
    } else {
        insert_bookmark(&state.db, user_id, job_id).await?;
        ToggleOutcome::Added
    };

    info!(%user_id, %job_id, ?outcome, "bookmark toggled");
    let description = match outcome {
        ToggleOutcome::Added => format!("bookmarked job posting '{}'", job.title),
        ToggleOutcome::Removed => format!("removed bookmark for job posting '{}'", job.title),
    };
    log_activity(&state.db, user_id, &format!("POST /bookmarks/{job_id}"), &description).await;
    Ok(outcome)
}

pub async fn list(state: &AppState, user_id: Uuid, params: &PageParams) -> Result<Page<BookmarkDto>, AppError> {
    let page = PageRequest::resolve(params, BOOKMARK_SORT_COLUMNS)?;
    let (rows, total) = list_by_user(&state.db, user_id, &page).await?;
    log_activity(&state.db, user_id, "GET /bookmarks", "listed bookmarks").await;
    Ok(Page::new(rows.into_iter().map(Into::into).collect(), &page, total))
}
