use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{repo::BookmarkRow, services::ToggleOutcome};

#[derive(Debug, Serialize)]
pub struct BookmarkDto {
    pub bookmark_id: Uuid,
    pub job_posting_id: Uuid,
    pub job_title: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<BookmarkRow> for BookmarkDto {
    fn from(r: BookmarkRow) -> Self {
        Self {
            bookmark_id: r.id,
            job_posting_id: r.job_posting_id,
            job_title: r.job_title,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub job_posting_id: Uuid,
    pub outcome: ToggleOutcome,
    pub bookmarked: bool,
    pub message: &'static str,
}
