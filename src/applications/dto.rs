use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{model::ProficiencyLevel, repo::ApplicationListRow};

#[derive(Debug, Deserialize)]
pub struct ApplyRequest {
    pub job_id: Uuid,
    #[serde(default)]
    pub resume_path: Option<String>,
    pub proficiency_level: ProficiencyLevel,
}

#[derive(Debug, Serialize)]
pub struct ApplyResponse {
    pub application_id: Uuid,
    pub job_id: Uuid,
    pub status: &'static str,
    pub skills_linked: usize,
}

/// `GET /applications?status=pending&sort_by=created_at&direction=asc`
#[derive(Debug, Default, Deserialize)]
pub struct ListApplicationsQuery {
    pub status: Option<String>,
    pub sort_by: Option<String>,
    pub direction: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApplicationDto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_email: String,
    pub job_id: Uuid,
    pub job_title: String,
    pub status: String,
    pub resume_path: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub applied_at: OffsetDateTime,
}

impl From<ApplicationListRow> for ApplicationDto {
    fn from(r: ApplicationListRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            user_email: r.user_email,
            job_id: r.job_posting_id,
            job_title: r.job_title,
            status: r.status,
            resume_path: r.resume_path,
            applied_at: r.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UploadedResume {
    pub resume_path: String,
    pub file_name: String,
    pub size: usize,
}
