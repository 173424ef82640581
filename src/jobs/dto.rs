use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::{JobFilters, JobPosting};
use crate::pagination::PageParams;

/// `GET /jobs` query string. Kept flat: serde_urlencoded cannot parse numbers through `flatten`.
#[derive(Debug, Default, Deserialize)]
pub struct JobSearchQuery {
    pub page: Option<i64>,
    pub size: Option<i64>,
    pub sort_by: Option<String>,
    pub direction: Option<String>,
    pub location: Option<String>,
    pub experience: Option<String>,
    pub salary: Option<String>,
    pub tech_stack: Option<String>,
    pub keyword: Option<String>,
    pub company_name: Option<String>,
    pub position: Option<String>,
}

impl JobSearchQuery {
    pub fn split(self) -> (JobFilters, PageParams) {
        (
            JobFilters {
                location: self.location,
                experience: self.experience,
                salary: self.salary,
                tech_stack: self.tech_stack,
                keyword: self.keyword,
                company_name: self.company_name,
                position: self.position,
            },
            PageParams {
                page: self.page,
                size: self.size,
                sort_by: self.sort_by,
                direction: self.direction,
            },
        )
    }
}

#[derive(Debug, Serialize)]
pub struct JobPostingDto {
    pub id: Uuid,
    pub title: String,
    pub company_id: Uuid,
    pub company_name: String,
    pub location: String,
    pub salary: String,
    pub experience: String,
    pub employment_type: String,
    pub education: String,
    pub deadline: String,
    pub description: String,
    pub view_count: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<JobPosting> for JobPostingDto {
    fn from(j: JobPosting) -> Self {
        Self {
            id: j.id,
            title: j.title,
            company_id: j.company_id,
            company_name: j.company_name,
            location: j.location,
            salary: j.salary,
            experience: j.experience,
            employment_type: j.employment_type,
            education: j.education,
            deadline: j.deadline,
            description: j.description,
            view_count: j.view_count,
            created_at: j.created_at,
        }
    }
}
