use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::{ApplicationDto, ApplyResponse, ListApplicationsQuery, UploadedResume},
    model::{file_name_of, skill_names, ApplicationStatus, ProficiencyLevel},
    repo,
};
use crate::{
    activity::log_activity, errors::AppError, jobs::repo::JobPosting, pagination::SortDirection,
    state::AppState,
};

/// Presigned resume links stay valid for half an hour.
const RESUME_LINK_TTL: Duration = Duration::from_secs(30 * 60);
pub const MAX_RESUME_BYTES: usize = 10 * 1024 * 1024;

pub async fn apply(
    state: &AppState,
    user_id: Uuid,
    job_id: Uuid,
    resume_path: Option<&str>,
    level: ProficiencyLevel,
) -> Result<ApplyResponse, AppError> {
    let resume_path = resume_path.map(str::trim).filter(|p| !p.is_empty());
    if let Some(path) = resume_path {
        if !is_own_resume(user_id, path) {
            warn!(%user_id, resume_path = path, "apply with a resume outside the caller's uploads");
            return Err(AppError::invalid("resume must be one of your own uploads"));
        }
    }

    if repo::exists_for_user_job(&state.db, user_id, job_id).await? {
        return Err(AppError::invalid("already applied to this job posting"));
    }

    let job = JobPosting::find_by_id(&state.db, job_id)
        .await?
        .ok_or_else(|| AppError::invalid("job posting not found"))?;

    let skills = skill_names(&job.description);

    let mut tx = state.db.begin().await.context("begin tx")?;
    let application_id = repo::insert_application_tx(&mut tx, user_id, job_id, resume_path)
        .await?
        // a concurrent request got there first
        .ok_or_else(|| AppError::invalid("already applied to this job posting"))?;

    if let Some(path) = resume_path {
        repo::insert_attachment_tx(&mut tx, user_id, application_id, &file_name_of(path), path)
            .await?;
    }

    let mut skills_linked = 0;
    for name in &skills {
        if repo::link_skill_tx(&mut tx, user_id, name, level).await? {
            skills_linked += 1;
        }
    }
    tx.commit().await.context("commit tx")?;

    info!(%user_id, %job_id, %application_id, skills_linked, "application submitted");
    log_activity(
        &state.db,
        user_id,
        "POST /applications",
        &format!("applied to job posting '{}'", job.title),
    )
    .await;

    Ok(ApplyResponse {
        application_id,
        job_id,
        status: ApplicationStatus::Pending.as_str(),
        skills_linked,
    })
}

pub async fn list(
    state: &AppState,
    user_id: Uuid,
    query: &ListApplicationsQuery,
) -> Result<Vec<ApplicationDto>, AppError> {
    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<ApplicationStatus>()?),
    };
    if let Some(field) = query.sort_by.as_deref().map(str::trim) {
        // applications only sort by submission time
        if !field.is_empty() && field != "created_at" && field != "createdAt" {
            return Err(AppError::invalid(format!("cannot sort by '{field}'")));
        }
    }
    let direction = SortDirection::parse(query.direction.as_deref())?;

    let rows = repo::list_by_user(&state.db, user_id, status, direction).await?;
    log_activity(
        &state.db,
        user_id,
        "GET /applications",
        &format!(
            "listed applications, filter: {}",
            status.map(ApplicationStatus::as_str).unwrap_or("ALL")
        ),
    )
    .await;
    Ok(rows.into_iter().map(ApplicationDto::from).collect())
}

pub async fn cancel(state: &AppState, user_id: Uuid, application_id: Uuid) -> Result<(), AppError> {
    let application = repo::find_by_id(&state.db, application_id)
        .await?
        .ok_or_else(|| AppError::invalid("application not found"))?;

    if application.user_id != user_id {
        warn!(%user_id, %application_id, "cancel attempted on foreign application");
        return Err(AppError::invalid("only your own applications can be cancelled"));
    }

    let current: ApplicationStatus = application.status.parse()?;
    let next = current.cancel()?;

    if !repo::update_status(&state.db, application_id, current, next).await? {
        return Err(AppError::conflict("application status changed, try again"));
    }

    info!(%user_id, %application_id, "application cancelled");
    log_activity(
        &state.db,
        user_id,
        &format!("DELETE /applications/{application_id}"),
        &format!("cancelled application {application_id}"),
    )
    .await;
    Ok(())
}

pub(crate) fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "application/pdf" => Some("pdf"),
        "application/msword" => Some("doc"),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => Some("docx"),
        "text/plain" => Some("txt"),
        "application/rtf" | "text/rtf" => Some("rtf"),
        "application/x-hwp" | "application/haansofthwp" => Some("hwp"),
        _ => None,
    }
}

fn resume_prefix(user_id: Uuid) -> String {
    format!("resumes/{user_id}/")
}

/// Key under which a user's resume upload is stored.
pub(crate) fn resume_key(user_id: Uuid, object_id: Uuid, content_type: &str) -> String {
    let ext = ext_from_mime(content_type).unwrap_or("bin");
    format!("{}{object_id}.{ext}", resume_prefix(user_id))
}

/// True only for an object directly under the user's own resume prefix.
pub(crate) fn is_own_resume(user_id: Uuid, key: &str) -> bool {
    key.strip_prefix(&resume_prefix(user_id))
        .is_some_and(|rest| !rest.is_empty() && !rest.contains(['/', '\\']))
}

pub async fn upload_resume(
    state: &AppState,
    user_id: Uuid,
    original_name: Option<&str>,
    content_type: &str,
    body: Bytes,
) -> Result<UploadedResume, AppError> {
    if body.is_empty() {
        return Err(AppError::invalid("resume file is empty"));
    }
    if body.len() > MAX_RESUME_BYTES {
        return Err(AppError::invalid("resume file is too large"));
    }

    let key = resume_key(user_id, Uuid::new_v4(), content_type);
    let size = body.len();
    state
        .storage
        .put_object(&key, body, content_type)
        .await
        .with_context(|| format!("put_object {key}"))?;

    info!(%user_id, %key, size, "resume uploaded");
    Ok(UploadedResume {
        file_name: original_name
            .map(file_name_of)
            .unwrap_or_else(|| file_name_of(&key)),
        resume_path: key,
        size,
    })
}

/// Presigned download URL for the resume of one of the caller's applications.
pub async fn resume_link(
    state: &AppState,
    user_id: Uuid,
    application_id: Uuid,
) -> Result<String, AppError> {
    let application = repo::find_by_id(&state.db, application_id)
        .await?
        .filter(|a| a.user_id == user_id)
        .ok_or_else(|| AppError::invalid("application not found"))?;

    let key = application
        .resume_path
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::invalid("application has no resume attached"))?;
    if !is_own_resume(user_id, &key) {
        warn!(%user_id, %application_id, %key, "resume link for a foreign object refused");
        return Err(AppError::invalid("application has no resume attached"));
    }

    let url = state
        .storage
        .presign_download(&key, &file_name_of(&key), RESUME_LINK_TTL)
        .await
        .with_context(|| format!("presign url for {key}"))?;
    Ok(url)
}
