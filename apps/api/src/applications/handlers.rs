//! Axum route handlers for job applications.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::applications::extract::extract_application_fields;
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::application::{ApplicationRow, ApplicationStatus};
use crate::resumes::handlers::find_owned_resume;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    pub text: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateApplicationRequest {
    pub status: Option<ApplicationStatus>,
    pub resume_id: Option<Uuid>,
    /// Clears `resume_id`. Only valid for drafts.
    #[serde(default)]
    pub detach_resume: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/applications/extract
///
/// Extracts the posting's fields with the LLM and files them as a draft.
pub async fn handle_extract_application(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<ExtractRequest>,
) -> Result<(StatusCode, Json<ApplicationRow>), AppError> {
    if request.text.trim().is_empty() {
        return Err(AppError::Validation("text cannot be empty".to_string()));
    }

    let extract =
        extract_application_fields(&request.text, &state.extraction_llm, &state.retry_policy)
            .await?;

    let application: ApplicationRow = sqlx::query_as(
        r#"
        INSERT INTO applications
            (user_id, job_role, job_description, company_name, company_description, final_date, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(user.id)
    .bind(&extract.job_role)
    .bind(&extract.job_description)
    .bind(&extract.company_name)
    .bind(&extract.company_description)
    .bind(extract.final_date)
    .bind(ApplicationStatus::Draft.as_str())
    .fetch_one(&state.db)
    .await?;

    info!(
        "Filed draft application {} ({} at {}) for {}",
        application.id, application.job_role, application.company_name, user.username
    );
    Ok((StatusCode::CREATED, Json(application)))
}

/// GET /api/applications
pub async fn handle_list_applications(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<ApplicationRow>>, AppError> {
    let applications: Vec<ApplicationRow> =
        sqlx::query_as("SELECT * FROM applications WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(user.id)
            .fetch_all(&state.db)
            .await?;
    Ok(Json(applications))
}

/// GET /api/applications/:id
pub async fn handle_get_application(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(application_id): Path<Uuid>,
) -> Result<Json<ApplicationRow>, AppError> {
    let application = find_owned_application(&state.db, user.id, application_id)
        .await?
        .ok_or_else(|| not_found(application_id))?;
    Ok(Json(application))
}

/// PATCH /api/applications/:id
pub async fn handle_update_application(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(application_id): Path<Uuid>,
    Json(request): Json<UpdateApplicationRequest>,
) -> Result<Json<ApplicationRow>, AppError> {
    let current = find_owned_application(&state.db, user.id, application_id)
        .await?
        .ok_or_else(|| not_found(application_id))?;
    let current_status = current
        .status
        .parse::<ApplicationStatus>()
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

    if let Some(resume_id) = request.resume_id {
        if find_owned_resume(&state.db, user.id, resume_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Resume {resume_id} not found")));
        }
    }

    let (status, resume_id) = next_state(current_status, current.resume_id, &request)?;
    let applied_now = status == ApplicationStatus::Applied && current_status != ApplicationStatus::Applied;

    let application: ApplicationRow = sqlx::query_as(
        r#"
        UPDATE applications
        SET status     = $3,
            resume_id  = $4,
            applied_at = CASE WHEN $5 THEN now() ELSE applied_at END,
            updated_at = now()
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(application_id)
    .bind(user.id)
    .bind(status.as_str())
    .bind(resume_id)
    .bind(applied_now)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(application))
}

/// DELETE /api/applications/:id
pub async fn handle_delete_application(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(application_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let result = sqlx::query("DELETE FROM applications WHERE id = $1 AND user_id = $2")
        .bind(application_id)
        .bind(user.id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(not_found(application_id));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

/// Applies `request` to the current (status, resume) pair and checks that
/// any status past draft still has a resume attached.
fn next_state(
    status: ApplicationStatus,
    resume_id: Option<Uuid>,
    request: &UpdateApplicationRequest,
) -> Result<(ApplicationStatus, Option<Uuid>), AppError> {
    if request.detach_resume && request.resume_id.is_some() {
        return Err(AppError::Validation(
            "resume_id and detach_resume cannot be combined".to_string(),
        ));
    }

    let status = request.status.unwrap_or(status);
    let resume_id = if request.detach_resume {
        None
    } else {
        request.resume_id.or(resume_id)
    };

    if status.requires_resume() && resume_id.is_none() {
        return Err(AppError::UnprocessableEntity(format!(
            "An application with status '{status}' must reference a resume"
        )));
    }
    Ok((status, resume_id))
}

async fn find_owned_application(
    pool: &PgPool,
    user_id: Uuid,
    application_id: Uuid,
) -> Result<Option<ApplicationRow>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM applications WHERE id = $1 AND user_id = $2")
        .bind(application_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

fn not_found(application_id: Uuid) -> AppError {
    AppError::NotFound(format!("Application {application_id} not found"))
}
