//! Axum route handlers for structured resumes.
//!
//! Every query is scoped to the authenticated user; another user's resume
//! looks exactly like a missing one.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::resume::ResumeRow;
use crate::state::AppState;

/// Body for both create and update. On update, absent fields are untouched.
#[derive(Debug, Default, Deserialize)]
pub struct ResumeFields {
    pub skills: Option<String>,
    pub experience: Option<String>,
    pub knowledge: Option<String>,
    pub education: Option<String>,
    pub projects: Option<String>,
    pub certifications: Option<String>,
}

impl ResumeFields {
    fn is_empty(&self) -> bool {
        [
            &self.skills,
            &self.experience,
            &self.knowledge,
            &self.education,
            &self.projects,
            &self.certifications,
        ]
        .iter()
        .all(|f| f.as_deref().map_or(true, |s| s.trim().is_empty()))
    }
}

/// POST /api/resumes
pub async fn handle_create_resume(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(fields): Json<ResumeFields>,
) -> Result<(StatusCode, Json<ResumeRow>), AppError> {
    if fields.is_empty() {
        return Err(AppError::Validation(
            "At least one resume field must be provided".to_string(),
        ));
    }

    let resume: ResumeRow = sqlx::query_as(
        r#"
        INSERT INTO resumes (user_id, skills, experience, knowledge, education, projects, certifications)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(user.id)
    .bind(&fields.skills)
    .bind(&fields.experience)
    .bind(&fields.knowledge)
    .bind(&fields.education)
    .bind(&fields.projects)
    .bind(&fields.certifications)
    .fetch_one(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(resume)))
}

/// GET /api/resumes
pub async fn handle_list_resumes(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<ResumeRow>>, AppError> {
    let resumes: Vec<ResumeRow> =
        sqlx::query_as("SELECT * FROM resumes WHERE user_id = $1 ORDER BY created_at")
            .bind(user.id)
            .fetch_all(&state.db)
            .await?;
    Ok(Json(resumes))
}

/// GET /api/resumes/:id
pub async fn handle_get_resume(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(resume_id): Path<Uuid>,
) -> Result<Json<ResumeRow>, AppError> {
    let resume = find_owned_resume(&state.db, user.id, resume_id)
        .await?
        .ok_or_else(|| not_found(resume_id))?;
    Ok(Json(resume))
}

/// PUT /api/resumes/:id
pub async fn handle_update_resume(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(resume_id): Path<Uuid>,
    Json(fields): Json<ResumeFields>,
) -> Result<Json<ResumeRow>, AppError> {
    let resume: ResumeRow = sqlx::query_as(
        r#"
        UPDATE resumes
        SET skills         = COALESCE($3, skills),
            experience     = COALESCE($4, experience),
            knowledge      = COALESCE($5, knowledge),
            education      = COALESCE($6, education),
            projects       = COALESCE($7, projects),
            certifications = COALESCE($8, certifications),
            updated_at     = now()
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(resume_id)
    .bind(user.id)
    .bind(&fields.skills)
    .bind(&fields.experience)
    .bind(&fields.knowledge)
    .bind(&fields.education)
    .bind(&fields.projects)
    .bind(&fields.certifications)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| not_found(resume_id))?;

    Ok(Json(resume))
}

/// DELETE /api/resumes/:id
///
/// Refused while a submitted (non-draft) application still points at the
/// resume, since clearing its `resume_id` would break the application.
pub async fn handle_delete_resume(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(resume_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if find_owned_resume(&state.db, user.id, resume_id).await?.is_none() {
        return Err(not_found(resume_id));
    }

    let in_use: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM applications WHERE resume_id = $1 AND status <> 'draft')",
    )
    .bind(resume_id)
    .fetch_one(&state.db)
    .await?;
    if in_use {
        return Err(AppError::Conflict(
            "Resume is attached to a submitted application".to_string(),
        ));
    }

    sqlx::query("DELETE FROM resumes WHERE id = $1 AND user_id = $2")
        .bind(resume_id)
        .bind(user.id)
        .execute(&state.db)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn find_owned_resume(
    pool: &PgPool,
    user_id: Uuid,
    resume_id: Uuid,
) -> Result<Option<ResumeRow>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM resumes WHERE id = $1 AND user_id = $2")
        .bind(resume_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

fn not_found(resume_id: Uuid) -> AppError {
    AppError::NotFound(format!("Resume {resume_id} not found"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_fields_count_as_empty() {
        let fields: ResumeFields =
            serde_json::from_str(r#"{"skills": "   ", "education": null}"#).unwrap();
        assert!(fields.is_empty());
    }

    #[test]
    fn test_any_field_makes_resume_non_empty() {
        let fields: ResumeFields =
            serde_json::from_str(r#"{"projects": "Interview360"}"#).unwrap();
        assert!(!fields.is_empty());
        assert!(ResumeFields::default().is_empty());
    }
}
