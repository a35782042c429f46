//! Axum route handlers for accounts and sessions.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::validation::{
    validate_email, validate_name, validate_password, validate_username,
};
use crate::auth::{AuthError, AuthUser};
use crate::errors::AppError;
use crate::models::user::UserRow;
use crate::state::AppState;

const MAX_PAGE_SIZE: i64 = 100;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub name: String,
    pub job_role: Option<String>,
    pub mail: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

/// Only the fields present are changed.
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub job_role: Option<String>,
    pub mail: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListUsersParams {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_page_size")]
    pub limit: i64,
}

fn default_page_size() -> i64 {
    MAX_PAGE_SIZE
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/auth/register
pub async fn handle_register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserRow>), AppError> {
    let username = request.username.trim();
    let mail = request.mail.trim();
    validate_username(username).map_err(AppError::Validation)?;
    validate_password(&request.password).map_err(AppError::Validation)?;
    validate_name(&request.name).map_err(AppError::Validation)?;
    validate_email(mail).map_err(AppError::Validation)?;

    if find_user_by_username(&state.db, username).await?.is_some() {
        return Err(AuthError::UsernameTaken.into());
    }
    if email_in_use(&state.db, mail, None).await? {
        return Err(AuthError::EmailTaken.into());
    }

    let password_hash = hash_password(&request.password)?;
    let user: UserRow = sqlx::query_as(
        r#"
        INSERT INTO users (username, password_hash, name, job_role, mail)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(username)
    .bind(&password_hash)
    .bind(request.name.trim())
    .bind(request.job_role.as_deref().map(str::trim).filter(|r| !r.is_empty()))
    .bind(mail)
    .fetch_one(&state.db)
    .await
    .map_err(unique_violation_to_conflict)?;

    info!("Registered user {} ({})", user.username, user.id);
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /api/auth/login
pub async fn handle_login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let user = find_user_by_username(&state.db, request.username.trim())
        .await?
        .filter(|user| verify_password(&request.password, &user.password_hash))
        .ok_or(AuthError::InvalidCredentials)?;

    let access_token = state.jwt.issue(&user.username)?;
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
    }))
}

/// GET /api/auth/me
pub async fn handle_get_me(AuthUser(user): AuthUser) -> Json<UserRow> {
    Json(user)
}

/// PUT /api/auth/me
pub async fn handle_update_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<UserRow>, AppError> {
    if let Some(name) = &request.name {
        validate_name(name).map_err(AppError::Validation)?;
    }
    if let Some(password) = &request.password {
        validate_password(password).map_err(AppError::Validation)?;
    }
    let mail = request.mail.as_deref().map(str::trim);
    if let Some(mail) = mail {
        validate_email(mail).map_err(AppError::Validation)?;
        if email_in_use(&state.db, mail, Some(&user)).await? {
            return Err(AuthError::EmailTaken.into());
        }
    }
    let password_hash = request
        .password
        .as_deref()
        .map(hash_password)
        .transpose()?;

    let updated: UserRow = sqlx::query_as(
        r#"
        UPDATE users
        SET name          = COALESCE($2, name),
            job_role      = COALESCE($3, job_role),
            mail          = COALESCE($4, mail),
            password_hash = COALESCE($5, password_hash)
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(user.id)
    .bind(request.name.as_deref().map(str::trim))
    .bind(request.job_role.as_deref().map(str::trim).filter(|r| !r.is_empty()))
    .bind(mail)
    .bind(password_hash)
    .fetch_one(&state.db)
    .await
    .map_err(unique_violation_to_conflict)?;

    Ok(Json(updated))
}

/// DELETE /api/auth/me
///
/// Removes the user's vector chunks, then the user row. Resumes and
/// applications go with it through `ON DELETE CASCADE`.
pub async fn handle_delete_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<StatusCode, AppError> {
    state.vector_store.delete_user(&user.id.to_string()).await?;

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user.id)
        .execute(&state.db)
        .await?;

    info!("Deleted user {} ({})", user.username, user.id);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/auth/users?skip=&limit=
pub async fn handle_list_users(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    Query(params): Query<ListUsersParams>,
) -> Result<Json<Vec<UserRow>>, AppError> {
    if params.skip < 0 {
        return Err(AppError::Validation("skip must not be negative".to_string()));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&params.limit) {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }

    let users: Vec<UserRow> =
        sqlx::query_as("SELECT * FROM users ORDER BY created_at, id OFFSET $1 LIMIT $2")
            .bind(params.skip)
            .bind(params.limit)
            .fetch_all(&state.db)
            .await?;

    Ok(Json(users))
}

// ────────────────────────────────────────────────────────────────────────────
// Queries
// ────────────────────────────────────────────────────────────────────────────

pub async fn find_user_by_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await
}

/// True if another account (not `except`) already uses `mail`.
async fn email_in_use(
    pool: &PgPool,
    mail: &str,
    except: Option<&UserRow>,
) -> Result<bool, sqlx::Error> {
    let taken: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM users WHERE mail = $1 AND id IS DISTINCT FROM $2)",
    )
    .bind(mail)
    .bind(except.map(|u| u.id))
    .fetch_one(pool)
    .await?;
    Ok(taken)
}

/// A concurrent registration can still hit the UNIQUE constraints.
fn unique_violation_to_conflict(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return match db.constraint() {
                Some(c) if c.contains("mail") => AuthError::EmailTaken.into(),
                _ => AuthError::UsernameTaken.into(),
            };
        }
    }
    AppError::Database(e)
}
