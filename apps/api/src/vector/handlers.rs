//! Axum route handlers for resume uploads and semantic search.

use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::state::AppState;
use crate::vector::loader::load_pdf;
use crate::vector::{ResumeDocument, SearchHit, StoreReport};

/// Upload size limit applied to the upload route.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

const DEFAULT_LIMIT: usize = 5;
const MAX_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub limit: Option<usize>,
}

/// POST /api/resumes/upload (multipart, field `file`)
///
/// Accepts a PDF or plain-text resume and stores its chunks under the
/// caller's user id. Uploading the same file name again replaces it.
pub async fn handle_upload_resume(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<StoreReport>), AppError> {
    let mut upload: Option<(String, Option<String>, Bytes)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("resume.pdf").to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Could not read upload: {e}")))?;
        upload = Some((file_name, content_type, data));
        break;
    }

    let (file_name, content_type, data) =
        upload.ok_or_else(|| AppError::Validation("Missing multipart field 'file'".to_string()))?;

    let document = match UploadKind::detect(&file_name, content_type.as_deref()) {
        UploadKind::Pdf => load_pdf(data, file_name).await?,
        UploadKind::Text => {
            let text = String::from_utf8(data.to_vec()).map_err(|_| {
                AppError::UnprocessableEntity("Text upload is not valid UTF-8".to_string())
            })?;
            ResumeDocument::from_text(file_name, &text)
        }
        UploadKind::Unsupported => {
            return Err(AppError::UnprocessableEntity(format!(
                "Unsupported file type for '{file_name}'; upload a PDF or plain text"
            )))
        }
    };

    let report = state
        .vector_store
        .store(&document, &user.id.to_string())
        .await?;
    Ok((StatusCode::CREATED, Json(report)))
}

/// GET /api/resumes/search?q=&limit=
///
/// Semantic search over the caller's own uploaded resume chunks.
pub async fn handle_search_resume(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<SearchHit>>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let hits = state
        .vector_store
        .search(&params.q, Some(&user.id.to_string()), limit)
        .await?;
    Ok(Json(hits))
}

#[derive(Debug, PartialEq, Eq)]
enum UploadKind {
    Pdf,
    Text,
    Unsupported,
}

impl UploadKind {
    fn detect(file_name: &str, content_type: Option<&str>) -> Self {
        let name = file_name.to_ascii_lowercase();
        match content_type {
            Some("application/pdf") => return Self::Pdf,
            Some(ct) if ct.starts_with("text/plain") => return Self::Text,
            _ => {}
        }
        if name.ends_with(".pdf") {
            Self::Pdf
        } else if name.ends_with(".txt") || name.ends_with(".md") {
            Self::Text
        } else {
            Self::Unsupported
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_kind_prefers_content_type() {
        assert_eq!(UploadKind::detect("cv.bin", Some("application/pdf")), UploadKind::Pdf);
        assert_eq!(
            UploadKind::detect("cv", Some("text/plain; charset=utf-8")),
            UploadKind::Text
        );
    }

    #[test]
    fn test_upload_kind_falls_back_to_extension() {
        assert_eq!(
            UploadKind::detect("CV.PDF", Some("application/octet-stream")),
            UploadKind::Pdf
        );
        assert_eq!(UploadKind::detect("notes.txt", None), UploadKind::Text);
        assert_eq!(UploadKind::detect("photo.png", Some("image/png")), UploadKind::Unsupported);
    }
}
