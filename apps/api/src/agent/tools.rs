//! Retrieval tools offered to the model.
//!
//! The model chooses the tool arguments, never the user: `user_id` is passed
//! in by the orchestrator and every query is bound to it.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::PgPool;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::llm_client::ToolSpec;
use crate::models::resume::{ResumeRow, RESUME_FIELDS};
use crate::vector::{ResumeVectorStore, SearchHit, VectorStoreError};

const NO_DATA: &str = "No resume data found for this user.";
const DEFAULT_SEARCH_LIMIT: usize = 5;
const MAX_SEARCH_LIMIT: usize = 10;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

#[async_trait]
pub trait RetrievalTool: Send + Sync {
    fn spec(&self) -> ToolSpec;

    /// Runs the lookup for `user_id` and renders the result as text for the model.
    async fn invoke(&self, user_id: &str, arguments: &Value) -> Result<String, RetrievalError>;
}

/// How a caller-supplied user identifier is matched: a UUID only ever matches
/// `users.id`, anything else only ever matches `users.username`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserKey<'a> {
    Id(Uuid),
    Username(&'a str),
}

impl<'a> UserKey<'a> {
    pub fn parse(raw: &'a str) -> Self {
        match Uuid::parse_str(raw.trim()) {
            Ok(id) => UserKey::Id(id),
            Err(_) => UserKey::Username(raw.trim()),
        }
    }
}

/// Resolves a request's user identifier to the user's UUID string, the form
/// both resume rows and uploaded chunks are keyed by. Unknown usernames are
/// returned unchanged and match nothing downstream.
pub async fn resolve_user_id(pool: &PgPool, raw: &str) -> Result<String, sqlx::Error> {
    match UserKey::parse(raw) {
        UserKey::Id(id) => Ok(id.to_string()),
        UserKey::Username(username) => {
            let id: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE username = $1")
                .bind(username)
                .fetch_optional(pool)
                .await?;
            Ok(id.map(|id| id.to_string()).unwrap_or_else(|| username.to_string()))
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SQL: structured resume rows
// ────────────────────────────────────────────────────────────────────────────

pub struct SqlResumeTool {
    pool: PgPool,
}

impl SqlResumeTool {
    pub const NAME: &'static str = "query_resume";

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RetrievalTool for SqlResumeTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: Self::NAME.to_string(),
            description: "Fetch the user's resume rows from the resumes table. \
                Columns: skills, experience, knowledge, education, projects, certifications \
                (all free text). Request only the columns needed to answer."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "fields": {
                        "type": "array",
                        "items": { "type": "string", "enum": RESUME_FIELDS },
                        "description": "Columns to return; omit for all columns."
                    }
                }
            }),
        }
    }

    async fn invoke(&self, user_id: &str, arguments: &Value) -> Result<String, RetrievalError> {
        let fields = requested_fields(arguments)?;

        let rows: Vec<ResumeRow> = match UserKey::parse(user_id) {
            UserKey::Id(id) => {
                sqlx::query_as("SELECT * FROM resumes WHERE user_id = $1 ORDER BY created_at")
                    .bind(id)
                    .fetch_all(&self.pool)
                    .await?
            }
            UserKey::Username(username) => {
                sqlx::query_as(
                    r#"
                    SELECT r.*
                    FROM resumes r
                    JOIN users u ON u.id = r.user_id
                    WHERE u.username = $1
                    ORDER BY r.created_at
                    "#,
                )
                .bind(username)
                .fetch_all(&self.pool)
                .await?
            }
        };

        debug!("query_resume returned {} rows for {user_id}", rows.len());
        Ok(render_rows(&rows, &fields))
    }
}

fn requested_fields(arguments: &Value) -> Result<Vec<&'static str>, RetrievalError> {
    let Some(requested) = arguments.get("fields").filter(|v| !v.is_null()) else {
        return Ok(RESUME_FIELDS.to_vec());
    };
    let requested = requested.as_array().ok_or_else(|| {
        RetrievalError::InvalidArguments("'fields' must be an array of column names".to_string())
    })?;

    let mut fields = Vec::with_capacity(requested.len());
    for value in requested {
        let name = value.as_str().unwrap_or_default();
        let field = RESUME_FIELDS
            .iter()
            .find(|f| **f == name)
            .ok_or_else(|| RetrievalError::InvalidArguments(format!("unknown column '{value}'")))?;
        if !fields.contains(field) {
            fields.push(*field);
        }
    }
    if fields.is_empty() {
        return Ok(RESUME_FIELDS.to_vec());
    }
    Ok(fields)
}

fn render_rows(rows: &[ResumeRow], fields: &[&str]) -> String {
    if rows.is_empty() {
        return NO_DATA.to_string();
    }
    let projected: Vec<Value> = rows
        .iter()
        .map(|row| {
            let object = fields
                .iter()
                .map(|f| (f.to_string(), json!(row.field(f))))
                .collect::<serde_json::Map<_, _>>();
            Value::Object(object)
        })
        .collect();
    Value::Array(projected).to_string()
}

// ────────────────────────────────────────────────────────────────────────────
// Vector: semantic search over resume chunks
// ────────────────────────────────────────────────────────────────────────────

pub struct VectorSearchTool {
    store: Arc<ResumeVectorStore>,
}

impl VectorSearchTool {
    pub const NAME: &'static str = "search_resume";

    pub fn new(store: Arc<ResumeVectorStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl RetrievalTool for VectorSearchTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: Self::NAME.to_string(),
            description: "Semantic search over passages of the user's uploaded resume. \
                Returns the most relevant passages with similarity scores."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "What to look for." },
                    "limit": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": MAX_SEARCH_LIMIT,
                        "description": "Number of passages to return."
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn invoke(&self, user_id: &str, arguments: &Value) -> Result<String, RetrievalError> {
        let query = arguments
            .get("query")
            .and_then(Value::as_str)
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| RetrievalError::InvalidArguments("'query' is required".to_string()))?;
        let limit = arguments
            .get("limit")
            .and_then(Value::as_u64)
            .map(|l| (l as usize).clamp(1, MAX_SEARCH_LIMIT))
            .unwrap_or(DEFAULT_SEARCH_LIMIT);

        let hits = self.store.search(query, Some(user_id), limit).await?;
        Ok(render_hits(&hits))
    }
}

fn render_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return NO_DATA.to_string();
    }
    Value::Array(
        hits.iter()
            .map(|h| {
                json!({
                    "score": h.score,
                    "text": h.text,
                    "page": h.metadata.page,
                    "chunk_index": h.metadata.chunk_index,
                })
            })
            .collect(),
    )
    .to_string()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::vector::chunking::ChunkingConfig;
    use crate::vector::memory::MemoryIndex;
    use crate::vector::testing::HashEmbedder;
    use crate::vector::ResumeDocument;

    fn row() -> ResumeRow {
        ResumeRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            skills: Some("Python, FastAPI, NLP, LangChain, TensorFlow".to_string()),
            experience: Some("AI/ML Developer with 3 years experience in NLP and CV.".to_string()),
            knowledge: None,
            education: Some("B.Tech CSE".to_string()),
            projects: None,
            certifications: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_fields_default_to_all_columns() {
        assert_eq!(requested_fields(&json!({})).unwrap(), RESUME_FIELDS.to_vec());
        assert_eq!(
            requested_fields(&json!({ "fields": [] })).unwrap(),
            RESUME_FIELDS.to_vec()
        );
    }

    #[test]
    fn test_unknown_column_is_rejected() {
        let result = requested_fields(&json!({ "fields": ["skills", "password_hash"] }));
        assert!(matches!(result, Err(RetrievalError::InvalidArguments(_))));
    }

    #[test]
    fn test_render_rows_projects_requested_fields() {
        let rendered = render_rows(&[row()], &["skills", "education"]);
        let parsed: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed[0]["skills"], "Python, FastAPI, NLP, LangChain, TensorFlow");
        assert_eq!(parsed[0]["education"], "B.Tech CSE");
        assert!(parsed[0].get("experience").is_none());
    }

    #[test]
    fn test_render_rows_without_data() {
        assert_eq!(render_rows(&[], &RESUME_FIELDS), NO_DATA);
    }

    fn vector_tool() -> (VectorSearchTool, Arc<ResumeVectorStore>) {
        let store = Arc::new(ResumeVectorStore::new(
            Arc::new(MemoryIndex::new()),
            Arc::new(HashEmbedder { dim: 32 }),
            ChunkingConfig::new(200, 20).unwrap(),
        ));
        (VectorSearchTool::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_vector_tool_only_sees_callers_chunks() {
        let (tool, store) = vector_tool();
        store
            .store(&ResumeDocument::from_text("a.pdf", "Rust engineer at Acme"), "user_a")
            .await
            .unwrap();
        store
            .store(&ResumeDocument::from_text("b.pdf", "Rust engineer at Globex"), "user_b")
            .await
            .unwrap();

        let output = tool
            .invoke("user_a", &json!({ "query": "Rust engineer", "limit": 10 }))
            .await
            .unwrap();

        assert!(output.contains("Acme"));
        assert!(!output.contains("Globex"));
    }

    #[tokio::test]
    async fn test_vector_tool_requires_query() {
        let (tool, _) = vector_tool();
        let result = tool.invoke("user_a", &json!({ "limit": 3 })).await;
        assert!(matches!(result, Err(RetrievalError::InvalidArguments(_))));
    }

    #[test]
    fn test_user_key_matches_uuid_or_username_never_both() {
        let id = Uuid::new_v4();
        assert_eq!(UserKey::parse(&id.to_string()), UserKey::Id(id));
        assert_eq!(
            UserKey::parse(&id.to_string().to_uppercase()),
            UserKey::Id(id)
        );
        assert_eq!(UserKey::parse(" alice "), UserKey::Username("alice"));
        assert_eq!(UserKey::parse("user_12345"), UserKey::Username("user_12345"));
    }

    #[tokio::test]
    async fn test_resolved_uuid_is_canonical_form() {
        let id = Uuid::new_v4();
        // UUID input resolves without touching the database.
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let resolved = resolve_user_id(&pool, &id.to_string().to_uppercase())
            .await
            .unwrap();
        assert_eq!(resolved, id.to_string());
    }

    async fn insert_user(pool: &PgPool, username: &str) -> sqlx::Result<Uuid> {
        sqlx::query_scalar(
            "INSERT INTO users (username, password_hash, name, mail) \
             VALUES ($1, 'hash', $1, md5($1) || '@example.com') RETURNING id",
        )
        .bind(username)
        .fetch_one(pool)
        .await
    }

    async fn insert_resume(pool: &PgPool, user_id: Uuid, skills: &str) -> sqlx::Result<()> {
        sqlx::query("INSERT INTO resumes (user_id, skills) VALUES ($1, $2)")
            .bind(user_id)
            .bind(skills)
            .execute(pool)
            .await?;
        Ok(())
    }

    #[sqlx::test]
    #[ignore] // Needs Postgres: DATABASE_URL=... cargo test -- --ignored
    async fn test_sql_tool_never_returns_other_users_rows(pool: PgPool) -> sqlx::Result<()> {
        let victim = insert_user(&pool, "victim").await?;
        insert_resume(&pool, victim, "VICTIM SKILLS").await?;
        // Another account whose username is the first account's id.
        let lookalike = insert_user(&pool, &victim.to_string()).await?;
        insert_resume(&pool, lookalike, "LOOKALIKE SKILLS").await?;

        let tool = SqlResumeTool::new(pool.clone());
        let args = json!({ "fields": ["skills"] });

        let by_id = tool.invoke(&victim.to_string(), &args).await.unwrap();
        assert!(by_id.contains("VICTIM SKILLS"));
        assert!(!by_id.contains("LOOKALIKE SKILLS"));

        let by_name = tool.invoke("victim", &args).await.unwrap();
        assert!(by_name.contains("VICTIM SKILLS"));
        assert!(!by_name.contains("LOOKALIKE SKILLS"));

        let unknown = tool.invoke(&Uuid::new_v4().to_string(), &args).await.unwrap();
        assert_eq!(unknown, NO_DATA);
        Ok(())
    }

    #[sqlx::test]
    #[ignore] // Needs Postgres: DATABASE_URL=... cargo test -- --ignored
    async fn test_username_resolves_to_same_data_on_both_backends(
        pool: PgPool,
    ) -> sqlx::Result<()> {
        let alice = insert_user(&pool, "alice").await?;
        insert_resume(&pool, alice, "Rust, Postgres").await?;
        let (vector, store) = vector_tool();
        store
            .store(
                &ResumeDocument::from_text("alice.pdf", "Rust engineer at Acme"),
                &alice.to_string(),
            )
            .await
            .unwrap();

        let resolved = resolve_user_id(&pool, "alice").await?;
        assert_eq!(resolved, alice.to_string());

        let sql = SqlResumeTool::new(pool.clone())
            .invoke(&resolved, &json!({ "fields": ["skills"] }))
            .await
            .unwrap();
        let passages = vector
            .invoke(&resolved, &json!({ "query": "Rust engineer" }))
            .await
            .unwrap();
        assert!(sql.contains("Rust, Postgres"));
        assert!(passages.contains("Acme"));

        assert_eq!(resolve_user_id(&pool, "nobody").await?, "nobody");
        Ok(())
    }
}
