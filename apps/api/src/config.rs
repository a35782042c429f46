use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Which backend grounds the question-answering agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalBackend {
    /// Exact lookups against the `resumes` table.
    Sql,
    /// Similarity search over embedded resume chunks.
    Vector,
}

impl fmt::Display for RetrievalBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sql => "sql",
            Self::Vector => "vector",
        })
    }
}

impl FromStr for RetrievalBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sql" => Ok(Self::Sql),
            "vector" => Ok(Self::Vector),
            other => bail!("RETRIEVAL_BACKEND must be 'sql' or 'vector', got '{other}'"),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub rust_log: String,

    pub llm_api_key: String,
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_extraction_model: String,
    pub llm_temperature: f32,

    pub retrieval_backend: RetrievalBackend,
    pub qa_max_attempts: u32,
    pub qa_initial_delay: Duration,
    pub qa_timeout: Duration,

    /// Unset means the in-process vector index is used.
    pub qdrant_url: Option<String>,
    pub qdrant_api_key: Option<String>,
    pub qdrant_collection: String,

    pub embedding_url: String,
    pub embedding_model: String,
    pub embedding_api_key: Option<String>,
    pub embedding_dimension: usize,

    pub chunk_size: usize,
    pub chunk_overlap: usize,

    pub jwt_secret: String,
    pub access_token_expire_minutes: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let llm_model = optional_env("LLM_MODEL").unwrap_or_else(|| "gemini-2.0-flash".to_string());
        let chunk_size = parse_env("CHUNK_SIZE", 1000usize)?;
        let chunk_overlap = parse_env("CHUNK_OVERLAP", 200usize)?;
        if chunk_overlap >= chunk_size {
            bail!("CHUNK_OVERLAP ({chunk_overlap}) must be smaller than CHUNK_SIZE ({chunk_size})");
        }

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            port: parse_env("PORT", 8080u16)?,
            rust_log: optional_env("RUST_LOG").unwrap_or_else(|| "info".to_string()),

            llm_api_key: require_env("LLM_API_KEY")?,
            llm_base_url: optional_env("LLM_BASE_URL").unwrap_or_else(|| {
                "https://generativelanguage.googleapis.com/v1beta/openai".to_string()
            }),
            llm_extraction_model: optional_env("LLM_EXTRACTION_MODEL")
                .unwrap_or_else(|| llm_model.clone()),
            llm_model,
            llm_temperature: parse_env("LLM_TEMPERATURE", 0.3f32)?,

            retrieval_backend: parse_env("RETRIEVAL_BACKEND", RetrievalBackend::Sql)?,
            qa_max_attempts: parse_env("QA_MAX_ATTEMPTS", 3u32)?,
            qa_initial_delay: Duration::from_millis(parse_env("QA_INITIAL_DELAY_MS", 1000u64)?),
            qa_timeout: Duration::from_secs(parse_env("QA_TIMEOUT_SECS", 30u64)?),

            qdrant_url: optional_env("QDRANT_URL"),
            qdrant_api_key: optional_env("QDRANT_API_KEY"),
            qdrant_collection: optional_env("QDRANT_COLLECTION")
                .unwrap_or_else(|| "user_resumes".to_string()),

            embedding_url: optional_env("EMBEDDING_URL")
                .unwrap_or_else(|| "http://localhost:8081/v1/embeddings".to_string()),
            embedding_model: optional_env("EMBEDDING_MODEL")
                .unwrap_or_else(|| "all-MiniLM-L6-v2".to_string()),
            embedding_api_key: optional_env("EMBEDDING_API_KEY"),
            embedding_dimension: parse_env("EMBEDDING_DIMENSION", 384usize)?,

            chunk_size,
            chunk_overlap,

            jwt_secret: require_env("JWT_SECRET_KEY")?,
            access_token_expire_minutes: parse_env("ACCESS_TOKEN_EXPIRE_MINUTES", 60i64)?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Returns the variable if it is set and non-blank.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key} has an invalid value '{raw}': {e}")),
        None => Ok(default),
    }
}
