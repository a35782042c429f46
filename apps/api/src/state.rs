use std::sync::Arc;

use sqlx::PgPool;

use crate::agent::orchestrator::QuestionAnswerer;
use crate::auth::jwt::JwtService;
use crate::llm_client::LlmClient;
use crate::retry::RetryPolicy;
use crate::vector::ResumeVectorStore;

/// Shared application state injected into all route handlers via Axum extractors.
/// Every service is built once in `main` and shared by reference.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Extraction model at temperature 0; same connection pool as the answerer's client.
    pub extraction_llm: LlmClient,
    /// Question answering, wired to the SQL or vector retrieval tool at startup.
    pub answerer: Arc<QuestionAnswerer>,
    pub vector_store: Arc<ResumeVectorStore>,
    pub jwt: JwtService,
    pub retry_policy: RetryPolicy,
}
