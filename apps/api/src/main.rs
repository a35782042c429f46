mod agent;
mod applications;
mod auth;
mod config;
mod db;
mod errors;
mod llm_client;
mod models;
mod resumes;
mod retry;
mod routes;
mod state;
mod vector;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::agent::orchestrator::QuestionAnswerer;
use crate::agent::tools::{RetrievalTool, SqlResumeTool, VectorSearchTool};
use crate::auth::jwt::JwtService;
use crate::config::{Config, RetrievalBackend};
use crate::db::{create_pool, run_migrations};
use crate::llm_client::LlmClient;
use crate::retry::RetryPolicy;
use crate::routes::build_router;
use crate::state::AppState;
use crate::vector::chunking::ChunkingConfig;
use crate::vector::embeddings::EmbeddingClient;
use crate::vector::index::VectorIndex;
use crate::vector::memory::MemoryIndex;
use crate::vector::qdrant::QdrantIndex;
use crate::vector::ResumeVectorStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_CRATE_NAME"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resume Agent API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    run_migrations(&db).await?;

    // Initialize LLM clients (answering + extraction share one connection pool)
    let llm = LlmClient::new(
        config.llm_api_key.clone(),
        &config.llm_base_url,
        config.llm_model.clone(),
        config.llm_temperature,
    )?;
    let extraction_llm = llm.with_model(config.llm_extraction_model.clone(), 0.0);
    info!(
        "LLM client initialized (model: {}, extraction model: {})",
        llm.model(),
        extraction_llm.model()
    );

    // Initialize vector store
    let vector_store = Arc::new(build_vector_store(&config)?);
    if let Err(e) = vector_store.ensure_collection().await {
        if config.retrieval_backend == RetrievalBackend::Vector {
            return Err(e.into());
        }
        warn!("Vector store unavailable at startup: {e}");
    }

    // Initialize question answering with the configured retrieval backend
    let retry_policy = RetryPolicy::new(
        config.qa_max_attempts,
        config.qa_initial_delay,
        config.qa_timeout,
    );
    let tool: Arc<dyn RetrievalTool> = match config.retrieval_backend {
        RetrievalBackend::Sql => Arc::new(SqlResumeTool::new(db.clone())),
        RetrievalBackend::Vector => Arc::new(VectorSearchTool::new(vector_store.clone())),
    };
    let answerer = Arc::new(QuestionAnswerer::new(Arc::new(llm), tool, retry_policy));
    info!(
        "Question answering uses the {} backend (tool: {}, {} attempts, {:?} timeout)",
        config.retrieval_backend,
        answerer.tool_name(),
        retry_policy.max_attempts,
        retry_policy.timeout
    );

    // Build app state
    let state = AppState {
        db,
        extraction_llm,
        answerer,
        vector_store,
        jwt: JwtService::new(&config.jwt_secret, config.access_token_expire_minutes),
        retry_policy,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Qdrant when `QDRANT_URL` is set, otherwise an in-process index.
fn build_vector_store(config: &Config) -> Result<ResumeVectorStore> {
    let index: Arc<dyn VectorIndex> = match &config.qdrant_url {
        Some(url) => {
            info!(
                "Vector index: Qdrant at {url} (collection '{}')",
                config.qdrant_collection
            );
            Arc::new(QdrantIndex::new(
                url,
                config.qdrant_api_key.clone(),
                config.qdrant_collection.clone(),
            )?)
        }
        None => {
            warn!("QDRANT_URL not set; using the in-process vector index (not persisted)");
            Arc::new(MemoryIndex::new())
        }
    };

    let embedder = Arc::new(EmbeddingClient::new(
        config.embedding_url.clone(),
        config.embedding_model.clone(),
        config.embedding_api_key.clone(),
        config.embedding_dimension,
    )?);
    let chunking = ChunkingConfig::new(config.chunk_size, config.chunk_overlap)?;

    Ok(ResumeVectorStore::new(index, embedder, chunking))
}
