//! Resume vector store: embeds resume chunks per user and serves filtered
//! similarity search over them.
//!
//! The backing index is pluggable (`VectorIndex`): Qdrant in production, an
//! in-process index when no Qdrant endpoint is configured.

pub mod chunking;
pub mod embeddings;
pub mod handlers;
pub mod index;
pub mod loader;
pub mod memory;
pub mod qdrant;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::vector::chunking::ChunkingConfig;
use crate::vector::embeddings::Embedder;
use crate::vector::index::{PayloadFilter, VectorIndex, VectorPoint};

#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Vector backend error (status {status}): {message}")]
    Backend { status: u16, message: String },

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Expected {expected}-dimensional vectors, got {actual}")]
    Dimension { expected: usize, actual: usize },

    #[error("Collection '{0}' does not exist")]
    MissingCollection(String),

    #[error("Could not load document: {0}")]
    Load(String),

    #[error("Document contains no text")]
    EmptyDocument,

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Payload stored alongside each vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub text: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub user_id: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub source: String,
    /// Zero-based page the chunk was cut from.
    pub page: usize,
}

/// A document ready for chunking: extracted text per page.
#[derive(Debug, Clone)]
pub struct ResumeDocument {
    pub source: String,
    pub pages: Vec<String>,
}

impl ResumeDocument {
    /// Splits extracted text into pages on form feeds.
    pub fn from_text(source: impl Into<String>, text: &str) -> Self {
        Self {
            source: source.into(),
            pages: text.split('\u{c}').map(str::to_string).collect(),
        }
    }

    fn is_blank(&self) -> bool {
        self.pages.iter().all(|p| p.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub score: f32,
    pub text: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreReport {
    pub source: String,
    pub chunks_stored: usize,
}

pub struct ResumeVectorStore {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    chunking: ChunkingConfig,
}

impl ResumeVectorStore {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            index,
            embedder,
            chunking,
        }
    }

    /// Creates the collection and its user-id index if they are missing.
    /// Safe to call any number of times.
    pub async fn ensure_collection(&self) -> Result<(), VectorStoreError> {
        let created = self
            .index
            .ensure_collection(self.embedder.dimension())
            .await?;
        if created {
            info!("Vector collection created (dimension {})", self.embedder.dimension());
        } else {
            debug!("Vector collection already exists");
        }
        Ok(())
    }

    /// Chunks, embeds and upserts a document for `user_id`.
    ///
    /// Point ids are derived from (user, source, chunk index), and earlier
    /// chunks of the same user and source are removed first, so storing the
    /// same document again replaces it instead of duplicating it.
    pub async fn store(
        &self,
        document: &ResumeDocument,
        user_id: &str,
    ) -> Result<StoreReport, VectorStoreError> {
        if document.is_blank() {
            return Err(VectorStoreError::EmptyDocument);
        }
        self.ensure_collection().await?;

        let pieces: Vec<(usize, String)> = document
            .pages
            .iter()
            .enumerate()
            .flat_map(|(page, text)| {
                self.chunking
                    .split(text)
                    .into_iter()
                    .map(move |chunk| (page, chunk))
            })
            .collect();
        let total_chunks = pieces.len();
        info!(
            "Split '{}' into {} chunks for user {}",
            document.source, total_chunks, user_id
        );

        let texts: Vec<String> = pieces.iter().map(|(_, text)| text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != total_chunks {
            return Err(VectorStoreError::Embedding(format!(
                "requested {} embeddings, received {}",
                total_chunks,
                vectors.len()
            )));
        }

        let points: Vec<VectorPoint> = pieces
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(chunk_index, ((page, text), vector))| VectorPoint {
                id: point_id(user_id, &document.source, chunk_index),
                vector,
                payload: ChunkPayload {
                    text,
                    metadata: ChunkMetadata {
                        user_id: user_id.to_string(),
                        chunk_index,
                        total_chunks,
                        source: document.source.clone(),
                        page,
                    },
                },
            })
            .collect();

        // Point ids are positional, so the upsert overwrites the previous
        // version in place; only chunks past the new end are left to drop.
        self.index.upsert(points).await?;
        self.index
            .delete(
                &PayloadFilter::user(user_id)
                    .with_source(&document.source)
                    .from_chunk(total_chunks),
            )
            .await?;

        info!(
            "Stored {} chunks of '{}' for user {}",
            total_chunks, document.source, user_id
        );
        Ok(StoreReport {
            source: document.source.clone(),
            chunks_stored: total_chunks,
        })
    }

    /// Top-`limit` chunks most similar to `query`, best first.
    /// With `user_id` set, only that user's chunks are considered.
    pub async fn search(
        &self,
        query: &str,
        user_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchHit>, VectorStoreError> {
        if query.trim().is_empty() {
            return Err(VectorStoreError::InvalidQuery(
                "query cannot be empty".to_string(),
            ));
        }
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut vectors = self.embedder.embed(&[query.to_string()]).await?;
        let vector = vectors
            .pop()
            .ok_or_else(|| VectorStoreError::Embedding("no embedding returned".to_string()))?;

        let filter = user_id.map(PayloadFilter::user);
        let mut points = self.index.search(vector, filter.as_ref(), limit).await?;
        points.sort_by(|a, b| b.score.total_cmp(&a.score));
        points.truncate(limit);

        debug!("Vector search returned {} hits", points.len());
        Ok(points
            .into_iter()
            .map(|p| SearchHit {
                score: p.score,
                text: p.payload.text,
                metadata: p.payload.metadata,
            })
            .collect())
    }

    /// Removes every chunk tagged with `user_id`.
    pub async fn delete_user(&self, user_id: &str) -> Result<(), VectorStoreError> {
        self.index.delete(&PayloadFilter::user(user_id)).await?;
        info!("Deleted vector chunks for user {user_id}");
        Ok(())
    }
}

fn point_id(user_id: &str, source: &str, chunk_index: usize) -> Uuid {
    Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        format!("{user_id}\u{0}{source}\u{0}{chunk_index}").as_bytes(),
    )
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;

    use super::embeddings::Embedder;
    use super::VectorStoreError;

    /// Deterministic bag-of-words embedder: each word bumps one of `dim` buckets.
    pub struct HashEmbedder {
        pub dim: usize,
    }

    #[async_trait]
    impl Embedder for HashEmbedder {
        fn dimension(&self) -> usize {
            self.dim
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, VectorStoreError> {
            Ok(texts
                .iter()
                .map(|text| {
                    let mut v = vec![0.0f32; self.dim];
                    for word in text.split_whitespace() {
                        let word = word.to_lowercase();
                        let bucket = word
                            .bytes()
                            .fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize));
                        v[bucket % self.dim] += 1.0;
                    }
                    v
                })
                .collect())
        }
    }
}
