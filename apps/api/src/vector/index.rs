use async_trait::async_trait;
use uuid::Uuid;

use crate::vector::{ChunkPayload, VectorStoreError};

#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub score: f32,
    pub payload: ChunkPayload,
}

/// Exact-match conditions on chunk metadata, all of which must hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadFilter {
    pub user_id: String,
    pub source: Option<String>,
    /// Only chunks at or past this position.
    pub min_chunk_index: Option<usize>,
}

impl PayloadFilter {
    pub fn user(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            source: None,
            min_chunk_index: None,
        }
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    pub fn from_chunk(mut self, chunk_index: usize) -> Self {
        self.min_chunk_index = Some(chunk_index);
        self
    }

    pub fn matches(&self, payload: &ChunkPayload) -> bool {
        payload.metadata.user_id == self.user_id
            && self
                .source
                .as_ref()
                .map_or(true, |s| &payload.metadata.source == s)
            && self
                .min_chunk_index
                .map_or(true, |min| payload.metadata.chunk_index >= min)
    }
}

/// Storage and nearest-neighbour search over embedded chunks (cosine distance).
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Creates the collection if absent. Returns `true` if it was created.
    async fn ensure_collection(&self, dimension: usize) -> Result<bool, VectorStoreError>;

    async fn upsert(&self, points: Vec<VectorPoint>) -> Result<(), VectorStoreError>;

    async fn search(
        &self,
        vector: Vec<f32>,
        filter: Option<&PayloadFilter>,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, VectorStoreError>;

    async fn delete(&self, filter: &PayloadFilter) -> Result<(), VectorStoreError>;
}
