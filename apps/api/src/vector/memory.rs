//! In-process vector index. Used when no Qdrant endpoint is configured;
//! contents are lost on restart.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::vector::index::{PayloadFilter, ScoredPoint, VectorIndex, VectorPoint};
use crate::vector::VectorStoreError;

const COLLECTION_NAME: &str = "in-memory";

struct Collection {
    dimension: usize,
    points: HashMap<Uuid, VectorPoint>,
}

#[derive(Default)]
pub struct MemoryIndex {
    collection: RwLock<Option<Collection>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn ensure_collection(&self, dimension: usize) -> Result<bool, VectorStoreError> {
        let mut guard = self.collection.write().await;
        match guard.as_ref() {
            Some(existing) if existing.dimension != dimension => Err(VectorStoreError::Dimension {
                expected: existing.dimension,
                actual: dimension,
            }),
            Some(_) => Ok(false),
            None => {
                *guard = Some(Collection {
                    dimension,
                    points: HashMap::new(),
                });
                Ok(true)
            }
        }
    }

    async fn upsert(&self, points: Vec<VectorPoint>) -> Result<(), VectorStoreError> {
        let mut guard = self.collection.write().await;
        let collection = guard
            .as_mut()
            .ok_or_else(|| VectorStoreError::MissingCollection(COLLECTION_NAME.to_string()))?;

        if let Some(bad) = points.iter().find(|p| p.vector.len() != collection.dimension) {
            return Err(VectorStoreError::Dimension {
                expected: collection.dimension,
                actual: bad.vector.len(),
            });
        }
        for point in points {
            collection.points.insert(point.id, point);
        }
        Ok(())
    }

    async fn search(
        &self,
        vector: Vec<f32>,
        filter: Option<&PayloadFilter>,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, VectorStoreError> {
        let guard = self.collection.read().await;
        let collection = guard
            .as_ref()
            .ok_or_else(|| VectorStoreError::MissingCollection(COLLECTION_NAME.to_string()))?;
        if vector.len() != collection.dimension {
            return Err(VectorStoreError::Dimension {
                expected: collection.dimension,
                actual: vector.len(),
            });
        }

        let mut scored: Vec<ScoredPoint> = collection
            .points
            .values()
            .filter(|p| filter.map_or(true, |f| f.matches(&p.payload)))
            .map(|p| ScoredPoint {
                score: cosine_similarity(&vector, &p.vector),
                payload: p.payload.clone(),
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn delete(&self, filter: &PayloadFilter) -> Result<(), VectorStoreError> {
        if let Some(collection) = self.collection.write().await.as_mut() {
            collection.points.retain(|_, p| !filter.matches(&p.payload));
        }
        Ok(())
    }
}

/// Cosine similarity; zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
