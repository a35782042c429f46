//! Embedding client for OpenAI-compatible `/embeddings` endpoints
//! (text-embeddings-inference, Ollama, OpenAI, ...).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::vector::VectorStoreError;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Length of every vector this embedder produces.
    fn dimension(&self) -> usize;

    /// One vector per input text, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, VectorStoreError>;
}

pub struct EmbeddingClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    dimension: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

impl EmbeddingClient {
    pub fn new(
        endpoint: String,
        model: String,
        api_key: Option<String>,
        dimension: usize,
    ) -> Result<Self, VectorStoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            endpoint,
            model,
            api_key,
            dimension,
        })
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, VectorStoreError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut request = self.client.post(&self.endpoint).json(&EmbeddingRequest {
            input: texts,
            model: &self.model,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(VectorStoreError::Embedding(format!(
                "embedding endpoint returned {status}: {message}"
            )));
        }

        let parsed: EmbeddingResponse = response.json().await?;
        let vectors = order_embeddings(parsed.data, texts.len(), self.dimension)?;
        debug!("Embedded {} texts with {}", vectors.len(), self.model);
        Ok(vectors)
    }
}

/// Restores input order and checks count and dimension.
fn order_embeddings(
    mut data: Vec<EmbeddingData>,
    expected_count: usize,
    dimension: usize,
) -> Result<Vec<Vec<f32>>, VectorStoreError> {
    if data.len() != expected_count {
        return Err(VectorStoreError::Embedding(format!(
            "requested {expected_count} embeddings, received {}",
            data.len()
        )));
    }
    data.sort_by_key(|d| d.index);
    data.into_iter()
        .map(|d| {
            if d.embedding.len() == dimension {
                Ok(d.embedding)
            } else {
                Err(VectorStoreError::Dimension {
                    expected: dimension,
                    actual: d.embedding.len(),
                })
            }
        })
        .collect()
}
