//! Qdrant REST backend.
//!
//! Endpoints used:
//!   GET  /collections/{name}                 existence check
//!   PUT  /collections/{name}                 create (cosine distance)
//!   PUT  /collections/{name}/index           keyword index on metadata.user_id
//!   PUT  /collections/{name}/points          upsert
//!   POST /collections/{name}/points/search   filtered nearest-neighbour search
//!   POST /collections/{name}/points/delete   delete by filter

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::vector::index::{PayloadFilter, ScoredPoint, VectorIndex, VectorPoint};
use crate::vector::{ChunkPayload, VectorStoreError};

const USER_ID_FIELD: &str = "metadata.user_id";
const SOURCE_FIELD: &str = "metadata.source";
const CHUNK_INDEX_FIELD: &str = "metadata.chunk_index";

pub struct QdrantIndex {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    collection: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    result: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    score: f32,
    payload: Option<ChunkPayload>,
}

impl QdrantIndex {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        collection: String,
    ) -> Result<Self, VectorStoreError> {
        Ok(Self {
            client: Client::builder().timeout(Duration::from_secs(30)).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            collection,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/collections/{}{}", self.base_url, self.collection, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("api-key", key),
            None => request,
        }
    }

    async fn collection_exists(&self) -> Result<bool, VectorStoreError> {
        let response = self.authorized(self.client.get(self.url(""))).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            _ => Err(backend_error(response).await),
        }
    }

    async fn create_user_index(&self) -> Result<(), VectorStoreError> {
        let response = self
            .authorized(self.client.put(self.url("/index?wait=true")))
            .json(&json!({ "field_name": USER_ID_FIELD, "field_schema": "keyword" }))
            .send()
            .await?;
        if response.status().is_success() {
            return Ok(());
        }
        match backend_error(response).await {
            VectorStoreError::Backend { message, .. } if is_already_exists(&message) => Ok(()),
            other => Err(other),
        }
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn ensure_collection(&self, dimension: usize) -> Result<bool, VectorStoreError> {
        let created = if self.collection_exists().await? {
            false
        } else {
            let response = self
                .authorized(self.client.put(self.url("")))
                .json(&json!({ "vectors": { "size": dimension, "distance": "Cosine" } }))
                .send()
                .await?;
            if response.status().is_success() {
                info!("Created Qdrant collection '{}'", self.collection);
                true
            } else {
                // Another instance may have created it between the check and the PUT.
                match backend_error(response).await {
                    VectorStoreError::Backend { status, message }
                        if status == StatusCode::CONFLICT.as_u16() || is_already_exists(&message) =>
                    {
                        false
                    }
                    other => return Err(other),
                }
            }
        };

        self.create_user_index().await?;
        Ok(created)
    }

    async fn upsert(&self, points: Vec<VectorPoint>) -> Result<(), VectorStoreError> {
        if points.is_empty() {
            return Ok(());
        }
        let body = json!({
            "points": points
                .iter()
                .map(|p| json!({ "id": p.id, "vector": p.vector, "payload": p.payload }))
                .collect::<Vec<_>>()
        });
        let response = self
            .authorized(self.client.put(self.url("/points?wait=true")))
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(backend_error(response).await);
        }
        debug!("Upserted {} points into '{}'", points.len(), self.collection);
        Ok(())
    }

    async fn search(
        &self,
        vector: Vec<f32>,
        filter: Option<&PayloadFilter>,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, VectorStoreError> {
        let mut body = json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
        });
        if let Some(filter) = filter {
            body["filter"] = filter_json(filter);
        }

        let response = self
            .authorized(self.client.post(self.url("/points/search")))
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(backend_error(response).await);
        }

        let parsed: SearchResponse = response.json().await?;
        Ok(parsed
            .result
            .into_iter()
            .filter_map(|r| {
                r.payload.map(|payload| ScoredPoint {
                    score: r.score,
                    payload,
                })
            })
            .collect())
    }

    async fn delete(&self, filter: &PayloadFilter) -> Result<(), VectorStoreError> {
        let response = self
            .authorized(self.client.post(self.url("/points/delete?wait=true")))
            .json(&json!({ "filter": filter_json(filter) }))
            .send()
            .await?;
        match response.status() {
            // Nothing to delete if the collection was never created.
            StatusCode::NOT_FOUND => Ok(()),
            status if status.is_success() => Ok(()),
            _ => Err(backend_error(response).await),
        }
    }
}

fn filter_json(filter: &PayloadFilter) -> Value {
    let mut must = vec![json!({ "key": USER_ID_FIELD, "match": { "value": filter.user_id } })];
    if let Some(source) = &filter.source {
        must.push(json!({ "key": SOURCE_FIELD, "match": { "value": source } }));
    }
    if let Some(min) = filter.min_chunk_index {
        must.push(json!({ "key": CHUNK_INDEX_FIELD, "range": { "gte": min } }));
    }
    json!({ "must": must })
}

fn is_already_exists(message: &str) -> bool {
    message.to_ascii_lowercase().contains("already exists")
}

async fn backend_error(response: Response) -> VectorStoreError {
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    VectorStoreError::Backend { status, message }
}
