//! Qdrant vector store over its REST API.
//!
//! Endpoints used:
//! - `GET  /collections` and `PUT /collections/{name}` on connect
//! - `PUT  /collections/{name}/points?wait=true` for upserts
//! - `POST /collections/{name}/points/search`
//! - `POST /collections/{name}/points/delete?wait=true`
//! - `GET  /healthz`
//!
//! Qdrant only accepts unsigned integers or UUIDs as point ids, so memory
//! keys are mapped to a name-based UUID (v5). The key itself travels in the
//! payload under `key`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use uuid::Uuid;
use warden_config::VectorStoreConfig;
use warden_core::{Metadata, SearchFilter, VectorHit, VectorStore, VectorStoreError};

/// Deterministic Qdrant point id for a memory key.
pub fn point_id(key: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes())
}

/// A Qdrant REST client bound to one collection.
pub struct QdrantClient {
    base_url: String,
    collection: String,
    dimension: usize,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl QdrantClient {
    pub fn new(config: &VectorStoreConfig) -> Result<Self, VectorStoreError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| VectorStoreError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            dimension: config.dimension,
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            client,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn points_url(&self, suffix: &str) -> String {
        self.url(&format!("/collections/{}/points{suffix}", self.collection))
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, VectorStoreError> {
        let response = builder.send().await.map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "Qdrant returned error");
            return Err(VectorStoreError::Api {
                status_code: status.as_u16(),
                message: body,
            });
        }
        Ok(response)
    }

    async fn collection_exists(&self) -> Result<bool, VectorStoreError> {
        let response = self
            .send(self.request(reqwest::Method::GET, &self.url("/collections")))
            .await?;
        let body: ApiResponse<CollectionsResult> = response
            .json()
            .await
            .map_err(|e| VectorStoreError::Decode(e.to_string()))?;

        Ok(body
            .result
            .collections
            .iter()
            .any(|c| c.name == self.collection))
    }

    async fn create_collection(&self) -> Result<(), VectorStoreError> {
        let body = json!({
            "vectors": { "size": self.dimension, "distance": "Cosine" }
        });
        let url = self.url(&format!("/collections/{}", self.collection));
        self.send(self.request(reqwest::Method::PUT, &url).json(&body))
            .await?;
        info!(collection = %self.collection, dimension = self.dimension, "Created Qdrant collection");
        Ok(())
    }
}

#[async_trait]
impl VectorStore for QdrantClient {
    fn name(&self) -> &str {
        "qdrant"
    }

    async fn connect(&self) -> Result<(), VectorStoreError> {
        if self.collection_exists().await? {
            debug!(collection = %self.collection, "Qdrant collection exists");
        } else {
            self.create_collection().await?;
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), VectorStoreError> {
        // Plain HTTP; nothing to tear down.
        Ok(())
    }

    async fn health_check(&self) -> bool {
        match self
            .send(self.request(reqwest::Method::GET, &self.url("/healthz")))
            .await
        {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "Qdrant health check failed");
                false
            }
        }
    }

    async fn upsert(
        &self,
        id: &str,
        vector: Vec<f32>,
        payload: Metadata,
    ) -> Result<(), VectorStoreError> {
        if vector.len() != self.dimension {
            return Err(VectorStoreError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let body = UpsertRequest {
            points: vec![Point {
                id: point_id(id).to_string(),
                vector,
                payload,
            }],
        };
        debug!(key = %id, collection = %self.collection, "Upserting point");
        self.send(
            self.request(reqwest::Method::PUT, &self.points_url("?wait=true"))
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<VectorHit>, VectorStoreError> {
        if vector.len() != self.dimension {
            return Err(VectorStoreError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let mut body = json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
        });
        if let Some(filter) = filter {
            body["filter"] = filter_json(filter);
        }

        let response = self
            .send(
                self.request(reqwest::Method::POST, &self.points_url("/search"))
                    .json(&body),
            )
            .await?;
        let body: ApiResponse<Vec<ScoredPoint>> = response
            .json()
            .await
            .map_err(|e| VectorStoreError::Decode(e.to_string()))?;

        Ok(body
            .result
            .into_iter()
            .map(|p| VectorHit {
                id: match p.id {
                    Value::String(s) => s,
                    other => other.to_string(),
                },
                score: p.score,
                payload: p.payload.unwrap_or_default(),
            })
            .collect())
    }

    async fn delete(&self, id: &str) -> Result<(), VectorStoreError> {
        let body = json!({ "points": [point_id(id).to_string()] });
        self.send(
            self.request(reqwest::Method::POST, &self.points_url("/delete?wait=true"))
                .json(&body),
        )
        .await?;
        Ok(())
    }
}

fn map_transport_error(e: reqwest::Error) -> VectorStoreError {
    if e.is_connect() || e.is_timeout() {
        VectorStoreError::Unavailable(e.to_string())
    } else {
        VectorStoreError::Network(e.to_string())
    }
}

fn filter_json(filter: &SearchFilter) -> Value {
    let must: Vec<Value> = filter
        .must
        .iter()
        .map(|m| json!({ "key": m.key, "match": { "value": m.value } }))
        .collect();
    json!({ "must": must })
}

// --- Qdrant API types ---

#[derive(Deserialize)]
struct ApiResponse<T> {
    result: T,
}

#[derive(Deserialize)]
struct CollectionsResult {
    #[serde(default)]
    collections: Vec<CollectionDescription>,
}

#[derive(Deserialize)]
struct CollectionDescription {
    name: String,
}

#[derive(Serialize)]
struct UpsertRequest {
    points: Vec<Point>,
}

#[derive(Serialize)]
struct Point {
    id: String,
    vector: Vec<f32>,
    payload: Metadata,
}

#[derive(Deserialize)]
struct ScoredPoint {
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Option<Metadata>,
}
