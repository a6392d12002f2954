//! In-memory vector store. Useful for tests, offline runs, and the CLI when
//! no Qdrant instance is configured.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use warden_core::{Metadata, SearchFilter, VectorHit, VectorStore, VectorStoreError};

use crate::vector::rank_points;

type Points = HashMap<String, (Vec<f32>, Metadata)>;

/// A vector store that keeps points in a map and ranks them by cosine
/// similarity.
///
/// [`set_available`](Self::set_available) simulates an outage: while
/// unavailable every call fails with [`VectorStoreError::Unavailable`]
/// and `health_check` reports false.
pub struct InMemoryVectorStore {
    dimension: usize,
    points: Arc<RwLock<Points>>,
    available: AtomicBool,
}

impl InMemoryVectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            points: Arc::new(RwLock::new(HashMap::new())),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Number of stored points.
    pub async fn len(&self) -> usize {
        self.points.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.points.read().await.is_empty()
    }

    /// Payload stored under `id`, if any.
    pub async fn payload(&self, id: &str) -> Option<Metadata> {
        self.points.read().await.get(id).map(|(_, p)| p.clone())
    }

    fn ensure_available(&self) -> Result<(), VectorStoreError> {
        if self.is_available() {
            Ok(())
        } else {
            Err(VectorStoreError::Unavailable("in-memory store is offline".into()))
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new(crate::embedding::DEFAULT_DIMENSION)
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn connect(&self) -> Result<(), VectorStoreError> {
        self.ensure_available()
    }

    async fn disconnect(&self) -> Result<(), VectorStoreError> {
        Ok(())
    }

    async fn health_check(&self) -> bool {
        self.is_available()
    }

    async fn upsert(
        &self,
        id: &str,
        vector: Vec<f32>,
        payload: Metadata,
    ) -> Result<(), VectorStoreError> {
        self.ensure_available()?;
        if vector.len() != self.dimension {
            return Err(VectorStoreError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        self.points
            .write()
            .await
            .insert(id.to_string(), (vector, payload));
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<VectorHit>, VectorStoreError> {
        self.ensure_available()?;
        let points = self.points.read().await;
        Ok(rank_points(points.iter(), vector, limit, filter))
    }

    async fn delete(&self, id: &str) -> Result<(), VectorStoreError> {
        self.ensure_available()?;
        self.points.write().await.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(key: &str) -> Metadata {
        let mut p = Metadata::new();
        p.insert("key".into(), json!(key));
        p
    }

    #[tokio::test]
    async fn upsert_and_search() {
        let store = InMemoryVectorStore::new(2);
        store.upsert("a", vec![1.0, 0.0], payload("a")).await.unwrap();
        store.upsert("b", vec![0.0, 1.0], payload("b")).await.unwrap();

        let hits = store.search(&[1.0, 0.1], 1, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");
        assert_eq!(hits[0].payload["key"], "a");
    }

    #[tokio::test]
    async fn upsert_replaces_existing_point() {
        let store = InMemoryVectorStore::new(2);
        store.upsert("a", vec![1.0, 0.0], payload("first")).await.unwrap();
        store.upsert("a", vec![1.0, 0.0], payload("second")).await.unwrap();
        assert_eq!(store.len().await, 1);
        assert_eq!(store.payload("a").await.unwrap()["key"], "second");
    }

    #[tokio::test]
    async fn rejects_wrong_dimension() {
        let store = InMemoryVectorStore::new(3);
        let err = store.upsert("a", vec![1.0], Metadata::new()).await.unwrap_err();
        assert!(matches!(
            err,
            VectorStoreError::DimensionMismatch { expected: 3, actual: 1 }
        ));
    }

    #[tokio::test]
    async fn delete_removes_point() {
        let store = InMemoryVectorStore::new(2);
        store.upsert("a", vec![1.0, 0.0], Metadata::new()).await.unwrap();
        store.delete("a").await.unwrap();
        assert!(store.is_empty().await);
        // Deleting a missing id is not an error
        store.delete("a").await.unwrap();
    }

    #[tokio::test]
    async fn outage_fails_every_call() {
        let store = InMemoryVectorStore::new(2);
        store.set_available(false);

        assert!(!store.health_check().await);
        assert!(store.connect().await.is_err());
        assert!(store.upsert("a", vec![1.0, 0.0], Metadata::new()).await.is_err());
        assert!(store.search(&[1.0, 0.0], 5, None).await.is_err());

        store.set_available(true);
        assert!(store.health_check().await);
        assert!(store.connect().await.is_ok());
    }
}
