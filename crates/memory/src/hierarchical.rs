//! Hierarchical memory: an in-process short-term map in front of a
//! long-term vector store.
//!
//! Short-term writes never touch the network. Long-term and episodic
//! writes embed the content and upsert it; episodic entries are long-term
//! points whose payload carries `episodic = true`.
//!
//! The short-term map sits behind a synchronous lock that is never held
//! across an `.await`.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};
use warden_core::{
    EmbeddingProvider, LongTermStatus, MemoryEntry, MemoryError, MemoryLayer, MemoryStats,
    Metadata, SearchFilter, VectorHit, VectorStore, VectorStoreError,
};

/// Payload fields owned by the store. Caller metadata cannot override them.
const RESERVED_FIELDS: [&str; 4] = ["key", "content", "layer", "storedAt"];

pub struct HierarchicalMemory {
    short_term: RwLock<HashMap<String, MemoryEntry>>,
    vector_store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    connected: AtomicBool,
}

impl HierarchicalMemory {
    pub fn new(vector_store: Arc<dyn VectorStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            short_term: RwLock::new(HashMap::new()),
            vector_store,
            embedder,
            connected: AtomicBool::new(false),
        }
    }

    /// Connect the long-term layer.
    pub async fn connect(&self) -> Result<(), MemoryError> {
        self.vector_store.connect().await?;
        self.connected.store(true, Ordering::SeqCst);
        info!(backend = self.vector_store.name(), "Long-term memory connected");
        Ok(())
    }

    pub async fn disconnect(&self) -> Result<(), MemoryError> {
        self.connected.store(false, Ordering::SeqCst);
        self.vector_store.disconnect().await?;
        info!(backend = self.vector_store.name(), "Long-term memory disconnected");
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Flip to disconnected without talking to the backend. Used when a
    /// health probe fails.
    pub(crate) fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Store `content` under `key` in `layer`.
    ///
    /// Short-term writes are last-write-wins. Long-term and episodic writes
    /// fail with [`MemoryError::NotConnected`] while the backend is down.
    pub async fn store(
        &self,
        key: &str,
        content: &str,
        layer: MemoryLayer,
        metadata: Metadata,
    ) -> Result<(), MemoryError> {
        if key.trim().is_empty() {
            return Err(MemoryError::Validation("memory key must not be empty".into()));
        }

        match layer {
            MemoryLayer::ShortTerm => {
                let entry = MemoryEntry::new(key, content, layer, metadata);
                self.write_short_term().insert(key.to_string(), entry);
                debug!(key, "Stored short-term memory");
                Ok(())
            }
            MemoryLayer::LongTerm | MemoryLayer::Episodic => {
                self.persist(key, content, layer, metadata).await
            }
        }
    }

    /// Search memories.
    ///
    /// With no `layer`, short-term matches come first followed by long-term
    /// hits, cut to `limit`; the two lists are not re-ranked against each
    /// other. Long-term failures degrade to short-term results.
    pub async fn recall(
        &self,
        query: &str,
        layer: Option<MemoryLayer>,
        limit: usize,
    ) -> Vec<MemoryEntry> {
        let mut results = match layer {
            Some(MemoryLayer::ShortTerm) => self.recall_short_term(query),
            Some(MemoryLayer::LongTerm) => self.recall_long_term(query, limit, None).await,
            Some(MemoryLayer::Episodic) => {
                let filter = SearchFilter::matching("episodic", true);
                self.recall_long_term(query, limit, Some(&filter)).await
            }
            None => {
                let mut results = self.recall_short_term(query);
                results.extend(self.recall_long_term(query, limit, None).await);
                results
            }
        };
        results.truncate(limit);
        results
    }

    /// Move a short-term entry into long-term memory.
    ///
    /// The long-term write happens first; the short-term entry is then
    /// removed only if nobody rewrote it in the meantime. A crash between
    /// the two steps leaves the entry in both layers (at-least-once).
    pub async fn promote(
        &self,
        key: &str,
        from: MemoryLayer,
        to: MemoryLayer,
    ) -> Result<(), MemoryError> {
        if from != MemoryLayer::ShortTerm || to != MemoryLayer::LongTerm {
            return Err(MemoryError::Validation(format!(
                "cannot promote from {from} to {to}; only short-term to long-term is supported"
            )));
        }

        let snapshot = self.get_short_term(key).ok_or_else(|| MemoryError::NotFound {
            key: key.to_string(),
            layer: from.to_string(),
        })?;

        self.persist(key, &snapshot.content, to, snapshot.metadata.clone())
            .await?;

        let mut short_term = self.write_short_term();
        if short_term.get(key) == Some(&snapshot) {
            short_term.remove(key);
            info!(key, "Promoted memory to long-term");
        } else {
            debug!(key, "Short-term entry changed during promotion; kept");
        }
        Ok(())
    }

    /// Remove `key` from `layer`. Returns whether a short-term entry existed;
    /// long-term deletes report `true` once the backend accepts them.
    pub async fn delete(&self, key: &str, layer: MemoryLayer) -> Result<bool, MemoryError> {
        match layer {
            MemoryLayer::ShortTerm => Ok(self.write_short_term().remove(key).is_some()),
            MemoryLayer::LongTerm | MemoryLayer::Episodic => {
                self.require_connected("delete from long-term")?;
                self.vector_store.delete(key).await?;
                Ok(true)
            }
        }
    }

    /// Merge `fields` into a short-term entry's metadata.
    pub fn annotate(&self, key: &str, fields: Metadata) -> Result<(), MemoryError> {
        let mut short_term = self.write_short_term();
        let entry = short_term.get_mut(key).ok_or_else(|| MemoryError::NotFound {
            key: key.to_string(),
            layer: MemoryLayer::ShortTerm.to_string(),
        })?;
        entry.metadata.extend(fields);
        Ok(())
    }

    /// All short-term entries, oldest first.
    pub fn short_term_entries(&self) -> Vec<MemoryEntry> {
        let mut entries: Vec<MemoryEntry> = self.read_short_term().values().cloned().collect();
        entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.key.cmp(&b.key)));
        entries
    }

    pub fn get_short_term(&self, key: &str) -> Option<MemoryEntry> {
        self.read_short_term().get(key).cloned()
    }

    pub fn stats(&self) -> MemoryStats {
        let connected = self.is_connected();
        MemoryStats {
            short_term_count: self.read_short_term().len(),
            long_term_status: if connected {
                LongTermStatus::Connected
            } else {
                LongTermStatus::Disconnected
            },
            connected,
        }
    }

    /// False while disconnected; otherwise asks the backend.
    pub async fn health_check(&self) -> bool {
        if !self.is_connected() {
            return false;
        }
        self.vector_store.health_check().await
    }

    async fn persist(
        &self,
        key: &str,
        content: &str,
        layer: MemoryLayer,
        metadata: Metadata,
    ) -> Result<(), MemoryError> {
        self.require_connected(&format!("store to {layer}"))?;

        let mut payload = metadata;
        payload.insert("key".into(), json!(key));
        payload.insert("content".into(), json!(content));
        // Episodic entries live in the long-term store; only the flag marks them.
        payload.insert("layer".into(), json!(MemoryLayer::LongTerm.as_str()));
        payload.insert("storedAt".into(), json!(Utc::now().to_rfc3339()));
        if layer == MemoryLayer::Episodic {
            payload.insert("episodic".into(), json!(true));
        }

        let vector = self.embedder.embed(content);
        self.vector_store.upsert(key, vector, payload).await?;
        debug!(key, %layer, "Stored long-term memory");
        Ok(())
    }

    fn recall_short_term(&self, query: &str) -> Vec<MemoryEntry> {
        let needle = query.to_lowercase();
        let mut matches: Vec<MemoryEntry> = self
            .read_short_term()
            .values()
            .filter(|e| {
                e.content.to_lowercase().contains(&needle) || e.key.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.key.cmp(&b.key)));
        matches
    }

    async fn recall_long_term(
        &self,
        query: &str,
        limit: usize,
        filter: Option<&SearchFilter>,
    ) -> Vec<MemoryEntry> {
        if !self.is_connected() {
            return Vec::new();
        }
        match self.search_long_term(query, limit, filter).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Long-term recall failed; returning short-term results only");
                Vec::new()
            }
        }
    }

    async fn search_long_term(
        &self,
        query: &str,
        limit: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<MemoryEntry>, VectorStoreError> {
        let vector = self.embedder.embed(query);
        let hits = self.vector_store.search(&vector, limit, filter).await?;
        let layer = if filter.is_some() {
            MemoryLayer::Episodic
        } else {
            MemoryLayer::LongTerm
        };
        Ok(hits.into_iter().map(|hit| entry_from_hit(hit, layer)).collect())
    }

    fn require_connected(&self, operation: &str) -> Result<(), MemoryError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(MemoryError::NotConnected {
                operation: operation.to_string(),
            })
        }
    }

    fn read_short_term(&self) -> RwLockReadGuard<'_, HashMap<String, MemoryEntry>> {
        self.short_term.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_short_term(&self) -> RwLockWriteGuard<'_, HashMap<String, MemoryEntry>> {
        self.short_term.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn entry_from_hit(hit: VectorHit, layer: MemoryLayer) -> MemoryEntry {
    let mut payload = hit.payload;
    let key = match payload.get("key") {
        Some(Value::String(k)) => k.clone(),
        _ => hit.id,
    };
    let content = payload
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let timestamp = payload
        .get("storedAt")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    for field in RESERVED_FIELDS {
        payload.remove(field);
    }

    MemoryEntry {
        key,
        content,
        layer,
        metadata: payload,
        timestamp,
        score: hit.score,
    }
}
