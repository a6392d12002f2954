//! Memory layer for Warden.
//!
//! - [`HierarchicalMemory`]: short-term map plus long-term vector store
//! - [`ConnectionManager`]: connect, health-check, and reconnect loop
//! - [`QdrantClient`] and [`InMemoryVectorStore`]: vector store backends
//! - [`HashEmbedding`]: the default embedding provider

pub mod connection;
pub mod embedding;
pub mod hierarchical;
pub mod in_memory;
pub mod qdrant;
pub mod vector;

pub use connection::ConnectionManager;
pub use embedding::{DEFAULT_DIMENSION, HashEmbedding};
pub use hierarchical::HierarchicalMemory;
pub use in_memory::InMemoryVectorStore;
pub use qdrant::{QdrantClient, point_id};
pub use vector::{cosine_similarity, rank_points};
