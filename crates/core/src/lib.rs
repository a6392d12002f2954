//! # Warden Core
//!
//! Domain types, traits, and error definitions shared by the Warden crates.
//! This crate has **zero framework dependencies**. It defines the model that
//! the router, memory, and consolidation crates implement against.
//!
//! ## Design Philosophy
//!
//! The two seams that hosts are expected to swap live here as traits:
//! - [`EmbeddingProvider`]: text to fixed-length unit vector
//! - [`VectorStore`]: the external cosine-similarity database
//!
//! Everything else (routing decisions, memory entries, tool descriptors) is
//! plain data so it can cross crate and process boundaries as JSON.

pub mod error;
pub mod memory;
pub mod text;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, MemoryError, Result, RuleError, VectorStoreError};
pub use memory::{
    EmbeddingProvider, FieldMatch, LongTermStatus, MemoryEntry, MemoryLayer, MemoryStats,
    Metadata, SearchFilter, VectorHit, VectorStore,
};
pub use text::tokenize;
pub use tool::{RouteAction, RouteCandidate, RouteDecision, ToolDescriptor, ToolRegistry};
