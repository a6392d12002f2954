//! `warden embed`: show the hash embedding of a text.

use warden_core::EmbeddingProvider;
use warden_memory::HashEmbedding;

use super::{CliResult, load_config};

pub async fn run(text: &str, dimension: Option<usize>) -> CliResult {
    let dimension = match dimension {
        Some(d) => d,
        None => load_config()?.vector_store.dimension,
    };
    let embedder = HashEmbedding::new(dimension);
    let vector = embedder.embed(text);

    let non_zero = vector.iter().filter(|v| **v != 0.0).count();
    println!("🔢 {} ({} dims, {non_zero} non-zero)", embedder.name(), vector.len());
    println!("{}", serde_json::to_string(&vector)?);
    Ok(())
}
