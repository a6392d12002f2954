//! `warden memory`: store, recall, and inspect memories.

use warden_core::MemoryLayer;

use super::{CliResult, build_memory, load_config, parse_metadata};

fn parse_layer(raw: &str) -> CliResult<MemoryLayer> {
    raw.parse::<MemoryLayer>().map_err(|e| format!("{e}").into())
}

pub async fn store(
    content: &str,
    key: Option<String>,
    layer: &str,
    metadata: Option<&str>,
    offline: bool,
) -> CliResult {
    let layer = parse_layer(layer)?;
    let metadata = parse_metadata(metadata)?;
    let key = key.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let config = load_config()?;
    let manager = build_memory(&config, offline).await?;
    let result = manager.memory().store(&key, content, layer, metadata).await;
    manager.shutdown().await;
    result?;

    println!("✅ Stored in {layer}");
    println!("   Key: {key}");
    Ok(())
}

pub async fn recall(
    query: &str,
    layer: Option<&str>,
    limit: Option<usize>,
    offline: bool,
) -> CliResult {
    let layer = layer.map(parse_layer).transpose()?;
    let config = load_config()?;
    let limit = limit.unwrap_or(config.memory.recall_limit);

    let manager = build_memory(&config, offline).await?;
    let entries = manager.memory().recall(query, layer, limit).await;
    manager.shutdown().await;

    if entries.is_empty() {
        println!("🔍 No memories match \"{query}\"");
        return Ok(());
    }

    println!("🔍 {} result(s) for \"{query}\"\n", entries.len());
    for entry in &entries {
        if entry.layer.is_persistent() {
            println!("  [{}] {} ({:.3})", entry.layer, entry.key, entry.score);
        } else {
            println!("  [{}] {}", entry.layer, entry.key);
        }
        println!("      {}", entry.content);
    }
    Ok(())
}

pub async fn stats(offline: bool) -> CliResult {
    let config = load_config()?;
    let manager = build_memory(&config, offline).await?;
    let stats = manager.memory().stats();
    let healthy = manager.memory().health_check().await;
    manager.shutdown().await;

    println!("🧠 Memory");
    println!("=========\n");
    if offline {
        println!("  Backend:     in-process (offline)");
    } else {
        println!("  Backend:     qdrant at {}", config.vector_store.url);
        println!("  Collection:  {}", config.vector_store.collection);
    }
    println!("  Dimension:   {}", config.vector_store.dimension);
    println!("  Short-term:  {} entries", stats.short_term_count);
    println!(
        "  Long-term:   {}",
        if stats.connected { "connected" } else { "disconnected" }
    );
    println!("  Healthy:     {}", if healthy { "yes" } else { "no" });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_names() {
        assert_eq!(parse_layer("short-term").unwrap(), MemoryLayer::ShortTerm);
        assert_eq!(parse_layer("episodic").unwrap(), MemoryLayer::Episodic);
        assert!(parse_layer("forever").is_err());
    }
}
