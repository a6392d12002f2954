//! `warden consolidate`: seed short-term memory from a file and run one
//! consolidation sweep.

use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use warden_consolidation::{ConsolidationEngine, RuleSet};
use warden_core::{MemoryLayer, Metadata};

use super::{CliResult, build_memory, load_config};

#[derive(Debug, Deserialize)]
struct InputEntry {
    key: String,
    content: String,
    #[serde(default)]
    metadata: Metadata,
}

fn parse_entries(content: &str) -> Result<Vec<InputEntry>, serde_json::Error> {
    serde_json::from_str(content)
}

pub async fn run(input: &str, rules: Option<&str>, offline: bool, watch: bool) -> CliResult {
    let config = load_config()?;
    if watch && config.consolidation.interval_secs == 0 {
        return Err("--watch needs consolidation.interval_secs > 0 in config.toml".into());
    }
    let content = std::fs::read_to_string(input)
        .map_err(|e| format!("Failed to read {input}: {e}"))?;
    let entries = parse_entries(&content).map_err(|e| format!("Invalid entries in {input}: {e}"))?;

    let rules = match rules {
        Some(path) => RuleSet::from_file(Path::new(path))?,
        None => RuleSet::from_config(&config.consolidation)?,
    };

    let manager = build_memory(&config, offline).await?;
    let memory = manager.memory().clone();
    for entry in entries {
        memory
            .store(&entry.key, &entry.content, MemoryLayer::ShortTerm, entry.metadata)
            .await?;
    }

    let engine = Arc::new(ConsolidationEngine::new(Arc::clone(&memory), rules));
    let report = engine.run_consolidation().await;

    println!("🧹 Consolidation");
    println!("================\n");
    println!("  Promoted: {}", report.promoted);
    println!("  Logged:   {}", report.logged);
    println!("  Skipped:  {}", report.skipped);

    if !report.errors.is_empty() {
        println!("\n  ❌ {} rule failure(s):", report.errors.len());
        for failure in &report.errors {
            println!("     {} / {}: {}", failure.key, failure.rule, failure.message);
        }
    }

    if watch {
        let interval = Duration::from_secs(config.consolidation.interval_secs);
        println!(
            "\n  👀 Sweeping every {}s; {} entries left in short-term. Ctrl+C to stop.",
            interval.as_secs(),
            memory.short_term_entries().len()
        );
        let sweeper = Arc::clone(&engine).start(interval);
        tokio::signal::ctrl_c().await?;
        sweeper.abort();
        println!("\n  Stopped.");
    }

    manager.shutdown().await;
    Ok(())
}
