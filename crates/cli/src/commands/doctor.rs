//! `warden doctor`: diagnose configuration and backend health.

use warden_config::AppConfig;
use warden_consolidation::RuleSet;
use warden_core::VectorStore;
use warden_memory::QdrantClient;
use warden_router::SafetyEvaluator;

use super::{CliResult, load_registry, registry_path};

pub async fn run() -> CliResult {
    println!("🩺 Warden Doctor");
    println!("================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  ⚠️  No config file, using defaults (run `warden init`)");
        issues += 1;
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  Fix the config file before running further checks.");
            return Ok(());
        }
    };

    match registry_path(None, &config) {
        Some(path) => match load_registry(&path) {
            Ok(registry) => {
                let enabled = registry.enabled().count();
                println!("  ✅ Tool registry: {} tools ({enabled} enabled)", registry.len());
            }
            Err(e) => {
                println!("  ❌ {e}");
                issues += 1;
            }
        },
        None => {
            println!("  ⚠️  No `registry_path` configured");
            issues += 1;
        }
    }

    match SafetyEvaluator::from_config(&config.safety) {
        Ok(evaluator) => println!("  ✅ Safety rules: {}", evaluator.rules().len()),
        Err(e) => {
            println!("  ❌ Safety rules: {e}");
            issues += 1;
        }
    }

    match RuleSet::from_config(&config.consolidation) {
        Ok(rules) => println!("  ✅ Consolidation rules: {}", rules.len()),
        Err(e) => {
            println!("  ❌ Consolidation rules: {e}");
            issues += 1;
        }
    }

    match QdrantClient::new(&config.vector_store) {
        Ok(client) => {
            if client.health_check().await {
                println!("  ✅ Qdrant reachable at {}", config.vector_store.url);
                match client.connect().await {
                    Ok(()) => println!(
                        "  ✅ Collection '{}' ready ({} dims)",
                        client.collection(),
                        client.dimension()
                    ),
                    Err(e) => {
                        println!("  ❌ Collection '{}': {e}", client.collection());
                        issues += 1;
                    }
                }
            } else {
                println!(
                    "  ⚠️  Qdrant unreachable at {}; long-term memory will be unavailable",
                    config.vector_store.url
                );
                issues += 1;
            }
        }
        Err(e) => {
            println!("  ❌ Qdrant client: {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
