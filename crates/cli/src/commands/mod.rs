//! CLI command implementations.

pub mod consolidate;
pub mod doctor;
pub mod embed;
pub mod init;
pub mod memory;
pub mod route;
pub mod rules;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use warden_config::AppConfig;
use warden_core::{Metadata, ToolRegistry, VectorStore};
use warden_memory::{ConnectionManager, HashEmbedding, HierarchicalMemory, InMemoryVectorStore, QdrantClient};

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

pub fn load_config() -> CliResult<AppConfig> {
    AppConfig::load().map_err(|e| format!("Failed to load config: {e}").into())
}

/// Resolve a registry path. Relative paths from the config file are taken
/// relative to the config directory; paths from the command line are used
/// as given.
pub fn registry_path(cli_path: Option<&str>, config: &AppConfig) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        return Some(PathBuf::from(path));
    }
    let configured = PathBuf::from(config.registry_path.as_deref()?);
    if configured.is_absolute() {
        Some(configured)
    } else {
        Some(AppConfig::config_dir().join(configured))
    }
}

/// Parse a registry file: `.json` as JSON, anything else as TOML.
pub fn parse_registry(path: &Path, content: &str) -> Result<ToolRegistry, warden_core::Error> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => ToolRegistry::from_json(content),
        _ => ToolRegistry::from_toml(content),
    }
}

pub fn load_registry(path: &Path) -> CliResult<ToolRegistry> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read registry {}: {e}", path.display()))?;
    parse_registry(path, &content)
        .map_err(|e| format!("Invalid registry {}: {e}", path.display()).into())
}

/// Parse `--metadata` as a JSON object.
pub fn parse_metadata(raw: Option<&str>) -> CliResult<Metadata> {
    let Some(raw) = raw else {
        return Ok(Metadata::new());
    };
    match serde_json::from_str::<serde_json::Value>(raw)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(format!("metadata must be a JSON object, got {other}").into()),
    }
}

/// Build the memory stack and run the initial connect. `offline` swaps
/// Qdrant for the in-process store.
pub async fn build_memory(config: &AppConfig, offline: bool) -> CliResult<Arc<ConnectionManager>> {
    let dimension = config.vector_store.dimension;
    let store: Arc<dyn VectorStore> = if offline {
        Arc::new(InMemoryVectorStore::new(dimension))
    } else {
        Arc::new(QdrantClient::new(&config.vector_store)?)
    };
    let memory = Arc::new(HierarchicalMemory::new(
        store,
        Arc::new(HashEmbedding::new(dimension)),
    ));

    let manager = ConnectionManager::new(memory, config.connection.clone());
    manager.initialize().await;
    Ok(manager)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_format_follows_extension() {
        let json = r#"[{"name": "github", "short_description": "Manage issues"}]"#;
        let registry = parse_registry(Path::new("tools.JSON"), json).unwrap();
        assert_eq!(registry.len(), 1);

        let toml = "[[tools]]\nname = \"github\"\nshort_description = \"Manage issues\"\n";
        let registry = parse_registry(Path::new("tools.toml"), toml).unwrap();
        assert!(registry.get("github").is_some());

        assert!(parse_registry(Path::new("tools"), json).is_err());
    }

    #[test]
    fn cli_registry_path_wins() {
        let mut config = AppConfig::default();
        config.registry_path = Some("tools.toml".into());
        assert_eq!(
            registry_path(Some("./mine.json"), &config),
            Some(PathBuf::from("./mine.json"))
        );
        assert_eq!(
            registry_path(None, &config),
            Some(AppConfig::config_dir().join("tools.toml"))
        );

        config.registry_path = None;
        assert!(registry_path(None, &config).is_none());
    }

    #[test]
    fn metadata_must_be_an_object() {
        assert!(parse_metadata(None).unwrap().is_empty());
        let meta = parse_metadata(Some(r#"{"importance": 0.8}"#)).unwrap();
        assert_eq!(meta["importance"], 0.8);
        assert!(parse_metadata(Some("[1, 2]")).is_err());
        assert!(parse_metadata(Some("{nope")).is_err());
    }

    #[tokio::test]
    async fn offline_memory_connects() {
        let mut config = AppConfig::default();
        config.vector_store.dimension = 16;
        let manager = build_memory(&config, true).await.unwrap();
        assert!(manager.is_connected());
        manager.shutdown().await;
    }
}
