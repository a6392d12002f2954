//! Configuration loading, validation, and management for Warden.
//!
//! Loads configuration from `~/.warden/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use warden_core::RouteAction;

/// The root configuration structure.
///
/// Maps directly to `~/.warden/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the tool registry file (TOML or JSON)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_path: Option<String>,

    /// Router knobs
    #[serde(default)]
    pub router: RouterConfig,

    /// Safety rules
    #[serde(default)]
    pub safety: SafetyConfig,

    /// Vector database connection
    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    /// Health check and reconnect timing
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Memory store settings
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Consolidation rules and sweep schedule
    #[serde(default)]
    pub consolidation: ConsolidationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Run safety rules before semantic matching
    #[serde(default = "default_true")]
    pub rule_first: bool,

    /// Minimum similarity for a candidate to be considered
    #[serde(default = "default_semantic_threshold")]
    pub semantic_threshold: f32,

    /// Maximum number of candidates attached to a decision
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Decision returned when nothing matches
    #[serde(default)]
    pub fallback: RouteAction,
}

fn default_true() -> bool {
    true
}
fn default_semantic_threshold() -> f32 {
    0.3
}
fn default_top_k() -> usize {
    3
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            rule_first: true,
            semantic_threshold: default_semantic_threshold(),
            top_k: default_top_k(),
            fallback: RouteAction::RequireClarify,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// Start from the built-in rule set (custom rules are appended)
    #[serde(default = "default_true")]
    pub use_default_rules: bool,

    #[serde(default)]
    pub rules: Vec<SafetyRuleConfig>,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            use_default_rules: true,
            rules: vec![],
        }
    }
}

/// A user-defined safety rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyRuleConfig {
    /// Category name reported as the decision's matched rule
    pub category: String,

    /// Case-insensitive substrings
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Regular expressions (matched case-insensitively)
    #[serde(default)]
    pub patterns: Vec<String>,

    /// "deny" or "require_human"
    #[serde(default = "default_deny")]
    pub action: String,
}

fn default_deny() -> String {
    "deny".into()
}

#[derive(Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default = "default_vector_url")]
    pub url: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    /// Must equal the embedding provider's output length
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

fn default_vector_url() -> String {
    "http://localhost:6333".into()
}
fn default_collection() -> String {
    "warden_memory".into()
}
fn default_dimension() -> usize {
    384
}
fn default_request_timeout() -> u64 {
    10
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: default_vector_url(),
            collection: default_collection(),
            dimension: default_dimension(),
            api_key: None,
            timeout_secs: default_request_timeout(),
        }
    }
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for VectorStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStoreConfig")
            .field("url", &self.url)
            .field("collection", &self.collection)
            .field("dimension", &self.dimension)
            .field("api_key", &redact(&self.api_key))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl VectorStoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval_ms: u64,

    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
}

fn default_health_check_interval() -> u64 {
    60_000
}
fn default_reconnect_delay() -> u64 {
    5_000
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            health_check_interval_ms: default_health_check_interval(),
            reconnect_delay_ms: default_reconnect_delay(),
        }
    }
}

impl ConnectionConfig {
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Default `limit` for recall
    #[serde(default = "default_recall_limit")]
    pub recall_limit: usize,
}

fn default_recall_limit() -> usize {
    10
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            recall_limit: default_recall_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationConfig {
    /// Seconds between automatic sweeps (0 = on demand only)
    #[serde(default)]
    pub interval_secs: u64,

    /// Include the built-in promotion rules
    #[serde(default = "default_true")]
    pub use_default_rules: bool,

    #[serde(default)]
    pub rules: Vec<ConsolidationRuleConfig>,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            interval_secs: 0,
            use_default_rules: true,
            rules: vec![],
        }
    }
}

/// A consolidation rule as written in config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationRuleConfig {
    pub name: String,

    /// e.g. `importance >= 0.7 AND layer == 'short-term'`
    pub condition: String,

    /// e.g. `promote to long-term with tags[reviewed]`
    pub action: String,
}

impl AppConfig {
    /// Load configuration from the default path (~/.warden/config.toml).
    ///
    /// Environment variables override the file:
    /// - `WARDEN_QDRANT_URL`
    /// - `WARDEN_QDRANT_API_KEY` (falls back to `QDRANT_API_KEY`)
    /// - `WARDEN_COLLECTION`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("WARDEN_QDRANT_URL") {
            self.vector_store.url = url;
        }

        if self.vector_store.api_key.is_none() {
            self.vector_store.api_key = std::env::var("WARDEN_QDRANT_API_KEY")
                .ok()
                .or_else(|| std::env::var("QDRANT_API_KEY").ok());
        }

        if let Ok(collection) = std::env::var("WARDEN_COLLECTION") {
            self.vector_store.collection = collection;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".warden")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.router.semantic_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::ValidationError(
                "router.semantic_threshold must be between 0.0 and 1.0".into(),
            ));
        }

        if self.router.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "router.top_k must be at least 1".into(),
            ));
        }

        if self.router.fallback == RouteAction::Allow {
            return Err(ConfigError::ValidationError(
                "router.fallback cannot be \"allow\"".into(),
            ));
        }

        for rule in &self.safety.rules {
            if rule.category.is_empty() {
                return Err(ConfigError::ValidationError(
                    "safety rule category cannot be empty".into(),
                ));
            }
            if !matches!(rule.action.as_str(), "deny" | "require_human") {
                return Err(ConfigError::ValidationError(format!(
                    "safety rule '{}' has action '{}' (expected \"deny\" or \"require_human\")",
                    rule.category, rule.action
                )));
            }
        }

        if self.vector_store.dimension == 0 {
            return Err(ConfigError::ValidationError(
                "vector_store.dimension must be > 0".into(),
            ));
        }

        if self.vector_store.collection.is_empty() {
            return Err(ConfigError::ValidationError(
                "vector_store.collection cannot be empty".into(),
            ));
        }

        if self.connection.health_check_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "connection.health_check_interval_ms must be > 0".into(),
            ));
        }

        if self.memory.recall_limit == 0 {
            return Err(ConfigError::ValidationError(
                "memory.recall_limit must be at least 1".into(),
            ));
        }

        for rule in &self.consolidation.rules {
            if rule.name.is_empty() {
                return Err(ConfigError::ValidationError(
                    "consolidation rule name cannot be empty".into(),
                ));
            }
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.router.rule_first);
        assert_eq!(config.router.fallback, RouteAction::RequireClarify);
        assert_eq!(config.vector_store.dimension, 384);
        assert_eq!(config.connection.health_check_interval_ms, 60_000);
        assert_eq!(config.connection.reconnect_delay_ms, 5_000);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.vector_store.url, config.vector_store.url);
        assert_eq!(parsed.router.top_k, config.router.top_k);
    }

    #[test]
    fn invalid_threshold_rejected() {
        let mut config = AppConfig::default();
        config.router.semantic_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn allow_fallback_rejected() {
        let mut config = AppConfig::default();
        config.router.fallback = RouteAction::Allow;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_safety_action_rejected() {
        let mut config = AppConfig::default();
        config.safety.rules.push(SafetyRuleConfig {
            category: "custom".into(),
            keywords: vec!["launch".into()],
            patterns: vec![],
            action: "warn".into(),
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("custom"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.vector_store.collection, "warden_memory");
    }

    #[test]
    fn load_from_file_with_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
registry_path = "tools.toml"

[router]
semantic_threshold = 0.25
top_k = 5
fallback = "require_human"

[vector_store]
url = "http://qdrant:6333"
api_key = "secret"

[[safety.rules]]
category = "launch"
keywords = ["launch missiles"]
action = "deny"

[[consolidation.rules]]
name = "keep-decisions"
condition = "type == 'decision'"
action = "log to episodic"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.registry_path.as_deref(), Some("tools.toml"));
        assert_eq!(config.router.top_k, 5);
        assert_eq!(config.router.fallback, RouteAction::RequireHuman);
        assert_eq!(config.vector_store.url, "http://qdrant:6333");
        assert_eq!(config.safety.rules[0].category, "launch");
        assert_eq!(config.consolidation.rules[0].name, "keep-decisions");
        assert!(!format!("{config:?}").contains("secret"));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[router\ntop_k = ").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("localhost:6333"));
        assert!(toml_str.contains("warden_memory"));
    }
}
