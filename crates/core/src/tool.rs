//! Tool registry records and routing decisions.
//!
//! The registry is owned and loaded by the host; the router only ever reads
//! it. A [`RouteDecision`] is the router's answer for one piece of input.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Error;

/// A describable external action the router may allow, gate, or deny.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique tool name (e.g., "github", "slack-notify")
    pub name: String,

    /// Free-form tags used for matching
    #[serde(default)]
    pub tags: Vec<String>,

    /// One-line description used for matching
    #[serde(default, alias = "shortDescription")]
    pub short_description: String,

    /// Terms that, when present in the raw input, require a human
    #[serde(default, alias = "dangerousOperations")]
    pub dangerous_operations: Vec<String>,

    /// Disabled tools are never routed to
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, short_description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: Vec::new(),
            short_description: short_description.into(),
            dangerous_operations: Vec::new(),
            enabled: true,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_dangerous_operations<I, S>(mut self, ops: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dangerous_operations = ops.into_iter().map(Into::into).collect();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// A read-only list of tool descriptors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolRegistry {
    #[serde(default)]
    pub tools: Vec<ToolDescriptor>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<ToolDescriptor>) -> Self {
        Self { tools }
    }

    /// Load from TOML (`[[tools]]` tables).
    pub fn from_toml(toml_str: &str) -> Result<Self, Error> {
        toml::from_str(toml_str).map_err(|e| Error::Config {
            message: format!("invalid tool registry: {e}"),
        })
    }

    /// Load from JSON, either `{"tools": [...]}` or a bare array.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        if value.is_array() {
            Ok(Self::new(serde_json::from_value(value)?))
        } else {
            Ok(serde_json::from_value(value)?)
        }
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn enabled(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.iter().filter(|t| t.enabled)
    }

    pub fn as_slice(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// What the caller should do with the input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteAction {
    /// Proceed with the top candidate.
    Allow,
    /// Refuse outright.
    Deny,
    /// Pause for a human to confirm.
    RequireHuman,
    /// Ask the user what they meant.
    #[default]
    RequireClarify,
}

impl fmt::Display for RouteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RouteAction::Allow => "allow",
            RouteAction::Deny => "deny",
            RouteAction::RequireHuman => "require_human",
            RouteAction::RequireClarify => "require_clarify",
        })
    }
}

/// A scored registry entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteCandidate {
    pub name: String,
    pub score: f32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub short_description: String,
}

impl RouteCandidate {
    pub fn from_tool(tool: &ToolDescriptor, score: f32) -> Self {
        Self {
            name: tool.name.clone(),
            score,
            tags: tool.tags.clone(),
            short_description: tool.short_description.clone(),
        }
    }
}

/// The router's answer for one input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDecision {
    pub action: RouteAction,
    pub reason: String,
    /// Safety category or `dangerous_operation`, when a rule decided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_rule: Option<String>,
    /// Sorted candidates, attached for audit and explainability.
    #[serde(default)]
    pub candidates: Vec<RouteCandidate>,
    pub confidence: f32,
    pub timestamp: DateTime<Utc>,
}

impl RouteDecision {
    pub fn new(action: RouteAction, reason: impl Into<String>) -> Self {
        Self {
            action,
            reason: reason.into(),
            matched_rule: None,
            candidates: Vec::new(),
            confidence: 0.0,
            timestamp: Utc::now(),
        }
    }

    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.matched_rule = Some(rule.into());
        self
    }

    pub fn with_candidates(mut self, candidates: Vec<RouteCandidate>) -> Self {
        self.candidates = candidates;
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn is_allowed(&self) -> bool {
        self.action == RouteAction::Allow
    }

    /// The candidate the router would dispatch to, if any.
    pub fn top_candidate(&self) -> Option<&RouteCandidate> {
        self.candidates.first()
    }
}
