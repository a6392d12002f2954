//! Consolidation rule model: rules as written and rules compiled for
//! evaluation.

use serde::Deserialize;
use std::path::Path;
use warden_config::{ConsolidationConfig, ConsolidationRuleConfig};
use warden_core::{MemoryEntry, RuleError};

use crate::ConsolidationError;
use crate::action::{Action, parse_action};
use crate::parser::{Condition, parse_condition};

/// A rule with its condition and action parsed.
#[derive(Debug, Clone)]
pub struct ConsolidationRule {
    pub name: String,
    /// The condition as written.
    pub condition_source: String,
    condition: Condition,
    action: Action,
}

impl ConsolidationRule {
    /// Parse and validate a rule. Fails on an empty name or a malformed
    /// condition or action.
    pub fn new(
        name: impl Into<String>,
        condition: &str,
        action: &str,
    ) -> Result<Self, ConsolidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ConsolidationError::InvalidRule {
                name: "(empty)".into(),
                reason: "rule name cannot be empty".into(),
            });
        }

        let parsed_condition = parse_condition(condition).map_err(|detail| RuleError::Parse {
            rule: name.clone(),
            detail,
        })?;
        let parsed_action = parse_action(action).map_err(|detail| RuleError::Parse {
            rule: name.clone(),
            detail,
        })?;

        Ok(Self {
            name,
            condition_source: condition.to_string(),
            condition: parsed_condition,
            action: parsed_action,
        })
    }

    pub fn from_config(config: &ConsolidationRuleConfig) -> Result<Self, ConsolidationError> {
        Self::new(&config.name, &config.condition, &config.action)
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn matches(&self, entry: &MemoryEntry) -> bool {
        self.condition.evaluate(entry)
    }
}

/// An ordered list of compiled rules.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<ConsolidationRule>,
}

/// On-disk form: a list of `[[rules]]` tables.
#[derive(Deserialize)]
struct RuleFile {
    #[serde(default)]
    rules: Vec<ConsolidationRuleConfig>,
}

impl RuleSet {
    pub fn new(rules: Vec<ConsolidationRule>) -> Self {
        Self { rules }
    }

    /// Built-in rules: promote important entries, log events and
    /// incidents to the episodic layer.
    pub fn defaults() -> Self {
        let builtin = [
            (
                "promote-important",
                "importance >= 0.7 AND layer == 'short-term'",
                "promote to long-term",
            ),
            (
                "log-events",
                "type == event OR type == incident",
                "log to episodic",
            ),
            (
                "keep-preferences",
                "type == preference AND importance >= 0.5",
                "promote to long-term with tags[preference]",
            ),
        ];

        let rules = builtin
            .into_iter()
            .filter_map(|(name, condition, action)| {
                match ConsolidationRule::new(name, condition, action) {
                    Ok(rule) => Some(rule),
                    Err(e) => {
                        tracing::error!(error = %e, "Built-in consolidation rule failed to parse");
                        None
                    }
                }
            })
            .collect();
        Self { rules }
    }

    /// Load rules from a TOML string of `[[rules]]` tables.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConsolidationError> {
        let file: RuleFile = toml::from_str(toml_str)?;
        let rules = file
            .rules
            .iter()
            .map(ConsolidationRule::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn from_file(path: &Path) -> Result<Self, ConsolidationError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Built-in rules (unless disabled) followed by configured ones.
    pub fn from_config(config: &ConsolidationConfig) -> Result<Self, ConsolidationError> {
        let mut set = if config.use_default_rules {
            Self::defaults()
        } else {
            Self::default()
        };
        for rule in &config.rules {
            set.add(ConsolidationRule::from_config(rule)?);
        }
        Ok(set)
    }

    pub fn add(&mut self, rule: ConsolidationRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[ConsolidationRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
