//! Memory consolidation: declarative rules that move short-term entries
//! into long-term or episodic memory.
//!
//! Rules pair a condition over an entry with an action:
//!
//! ```toml
//! [[rules]]
//! name = "promote-important"
//! condition = "importance >= 0.7 AND layer == 'short-term'"
//! action = "promote to long-term with tags[reviewed]"
//!
//! [[rules]]
//! name = "log-events"
//! condition = "type == event"
//! action = "log to episodic"
//! ```
//!
//! Conditions and actions are parsed when a rule is loaded; a malformed
//! rule never reaches the engine.

mod action;
mod engine;
mod model;
mod parser;

pub use action::{Action, parse_action};
pub use engine::{ConsolidationEngine, ConsolidationReport, RuleFailure};
pub use model::{ConsolidationRule, RuleSet};
pub use parser::{CompareOp, Comparison, Condition, Field, Literal, parse_condition};

/// Errors from loading consolidation rules.
#[derive(Debug, thiserror::Error)]
pub enum ConsolidationError {
    #[error(transparent)]
    Rule(#[from] warden_core::RuleError),

    #[error("invalid rule '{name}': {reason}")]
    InvalidRule { name: String, reason: String },

    #[error("rule file error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}
