//! Consolidation actions.
//!
//! ```text
//! promote to long-term
//! promote to long-term with tags[reviewed, project-x]
//! log to episodic
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a rule does to a matching entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    /// Move the entry to long-term memory, first appending `tags` to
    /// `metadata.tags` (deduplicated).
    Promote { tags: Vec<String> },
    /// Copy the entry into long-term memory flagged `episodic = true` and
    /// mark the short-term entry with the same flag.
    LogEpisodic,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Promote { tags } if tags.is_empty() => f.write_str("promote to long-term"),
            Action::Promote { tags } => {
                write!(f, "promote to long-term with tags[{}]", tags.join(", "))
            }
            Action::LogEpisodic => f.write_str("log to episodic"),
        }
    }
}

/// Parse an action string. The verb phrases `promote to long-term` and
/// `log to episodic` may appear anywhere, case-insensitively, outside the
/// tag list. An action naming both or neither is rejected.
pub fn parse_action(input: &str) -> Result<Action, String> {
    let lowered = input.trim().to_ascii_lowercase();
    let verbs = match lowered.find("tags[") {
        Some(start) => &lowered[..start],
        None => lowered.as_str(),
    };

    let promote = ["promote to long-term", "promote to long_term"]
        .iter()
        .any(|p| verbs.contains(p));
    let log = verbs.contains("log to episodic");

    match (promote, log) {
        (true, true) => Err(format!(
            "action '{input}' names both promote and log; split it into two rules"
        )),
        (true, false) => Ok(Action::Promote {
            tags: parse_tags(input.trim())?,
        }),
        (false, true) => Ok(Action::LogEpisodic),
        (false, false) => Err(format!(
            "unknown action '{input}'; expected 'promote to long-term' or 'log to episodic'"
        )),
    }
}

/// Extract `tags[a, b]` if present. Tags keep their original case.
fn parse_tags(input: &str) -> Result<Vec<String>, String> {
    let Some(start) = input.to_ascii_lowercase().find("tags[") else {
        return Ok(Vec::new());
    };
    let body = &input[start + "tags[".len()..];
    let Some(end) = body.find(']') else {
        return Err(format!("unterminated tag list in '{input}'"));
    };

    let mut tags: Vec<String> = Vec::new();
    for tag in body[..end].split(',') {
        let tag = tag.trim().trim_matches(|c: char| c == '"' || c == '\'').trim();
        if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    Ok(tags)
}
