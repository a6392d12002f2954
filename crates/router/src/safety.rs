//! Safety rules: keyword and pattern overrides with deny precedence.
//!
//! Rules are checked in declaration order. A `deny` hit ends the scan
//! immediately; the first `require_human` hit is remembered but the scan
//! continues, so a later `deny` still wins.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use warden_config::{SafetyConfig, SafetyRuleConfig};
use warden_core::{RouteAction, RuleError};

/// What a matching safety rule demands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyAction {
    Deny,
    RequireHuman,
}

impl SafetyAction {
    pub fn route_action(self) -> RouteAction {
        match self {
            SafetyAction::Deny => RouteAction::Deny,
            SafetyAction::RequireHuman => RouteAction::RequireHuman,
        }
    }
}

impl FromStr for SafetyAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deny" => Ok(SafetyAction::Deny),
            "require_human" => Ok(SafetyAction::RequireHuman),
            other => Err(format!("unknown safety action: {other}")),
        }
    }
}

/// A single safety rule. Keywords are stored lowercased and patterns are
/// compiled case-insensitively at construction.
#[derive(Debug, Clone)]
pub struct SafetyRule {
    pub category: String,
    keywords: Vec<String>,
    patterns: Vec<Regex>,
    pub action: SafetyAction,
}

impl SafetyRule {
    pub fn new(
        category: impl Into<String>,
        keywords: &[&str],
        patterns: &[&str],
        action: SafetyAction,
    ) -> Result<Self, RuleError> {
        let category = category.into();
        let compiled = patterns
            .iter()
            .map(|p| {
                Regex::new(&format!("(?i){p}")).map_err(|e| RuleError::InvalidPattern {
                    rule: category.clone(),
                    detail: format!("{p}: {e}"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            keywords: keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            patterns: compiled,
            category,
            action,
        })
    }

    pub fn from_config(config: &SafetyRuleConfig) -> Result<Self, RuleError> {
        let action = config
            .action
            .parse::<SafetyAction>()
            .map_err(|detail| RuleError::Parse {
                rule: config.category.clone(),
                detail,
            })?;
        let keywords: Vec<&str> = config.keywords.iter().map(String::as_str).collect();
        let patterns: Vec<&str> = config.patterns.iter().map(String::as_str).collect();
        Self::new(config.category.clone(), &keywords, &patterns, action)
    }

    /// Returns the keyword or pattern that matched, keywords first.
    fn matched_term(&self, lowered: &str, raw: &str) -> Option<String> {
        if let Some(keyword) = self.keywords.iter().find(|k| lowered.contains(k.as_str())) {
            return Some(keyword.clone());
        }
        self.patterns
            .iter()
            .find(|re| re.is_match(raw))
            .map(|re| re.as_str().trim_start_matches("(?i)").to_string())
    }
}

/// The rule that decided, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct SafetyMatch {
    pub category: String,
    pub action: SafetyAction,
    /// The keyword or pattern that matched
    pub matched: String,
}

/// Evaluates input against an ordered rule list.
#[derive(Debug, Clone)]
pub struct SafetyEvaluator {
    rules: Vec<SafetyRule>,
}

impl SafetyEvaluator {
    pub fn new(rules: Vec<SafetyRule>) -> Self {
        Self { rules }
    }

    /// The built-in rule set.
    pub fn with_defaults() -> Self {
        Self::new(default_rules())
    }

    /// Build from configuration: built-ins (unless disabled) followed by
    /// user rules, in file order.
    pub fn from_config(config: &SafetyConfig) -> Result<Self, RuleError> {
        let mut rules = if config.use_default_rules {
            default_rules()
        } else {
            Vec::new()
        };
        for rule in &config.rules {
            rules.push(SafetyRule::from_config(rule)?);
        }
        Ok(Self::new(rules))
    }

    pub fn rules(&self) -> &[SafetyRule] {
        &self.rules
    }

    /// Check input against every rule. Returns `None` when nothing matched.
    pub fn evaluate(&self, text: &str) -> Option<SafetyMatch> {
        let lowered = text.to_lowercase();
        let mut pending: Option<SafetyMatch> = None;

        for rule in &self.rules {
            let Some(matched) = rule.matched_term(&lowered, text) else {
                continue;
            };
            match rule.action {
                SafetyAction::Deny => {
                    return Some(SafetyMatch {
                        category: rule.category.clone(),
                        action: SafetyAction::Deny,
                        matched,
                    });
                }
                SafetyAction::RequireHuman => {
                    if pending.is_none() {
                        pending = Some(SafetyMatch {
                            category: rule.category.clone(),
                            action: SafetyAction::RequireHuman,
                            matched,
                        });
                    }
                }
            }
        }

        pending
    }
}

impl Default for SafetyEvaluator {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// The first declared dangerous-operation term found in `text`, if any.
/// Matching is a case-insensitive substring test; blank terms never match.
pub fn dangerous_term<'a>(text: &str, dangerous_ops: &'a [String]) -> Option<&'a str> {
    let lowered = text.to_lowercase();
    dangerous_ops
        .iter()
        .map(|op| op.as_str())
        .find(|op| {
            let op = op.trim();
            !op.is_empty() && lowered.contains(&op.to_lowercase())
        })
}

/// Does `text` mention any of the tool's dangerous operations?
pub fn is_dangerous_operation(name: &str, text: &str, dangerous_ops: &[String]) -> bool {
    let found = dangerous_term(text, dangerous_ops);
    if let Some(term) = found {
        tracing::debug!(tool = %name, term = %term, "Dangerous operation mentioned");
    }
    found.is_some()
}

fn default_rules() -> Vec<SafetyRule> {
    [
        builtin(
            "deployment",
            &[
                "deploy to production",
                "production deploy",
                "push to prod",
                "release to production",
                "rollback production",
            ],
            &[r"\bdeploy\w*\b.{0,40}\bprod(uction)?\b"],
            SafetyAction::RequireHuman,
        ),
        builtin(
            "destructive",
            &[
                "rm -rf",
                "drop table",
                "drop database",
                "truncate table",
                "delete all",
                "wipe the",
                "format disk",
            ],
            &[
                r"\brm\s+-[a-z]*r[a-z]*f",
                r"\b(drop|truncate)\s+(table|database|schema)\b",
            ],
            SafetyAction::Deny,
        ),
        builtin(
            "secrets",
            &["exfiltrate", "dump credentials", "leak secrets", "print env secrets"],
            &[r"\b(reveal|print|dump|leak|expose)\b.{0,40}\b(passwords?|secrets?|api[ _-]?keys?|private keys?|credentials?)\b"],
            SafetyAction::Deny,
        ),
        builtin(
            "billing",
            &[
                "refund",
                "charge the customer",
                "charge card",
                "cancel subscription",
                "change billing",
                "issue invoice",
            ],
            &[r"\b(charge|bill)\b.{0,30}\$\s?\d+"],
            SafetyAction::RequireHuman,
        ),
        builtin(
            "access_control",
            &[
                "grant admin",
                "make admin",
                "sudo ",
                "chmod 777",
                "add to admins",
                "disable mfa",
            ],
            &[r"\b(grant|revoke)\b.{0,30}\b(access|roles?|permissions?)\b"],
            SafetyAction::RequireHuman,
        ),
        builtin(
            "automation_abuse",
            &["mass email", "bulk sms", "spam", "scrape all", "bypass captcha", "mass dm"],
            &[r"\b(send|blast)\b.{0,20}\b\d{3,}\s+(emails|messages|texts|sms|calls)\b"],
            SafetyAction::Deny,
        ),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn builtin(
    category: &str,
    keywords: &[&str],
    patterns: &[&str],
    action: SafetyAction,
) -> Option<SafetyRule> {
    match SafetyRule::new(category, keywords, patterns, action) {
        Ok(rule) => Some(rule),
        Err(e) => {
            tracing::error!(error = %e, "Built-in safety rule failed to compile");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_compile() {
        let evaluator = SafetyEvaluator::with_defaults();
        assert_eq!(evaluator.rules().len(), 6);
    }

    #[test]
    fn deny_keyword_is_case_insensitive() {
        let evaluator = SafetyEvaluator::with_defaults();
        let hit = evaluator.evaluate("please RM -RF the build cache").unwrap();
        assert_eq!(hit.action, SafetyAction::Deny);
        assert_eq!(hit.category, "destructive");
        assert_eq!(hit.matched, "rm -rf");
    }

    #[test]
    fn pattern_match_without_keyword() {
        let evaluator = SafetyEvaluator::with_defaults();
        let hit = evaluator.evaluate("Deploying the api to prod now").unwrap();
        assert_eq!(hit.action, SafetyAction::RequireHuman);
        assert_eq!(hit.category, "deployment");
    }

    #[test]
    fn deny_overrides_earlier_require_human() {
        let evaluator = SafetyEvaluator::with_defaults();
        let hit = evaluator
            .evaluate("deploy to production and then drop table users")
            .unwrap();
        assert_eq!(hit.action, SafetyAction::Deny);
        assert_eq!(hit.category, "destructive");
    }

    #[test]
    fn first_require_human_is_kept() {
        let evaluator = SafetyEvaluator::with_defaults();
        let hit = evaluator
            .evaluate("push to prod and grant admin to the intern")
            .unwrap();
        assert_eq!(hit.action, SafetyAction::RequireHuman);
        assert_eq!(hit.category, "deployment");
    }

    #[test]
    fn deny_short_circuits_in_declaration_order() {
        let rules = vec![
            SafetyRule::new("first", &["launch"], &[], SafetyAction::Deny).unwrap(),
            SafetyRule::new("second", &["launch"], &[], SafetyAction::Deny).unwrap(),
        ];
        let hit = SafetyEvaluator::new(rules).evaluate("launch it").unwrap();
        assert_eq!(hit.category, "first");
    }

    #[test]
    fn benign_input_passes() {
        let evaluator = SafetyEvaluator::with_defaults();
        assert!(evaluator.evaluate("search github issues for bugs").is_none());
        assert!(evaluator.evaluate("").is_none());
    }

    #[test]
    fn invalid_pattern_rejected() {
        let err = SafetyRule::new("broken", &[], &["(unclosed"], SafetyAction::Deny).unwrap_err();
        assert!(matches!(err, RuleError::InvalidPattern { .. }));
    }

    #[test]
    fn config_rules_append_after_defaults() {
        let config = SafetyConfig {
            use_default_rules: true,
            rules: vec![SafetyRuleConfig {
                category: "launch".into(),
                keywords: vec!["Launch Missiles".into()],
                patterns: vec![],
                action: "deny".into(),
            }],
        };
        let evaluator = SafetyEvaluator::from_config(&config).unwrap();
        assert_eq!(evaluator.rules().len(), 7);
        let hit = evaluator.evaluate("launch missiles at dawn").unwrap();
        assert_eq!(hit.category, "launch");
    }

    #[test]
    fn config_without_defaults_only_has_custom_rules() {
        let config = SafetyConfig {
            use_default_rules: false,
            rules: vec![],
        };
        let evaluator = SafetyEvaluator::from_config(&config).unwrap();
        assert!(evaluator.evaluate("rm -rf /").is_none());
    }

    #[test]
    fn unknown_action_in_config_rejected() {
        let config = SafetyRuleConfig {
            category: "x".into(),
            keywords: vec![],
            patterns: vec![],
            action: "warn".into(),
        };
        assert!(matches!(
            SafetyRule::from_config(&config),
            Err(RuleError::Parse { .. })
        ));
    }

    #[test]
    fn dangerous_operation_detection() {
        let ops = vec!["Force Push".to_string(), "  ".to_string(), "delete".to_string()];
        assert!(is_dangerous_operation("git", "please force push main", &ops));
        assert_eq!(dangerous_term("DELETE the branch", &ops), Some("delete"));
        assert!(!is_dangerous_operation("git", "list branches", &ops));
        assert!(!is_dangerous_operation("git", "anything", &[]));
    }
}
