//! Router orchestrator. Composes safety rules and semantic matching into a
//! single [`RouteDecision`].
//!
//! Routing is stateless per call apart from the bounded decision log.

use crate::safety::{SafetyEvaluator, SafetyMatch, dangerous_term};
use crate::semantic::score_tools;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use warden_config::{AppConfig, RouterConfig};
use warden_core::{RouteAction, RouteCandidate, RouteDecision, RuleError, ToolDescriptor, tokenize};

/// Maximum decision log entries kept in memory.
const MAX_DECISION_LOG: usize = 1_000;

/// Characters of input kept in a log entry.
const PREVIEW_CHARS: usize = 80;

/// Rule name reported when a tool's dangerous operation forces review.
pub const DANGEROUS_OPERATION_RULE: &str = "dangerous_operation";

/// An entry in the decision log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionLogEntry {
    pub input_preview: String,
    pub action: RouteAction,
    pub matched_rule: Option<String>,
    pub top_candidate: Option<String>,
    pub confidence: f32,
    pub timestamp: DateTime<Utc>,
}

impl DecisionLogEntry {
    fn new(input: &str, decision: &RouteDecision) -> Self {
        Self {
            input_preview: preview(input),
            action: decision.action,
            matched_rule: decision.matched_rule.clone(),
            top_candidate: decision.top_candidate().map(|c| c.name.clone()),
            confidence: decision.confidence,
            timestamp: decision.timestamp,
        }
    }
}

/// The routing front door.
pub struct Router {
    config: RouterConfig,
    safety: SafetyEvaluator,
    /// Decision log (bounded to MAX_DECISION_LOG entries).
    log: RwLock<Vec<DecisionLogEntry>>,
}

impl Router {
    pub fn new(config: RouterConfig, safety: SafetyEvaluator) -> Self {
        Self {
            config,
            safety,
            log: RwLock::new(Vec::new()),
        }
    }

    /// Build a router from application config, compiling the safety rules.
    pub fn from_config(config: &AppConfig) -> Result<Self, RuleError> {
        let safety = SafetyEvaluator::from_config(&config.safety)?;
        Ok(Self::new(config.router.clone(), safety))
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn safety(&self) -> &SafetyEvaluator {
        &self.safety
    }

    /// Decide what to do with `input` given the registered tools.
    ///
    /// Never fails: when nothing matches the configured fallback is
    /// returned as a regular decision.
    pub fn route(&self, input: &str, tools: &[ToolDescriptor]) -> RouteDecision {
        let decision = self.decide(input, tools);

        tracing::info!(
            action = %decision.action,
            rule = decision.matched_rule.as_deref().unwrap_or("-"),
            tool = decision.top_candidate().map(|c| c.name.as_str()).unwrap_or("-"),
            confidence = decision.confidence,
            "Routing decision"
        );

        self.record(input, &decision);
        decision
    }

    /// Snapshot of the decision log, oldest first.
    pub fn decisions(&self) -> Vec<DecisionLogEntry> {
        self.log
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn decide(&self, input: &str, tools: &[ToolDescriptor]) -> RouteDecision {
        if self.config.rule_first {
            if let Some(hit) = self.safety.evaluate(input) {
                return safety_decision(hit);
            }
        }

        if tokenize(input).is_empty() {
            return self.fallback("Input has no usable terms");
        }

        let scored = score_tools(
            input,
            tools,
            self.config.semantic_threshold,
            self.config.top_k,
        );

        let Some(&(top, confidence)) = scored.first() else {
            return self.fallback("No tool matched above the similarity threshold");
        };
        let candidates: Vec<RouteCandidate> = scored
            .iter()
            .map(|(tool, score)| RouteCandidate::from_tool(tool, *score))
            .collect();

        let dangerous = dangerous_term(input, &top.dangerous_operations);
        if let Some(term) = dangerous {
            let reason = format!("Tool '{}' would perform dangerous operation '{term}'", top.name);
            return RouteDecision::new(RouteAction::RequireHuman, reason)
                .with_rule(DANGEROUS_OPERATION_RULE)
                .with_candidates(candidates)
                .with_confidence(confidence);
        }

        if !self.config.rule_first {
            if let Some(hit) = self.safety.evaluate(input) {
                return safety_decision(hit).with_candidates(candidates);
            }
        }

        let reason = format!("Matched tool '{}' with score {confidence:.2}", top.name);
        RouteDecision::new(RouteAction::Allow, reason)
            .with_candidates(candidates)
            .with_confidence(confidence)
    }

    fn fallback(&self, reason: &str) -> RouteDecision {
        RouteDecision::new(self.config.fallback, reason).with_confidence(0.0)
    }

    fn record(&self, input: &str, decision: &RouteDecision) {
        let mut log = self.log.write().unwrap_or_else(|e| e.into_inner());
        if log.len() >= MAX_DECISION_LOG {
            log.drain(..MAX_DECISION_LOG / 10);
        }
        log.push(DecisionLogEntry::new(input, decision));
    }
}

fn safety_decision(hit: SafetyMatch) -> RouteDecision {
    let reason = format!("Safety rule '{}' matched '{}'", hit.category, hit.matched);
    RouteDecision::new(hit.action.route_action(), reason)
        .with_rule(hit.category)
        .with_confidence(1.0)
}

fn preview(input: &str) -> String {
    let mut out: String = input.chars().take(PREVIEW_CHARS).collect();
    if input.chars().count() > PREVIEW_CHARS {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safety::{SafetyAction, SafetyRule};

    fn registry() -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor::new("github", "Search and manage GitHub issues and pull requests")
                .with_tags(["github", "issues", "bugs", "code"])
                .with_dangerous_operations(["delete repository", "force push"]),
            ToolDescriptor::new("calendar", "Create and list meetings on the team calendar")
                .with_tags(["meetings", "schedule"]),
        ]
    }

    fn router() -> Router {
        Router::new(RouterConfig::default(), SafetyEvaluator::with_defaults())
    }

    #[test]
    fn empty_input_returns_fallback() {
        let decision = router().route("", &registry());
        assert_eq!(decision.action, RouteAction::RequireClarify);
        assert_eq!(decision.confidence, 0.0);
        assert!(decision.candidates.is_empty());

        let decision = router().route("   ", &registry());
        assert_eq!(decision.action, RouteAction::RequireClarify);
    }

    #[test]
    fn strong_match_is_allowed() {
        let decision = router().route("search github issues for bugs", &registry());
        assert_eq!(decision.action, RouteAction::Allow);
        assert_eq!(decision.top_candidate().unwrap().name, "github");
        assert!(decision.confidence >= 0.3);
        assert!(decision.matched_rule.is_none());
        for pair in decision.candidates.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn nothing_matching_returns_configured_fallback() {
        let config = RouterConfig {
            fallback: RouteAction::RequireHuman,
            ..RouterConfig::default()
        };
        let router = Router::new(config, SafetyEvaluator::new(vec![]));
        let decision = router.route("weather in paris", &registry());
        assert_eq!(decision.action, RouteAction::RequireHuman);
        assert_eq!(decision.confidence, 0.0);
        assert!(decision.candidates.is_empty());
    }

    #[test]
    fn empty_and_disabled_registries_fall_back() {
        let decision = router().route("search github issues for bugs", &[]);
        assert_eq!(decision.action, RouteAction::RequireClarify);

        let disabled: Vec<_> = registry().into_iter().map(|t| t.disabled()).collect();
        let decision = router().route("search github issues for bugs", &disabled);
        assert_eq!(decision.action, RouteAction::RequireClarify);
    }

    #[test]
    fn deny_rule_wins_regardless_of_score() {
        let rule = SafetyRule::new("no-bugs", &["bugs"], &[], SafetyAction::Deny).unwrap();
        let router = Router::new(RouterConfig::default(), SafetyEvaluator::new(vec![rule]));
        let decision = router.route("search github issues for bugs", &registry());
        assert_eq!(decision.action, RouteAction::Deny);
        assert_eq!(decision.matched_rule.as_deref(), Some("no-bugs"));
        assert_eq!(decision.confidence, 1.0);
        assert!(decision.candidates.is_empty());
    }

    #[test]
    fn dangerous_operation_overrides_a_strong_match() {
        let router = Router::new(RouterConfig::default(), SafetyEvaluator::new(vec![]));
        let decision = router.route("github issues: force push the fix for bugs", &registry());
        assert_eq!(decision.action, RouteAction::RequireHuman);
        assert_eq!(decision.matched_rule.as_deref(), Some(DANGEROUS_OPERATION_RULE));
        assert_eq!(decision.top_candidate().unwrap().name, "github");
        assert_eq!(decision.confidence, decision.candidates[0].score);
    }

    #[test]
    fn dangerous_operations_come_from_the_enabled_tool() {
        let router = Router::new(RouterConfig::default(), SafetyEvaluator::new(vec![]));
        let shadow = ToolDescriptor::new("github", "Search and manage GitHub issues and pull requests")
            .with_tags(["github", "issues", "bugs", "code"])
            .with_dangerous_operations(["search"])
            .disabled();
        let live = ToolDescriptor::new("github", "Search and manage GitHub issues and pull requests")
            .with_tags(["github", "issues", "bugs", "code"]);

        let decision = router.route("search github issues for bugs", &[shadow, live]);
        assert_eq!(decision.action, RouteAction::Allow);
        assert!(decision.matched_rule.is_none());
        assert_eq!(decision.candidates.len(), 1);
    }

    #[test]
    fn late_safety_still_overrides_allow() {
        let rule = SafetyRule::new("no-bugs", &["bugs"], &[], SafetyAction::Deny).unwrap();
        let config = RouterConfig {
            rule_first: false,
            ..RouterConfig::default()
        };
        let router = Router::new(config, SafetyEvaluator::new(vec![rule]));

        let decision = router.route("search github issues for bugs", &registry());
        assert_eq!(decision.action, RouteAction::Deny);
        assert!(!decision.candidates.is_empty());

        // Without a match there is nothing to override.
        let decision = router.route("bugs", &[]);
        assert_eq!(decision.action, RouteAction::RequireClarify);
    }

    #[test]
    fn decisions_are_logged() {
        let router = router();
        router.route("search github issues for bugs", &registry());
        router.route("", &registry());

        let log = router.decisions();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].action, RouteAction::Allow);
        assert_eq!(log[0].top_candidate.as_deref(), Some("github"));
        assert_eq!(log[1].action, RouteAction::RequireClarify);
    }

    #[test]
    fn decision_log_is_bounded() {
        let router = router();
        for _ in 0..(MAX_DECISION_LOG + 5) {
            router.route("schedule", &registry());
        }
        assert!(router.decisions().len() <= MAX_DECISION_LOG);
    }

    #[test]
    fn long_inputs_are_previewed() {
        let long = "x".repeat(500);
        let p = preview(&long);
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 3);
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn from_config_uses_defaults() {
        let router = Router::from_config(&AppConfig::default()).unwrap();
        assert_eq!(router.safety().rules().len(), 6);
        assert!(router.config().rule_first);
    }
}
