//! Consolidation engine.
//!
//! Walks a snapshot of short-term entries, fires every matching rule, and
//! reports what happened. A failing rule is recorded and the sweep moves
//! on.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use warden_core::{MemoryEntry, MemoryError, MemoryLayer, Metadata, RuleError};
use warden_memory::HierarchicalMemory;

use crate::action::Action;
use crate::model::{ConsolidationRule, RuleSet};

/// Shortest interval accepted by [`ConsolidationEngine::start`].
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// A rule that fired and failed for one entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleFailure {
    pub key: String,
    pub rule: String,
    pub message: String,
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsolidationReport {
    pub promoted: usize,
    pub logged: usize,
    pub skipped: usize,
    pub errors: Vec<RuleFailure>,
}

pub struct ConsolidationEngine {
    memory: Arc<HierarchicalMemory>,
    rules: RuleSet,
}

impl ConsolidationEngine {
    pub fn new(memory: Arc<HierarchicalMemory>, rules: RuleSet) -> Self {
        Self { memory, rules }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn memory(&self) -> &Arc<HierarchicalMemory> {
        &self.memory
    }

    /// Apply every matching rule to `entry`. Returns the rules that failed;
    /// a failure does not stop later rules.
    pub async fn evaluate(&self, entry: &MemoryEntry) -> Vec<RuleError> {
        let mut failures = Vec::new();

        for rule in self.rules.rules() {
            if !rule.matches(entry) {
                continue;
            }
            debug!(rule = %rule.name, key = %entry.key, action = %rule.action(), "Rule matched");

            if let Err(e) = self.apply(rule, entry).await {
                warn!(rule = %rule.name, key = %entry.key, error = %e, "Consolidation rule failed");
                failures.push(RuleError::Evaluation {
                    rule: rule.name.clone(),
                    detail: e.to_string(),
                });
            }
        }

        failures
    }

    /// One sweep over the short-term entries present when it starts.
    pub async fn run_consolidation(&self) -> ConsolidationReport {
        let snapshot = self.memory.short_term_entries();
        let mut report = ConsolidationReport::default();

        for entry in &snapshot {
            for failure in self.evaluate(entry).await {
                let rule = match &failure {
                    RuleError::Evaluation { rule, .. }
                    | RuleError::Parse { rule, .. }
                    | RuleError::InvalidPattern { rule, .. } => rule.clone(),
                };
                report.errors.push(RuleFailure {
                    key: entry.key.clone(),
                    rule,
                    message: failure.to_string(),
                });
            }

            match self.memory.get_short_term(&entry.key) {
                None => report.promoted += 1,
                Some(current) if current.is_episodic() => report.logged += 1,
                Some(_) => report.skipped += 1,
            }
        }

        info!(
            entries = snapshot.len(),
            promoted = report.promoted,
            logged = report.logged,
            skipped = report.skipped,
            errors = report.errors.len(),
            "Consolidation sweep finished"
        );
        report
    }

    /// Run a sweep every `interval` until the returned handle is aborted.
    /// The first sweep happens after one full interval. Intervals below
    /// [`MIN_SWEEP_INTERVAL`] are raised to it.
    pub fn start(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let interval = if interval < MIN_SWEEP_INTERVAL {
            warn!(
                requested_ms = interval.as_millis() as u64,
                "Consolidation interval too short; using {}s",
                MIN_SWEEP_INTERVAL.as_secs()
            );
            MIN_SWEEP_INTERVAL
        } else {
            interval
        };
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.run_consolidation().await;
            }
        })
    }

    async fn apply(&self, rule: &ConsolidationRule, entry: &MemoryEntry) -> Result<(), MemoryError> {
        match rule.action() {
            Action::Promote { tags } => {
                if !tags.is_empty() {
                    let mut merged = entry.tags();
                    for tag in tags {
                        if !merged.contains(tag) {
                            merged.push(tag.clone());
                        }
                    }
                    let mut fields = Metadata::new();
                    fields.insert("tags".into(), json!(merged));
                    self.memory.annotate(&entry.key, fields)?;
                }
                self.memory
                    .promote(&entry.key, MemoryLayer::ShortTerm, MemoryLayer::LongTerm)
                    .await
            }
            Action::LogEpisodic => {
                let mut flags = Metadata::new();
                flags.insert("episodic".into(), Value::Bool(true));
                flags.insert("loggedAt".into(), json!(Utc::now().to_rfc3339()));

                let mut metadata = entry.metadata.clone();
                metadata.extend(flags.clone());
                self.memory
                    .store(&entry.key, &entry.content, MemoryLayer::Episodic, metadata)
                    .await?;

                match self.memory.annotate(&entry.key, flags) {
                    Ok(()) | Err(MemoryError::NotFound { .. }) => Ok(()),
                    Err(e) => Err(e),
                }
            }
        }
    }
}
