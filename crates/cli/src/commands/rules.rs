//! `warden rules check`: compile safety and consolidation rules.

use std::path::Path;
use warden_consolidation::RuleSet;
use warden_router::{SafetyAction, SafetyEvaluator};

use super::{CliResult, load_config};

pub async fn check(file: Option<&str>) -> CliResult {
    let config = load_config()?;
    let mut failures = 0;

    println!("📋 Safety rules");
    match SafetyEvaluator::from_config(&config.safety) {
        Ok(evaluator) => {
            for rule in evaluator.rules() {
                let action = match rule.action {
                    SafetyAction::Deny => "deny",
                    SafetyAction::RequireHuman => "require_human",
                };
                println!("  ✅ {:<24} {action}", rule.category);
            }
        }
        Err(e) => {
            println!("  ❌ {e}");
            failures += 1;
        }
    }

    println!("\n📋 Consolidation rules");
    let rules = match file {
        Some(path) => RuleSet::from_file(Path::new(path)),
        None => RuleSet::from_config(&config.consolidation),
    };
    match rules {
        Ok(set) if set.is_empty() => println!("  ⚠️  No consolidation rules"),
        Ok(set) => {
            for rule in set.rules() {
                println!("  ✅ {:<24} {} => {}", rule.name, rule.condition_source, rule.action());
            }
        }
        Err(e) => {
            println!("  ❌ {e}");
            failures += 1;
        }
    }

    println!();
    if failures > 0 {
        return Err(format!("{failures} rule set(s) failed to compile").into());
    }
    println!("  🎉 All rules compiled");
    Ok(())
}
