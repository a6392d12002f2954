//! `warden route`: decide what to do with one request.

use warden_core::{RouteAction, ToolRegistry};
use warden_router::Router;

use super::{CliResult, load_config, load_registry, registry_path};

pub async fn run(input: &str, registry: Option<&str>, json: bool) -> CliResult {
    let config = load_config()?;
    let router = Router::from_config(&config).map_err(|e| format!("Invalid safety rules: {e}"))?;

    let registry = match registry_path(registry, &config) {
        Some(path) => load_registry(&path)?,
        None => {
            tracing::warn!("No tool registry configured; routing against an empty registry");
            ToolRegistry::default()
        }
    };

    let decision = router.route(input, registry.as_slice());

    if json {
        println!("{}", serde_json::to_string_pretty(&decision)?);
        return Ok(());
    }

    let icon = match decision.action {
        RouteAction::Allow => "✅",
        RouteAction::Deny => "⛔",
        RouteAction::RequireHuman => "🙋",
        RouteAction::RequireClarify => "❓",
    };
    println!("{icon} {}", decision.action);
    println!("  Reason:     {}", decision.reason);
    if let Some(rule) = &decision.matched_rule {
        println!("  Rule:       {rule}");
    }
    println!("  Confidence: {:.2}", decision.confidence);

    if !decision.candidates.is_empty() {
        println!("\n  Candidates:");
        for candidate in &decision.candidates {
            println!("    {:<24} {:.3}", candidate.name, candidate.score);
        }
    }
    Ok(())
}
