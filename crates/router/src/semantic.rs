//! Semantic matcher: weighted lexical overlap between a query and a tool.
//!
//! Signals, over the query's tokens:
//!
//! | signal | weight |
//! |---|---|
//! | share of tokens overlapping a tag | 0.50 |
//! | share overlapping a description token | 0.35 |
//! | share overlapping a name token | 0.15 |
//! | any token equal to a tag | +0.20 |
//! | full tool name inside the raw query | +0.30 |
//!
//! "Overlap" means either string contains the other. The sum is clamped
//! to `[0, 1]`.

use std::cmp::Ordering;
use warden_core::{RouteCandidate, ToolDescriptor, tokenize};

const TAG_WEIGHT: f32 = 0.5;
const DESCRIPTION_WEIGHT: f32 = 0.35;
const NAME_WEIGHT: f32 = 0.15;
const EXACT_TAG_BONUS: f32 = 0.2;
const FULL_NAME_BONUS: f32 = 0.3;

/// Score one tool against a query. Always in `[0, 1]`; 0 when the query
/// has no usable tokens.
pub fn calculate_similarity(query: &str, tool: &ToolDescriptor) -> f32 {
    let tokens = tokenize(query);
    score_tokens(&query.to_lowercase(), &tokens, tool)
}

/// Enabled tools scoring at least `threshold`, best first, at most `top_k`.
pub fn find_matching_tools(
    query: &str,
    tools: &[ToolDescriptor],
    threshold: f32,
    top_k: usize,
) -> Vec<RouteCandidate> {
    score_tools(query, tools, threshold, top_k)
        .into_iter()
        .map(|(tool, score)| RouteCandidate::from_tool(tool, score))
        .collect()
}

/// Same selection as [`find_matching_tools`], keeping the descriptors.
pub(crate) fn score_tools<'a>(
    query: &str,
    tools: &'a [ToolDescriptor],
    threshold: f32,
    top_k: usize,
) -> Vec<(&'a ToolDescriptor, f32)> {
    let tokens = tokenize(query);
    let lowered = query.to_lowercase();

    let mut scored: Vec<(&ToolDescriptor, f32)> = tools
        .iter()
        .filter(|t| t.enabled)
        .map(|t| (t, score_tokens(&lowered, &tokens, t)))
        .filter(|(_, score)| *score >= threshold)
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(top_k);
    scored
}

fn score_tokens(lowered_query: &str, tokens: &[String], tool: &ToolDescriptor) -> f32 {
    if tokens.is_empty() {
        return 0.0;
    }

    let tags: Vec<String> = tool.tags.iter().map(|t| t.to_lowercase()).collect();
    let description = tokenize(&tool.short_description);
    let name_tokens = tokenize(&tool.name);
    let total = tokens.len() as f32;

    let share = |against: &[String]| -> f32 {
        let hits = tokens
            .iter()
            .filter(|q| against.iter().any(|a| overlaps(q, a)))
            .count();
        hits as f32 / total
    };

    let mut score = share(&tags) * TAG_WEIGHT
        + share(&description) * DESCRIPTION_WEIGHT
        + share(&name_tokens) * NAME_WEIGHT;

    if tokens.iter().any(|q| tags.iter().any(|t| t == q)) {
        score += EXACT_TAG_BONUS;
    }

    let name = tool.name.to_lowercase();
    if !name.is_empty() && lowered_query.contains(&name) {
        score += FULL_NAME_BONUS;
    }

    score.clamp(0.0, 1.0)
}

fn overlaps(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a.contains(b) || b.contains(a))
}
