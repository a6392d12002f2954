//! Text normalization shared by the semantic matcher and the embedding
//! provider. Both must agree on what a "token" is, so there is exactly one
//! tokenizer.

/// Tokens of this length or shorter are dropped ("a", "to", "of", ...).
pub const MIN_TOKEN_LEN: usize = 3;

/// Tokenize free text.
///
/// Lowercases, replaces every non-alphanumeric character with a space,
/// splits on whitespace, and drops tokens of two characters or fewer.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect();

    normalized
        .split_whitespace()
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
        .map(String::from)
        .collect()
}
