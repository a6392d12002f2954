//! Condition expression parser and evaluator.
//!
//! Conditions test a short-term [`MemoryEntry`]:
//!
//! ```text
//! importance >= 0.7
//! layer == 'short-term'
//! type == event OR type == incident
//! importance >= 0.7 AND layer == 'short-term'
//! ```
//!
//! Grammar (informal):
//! ```text
//! expr       = comparison (("AND" | "OR") comparison)*
//! comparison = field OP value
//! field      = "layer" | "importance" | "type" | METADATA_KEY
//! OP         = ">=" | "<=" | ">" | "<" | "==" | "!="
//! value      = QUOTED_STRING | WORD
//! ```
//!
//! Tokens are separated by whitespace. `AND`/`OR` have equal precedence and
//! fold strictly left to right: `a OR b AND c` means `(a OR b) AND c`.

use serde_json::Value;
use std::fmt;
use warden_core::MemoryEntry;

/// A parsed condition tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare(Comparison),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub field: Field,
    pub op: CompareOp,
    pub value: Literal,
}

/// What a comparison reads from the entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// The entry's layer name, e.g. `short-term`.
    Layer,
    /// `metadata.importance`, 0 when absent.
    Importance,
    /// `metadata.type`, empty when absent.
    Type,
    /// Any other metadata key.
    Metadata(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Gt,
    Lt,
    Gte,
    Lte,
    Eq,
    NotEq,
}

impl CompareOp {
    fn is_numeric(self) -> bool {
        matches!(self, CompareOp::Gt | CompareOp::Lt | CompareOp::Gte | CompareOp::Lte)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Gte => ">=",
            CompareOp::Lte => "<=",
            CompareOp::Eq => "==",
            CompareOp::NotEq => "!=",
        })
    }
}

/// A literal on the right-hand side. Numeric operators always carry a
/// [`Literal::Number`], checked at parse time.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Text(String),
}

impl Condition {
    pub fn evaluate(&self, entry: &MemoryEntry) -> bool {
        match self {
            Condition::Compare(cmp) => cmp.evaluate(entry),
            Condition::And(a, b) => a.evaluate(entry) && b.evaluate(entry),
            Condition::Or(a, b) => a.evaluate(entry) || b.evaluate(entry),
        }
    }
}

impl Comparison {
    fn evaluate(&self, entry: &MemoryEntry) -> bool {
        match (&self.value, self.op) {
            (Literal::Number(n), op) if op.is_numeric() => {
                self.numeric_field(entry).is_some_and(|x| match op {
                    CompareOp::Gt => x > *n,
                    CompareOp::Lt => x < *n,
                    CompareOp::Gte => x >= *n,
                    CompareOp::Lte => x <= *n,
                    CompareOp::Eq | CompareOp::NotEq => false,
                })
            }
            (literal, CompareOp::Eq) => self
                .text_field(entry)
                .is_some_and(|fv| loosely_equal(&fv, literal)),
            (literal, CompareOp::NotEq) => self
                .text_field(entry)
                .is_none_or(|fv| !loosely_equal(&fv, literal)),
            _ => false,
        }
    }

    fn numeric_field(&self, entry: &MemoryEntry) -> Option<f64> {
        match &self.field {
            Field::Importance => Some(entry.importance()),
            Field::Layer => entry.layer.as_str().parse().ok(),
            Field::Type => entry.entry_type().trim().parse().ok(),
            Field::Metadata(key) => match entry.metadata.get(key)? {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            },
        }
    }

    fn text_field(&self, entry: &MemoryEntry) -> Option<String> {
        match &self.field {
            Field::Layer => Some(entry.layer.as_str().to_string()),
            Field::Importance => Some(entry.importance().to_string()),
            Field::Type => Some(entry.entry_type().to_string()),
            Field::Metadata(key) => entry.metadata.get(key).map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
        }
    }
}

/// String equality, except that two numeric forms compare as numbers so
/// `importance == 1.0` matches a stored `1`.
fn loosely_equal(field: &str, literal: &Literal) -> bool {
    let text = match literal {
        Literal::Text(s) => s.as_str(),
        Literal::Number(n) => return field.parse::<f64>().is_ok_and(|x| x == *n),
    };
    match (field.parse::<f64>(), text.parse::<f64>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => field == text,
    }
}

// ─── Parser ──────────────────────────────────────────────────────────

/// Parse a condition string into a [`Condition`] tree.
pub fn parse_condition(input: &str) -> Result<Condition, String> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err("condition is empty".into());
    }

    let (mut left, mut rest) = parse_comparison(&tokens)?;
    while let Some(token) = rest.first() {
        let combine: fn(Box<Condition>, Box<Condition>) -> Condition = match token {
            Token::Word(w) if w.eq_ignore_ascii_case("and") => Condition::And,
            Token::Word(w) if w.eq_ignore_ascii_case("or") => Condition::Or,
            other => return Err(format!("expected AND or OR, got '{}'", other.text())),
        };
        if rest.len() == 1 {
            return Err(format!("dangling '{}' at end of condition", token.text()));
        }
        let (right, remaining) = parse_comparison(&rest[1..])?;
        left = combine(Box::new(left), Box::new(right));
        rest = remaining;
    }
    Ok(left)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Quoted(String),
}

impl Token {
    fn text(&self) -> &str {
        match self {
            Token::Word(s) | Token::Quoted(s) => s,
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '"' | '\'' => {
                let quote = c;
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some(ch) if ch == quote => break,
                        Some(ch) => s.push(ch),
                        None => return Err("unterminated string literal".into()),
                    }
                }
                tokens.push(Token::Quoted(s));
            }
            _ => {
                let mut word = String::new();
                while let Some(&wc) = chars.peek() {
                    if wc.is_whitespace() {
                        break;
                    }
                    word.push(wc);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
        }
    }

    Ok(tokens)
}

fn parse_comparison(tokens: &[Token]) -> Result<(Condition, &[Token]), String> {
    let [field, op, value, rest @ ..] = tokens else {
        return Err(format!(
            "incomplete comparison near '{}'; expected `field op value`",
            tokens.iter().map(Token::text).collect::<Vec<_>>().join(" ")
        ));
    };

    let field = match field {
        Token::Word(name) => parse_field(name)?,
        Token::Quoted(name) => return Err(format!("field name must not be quoted: '{name}'")),
    };
    let op = parse_op(op)?;
    let value = parse_value(op, value)?;

    Ok((Condition::Compare(Comparison { field, op, value }), rest))
}

fn parse_field(name: &str) -> Result<Field, String> {
    if name.starts_with(|c: char| !(c.is_alphanumeric() || c == '_')) {
        return Err(format!("expected field name, got '{name}'"));
    }
    Ok(match name {
        "layer" => Field::Layer,
        "importance" => Field::Importance,
        "type" => Field::Type,
        other => Field::Metadata(other.to_string()),
    })
}

fn parse_op(token: &Token) -> Result<CompareOp, String> {
    match token {
        Token::Word(op) => match op.as_str() {
            ">" => Ok(CompareOp::Gt),
            "<" => Ok(CompareOp::Lt),
            ">=" => Ok(CompareOp::Gte),
            "<=" => Ok(CompareOp::Lte),
            "==" | "=" => Ok(CompareOp::Eq),
            "!=" => Ok(CompareOp::NotEq),
            other => Err(format!("unknown operator '{other}'")),
        },
        Token::Quoted(s) => Err(format!("expected operator, got quoted '{s}'")),
    }
}

fn parse_value(op: CompareOp, token: &Token) -> Result<Literal, String> {
    let text = token.text();
    if op.is_numeric() {
        return text
            .trim()
            .parse::<f64>()
            .map(Literal::Number)
            .map_err(|_| format!("operator {op} needs a number, got '{text}'"));
    }
    Ok(Literal::Text(text.to_string()))
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use warden_core::{MemoryLayer, Metadata};

    fn entry(metadata: Value) -> MemoryEntry {
        let metadata: Metadata = metadata.as_object().cloned().unwrap_or_default();
        MemoryEntry::new("k", "content", MemoryLayer::ShortTerm, metadata)
    }

    #[test]
    fn numeric_threshold() {
        let cond = parse_condition("importance >= 0.7").unwrap();
        assert!(cond.evaluate(&entry(json!({"importance": 0.8}))));
        assert!(cond.evaluate(&entry(json!({"importance": 0.7}))));
        assert!(!cond.evaluate(&entry(json!({"importance": 0.5}))));
        // Missing importance defaults to 0
        assert!(!cond.evaluate(&entry(json!({}))));
    }

    #[test]
    fn layer_equality_strips_quotes() {
        for source in ["layer == 'short-term'", "layer == \"short-term\"", "layer == short-term"] {
            let cond = parse_condition(source).unwrap();
            assert!(cond.evaluate(&entry(json!({}))), "{source}");
        }
        let cond = parse_condition("layer != 'short-term'").unwrap();
        assert!(!cond.evaluate(&entry(json!({}))));
    }

    #[test]
    fn and_requires_both() {
        let cond = parse_condition("importance >= 0.7 AND layer == 'short-term'").unwrap();
        assert!(cond.evaluate(&entry(json!({"importance": 0.9}))));
        assert!(!cond.evaluate(&entry(json!({"importance": 0.2}))));
    }

    #[test]
    fn folds_left_without_precedence() {
        // (type == event OR type == note) AND importance > 0.5
        let cond = parse_condition("type == event OR type == note AND importance > 0.5").unwrap();
        assert!(matches!(cond, Condition::And(_, _)));
        assert!(!cond.evaluate(&entry(json!({"type": "event", "importance": 0.1}))));
        assert!(cond.evaluate(&entry(json!({"type": "note", "importance": 0.9}))));
    }

    #[test]
    fn keywords_are_case_insensitive() {
        let cond = parse_condition("type == a or type == b").unwrap();
        assert!(cond.evaluate(&entry(json!({"type": "b"}))));
    }

    #[test]
    fn type_defaults_to_empty() {
        let cond = parse_condition("type == ''").unwrap();
        assert!(cond.evaluate(&entry(json!({}))));
    }

    #[test]
    fn metadata_fields() {
        let cond = parse_condition("source == slack").unwrap();
        assert!(cond.evaluate(&entry(json!({"source": "slack"}))));
        assert!(!cond.evaluate(&entry(json!({}))));

        let cond = parse_condition("source != slack").unwrap();
        assert!(cond.evaluate(&entry(json!({}))));

        let cond = parse_condition("reviewed == true").unwrap();
        assert!(cond.evaluate(&entry(json!({"reviewed": true}))));

        let cond = parse_condition("retries > 2").unwrap();
        assert!(cond.evaluate(&entry(json!({"retries": 3}))));
        assert!(cond.evaluate(&entry(json!({"retries": "5"}))));
    }

    #[test]
    fn non_numeric_field_fails_numeric_comparison() {
        let cond = parse_condition("source > 1").unwrap();
        assert!(!cond.evaluate(&entry(json!({"source": "slack"}))));
        let cond = parse_condition("layer > 0").unwrap();
        assert!(!cond.evaluate(&entry(json!({}))));
    }

    #[test]
    fn numeric_equality_is_loose() {
        let cond = parse_condition("importance == 1.0").unwrap();
        assert!(cond.evaluate(&entry(json!({"importance": 1}))));
    }

    #[test]
    fn malformed_conditions_are_rejected() {
        assert!(parse_condition("").is_err());
        assert!(parse_condition("importance >=").is_err());
        assert!(parse_condition("importance >= high").is_err());
        assert!(parse_condition("importance ~ 0.5").is_err());
        assert!(parse_condition("importance > 0.5 AND").is_err());
        assert!(parse_condition("importance > 0.5 XOR type == a").is_err());
        assert!(parse_condition("layer == 'short-term").is_err());
        assert!(parse_condition(">= importance 0.5").is_err());
    }
}
