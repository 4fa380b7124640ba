//! Identifier and value escaping for generated SQL
//!
//! Every name that reaches generated SQL goes through [`safe_name`] and every
//! literal through [`safe_value`]. Free text destined for `LIKE` patterns
//! goes through [`like_guts`] first.

use std::sync::OnceLock;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde_json::Value;

use crate::{Error, Result};

static PLAIN_IDENT: OnceLock<Regex> = OnceLock::new();
static SEARCH_TOKEN: OnceLock<Regex> = OnceLock::new();

fn plain_ident() -> &'static Regex {
    PLAIN_IDENT.get_or_init(|| {
        Regex::new(r"(?i)^[a-z][a-z0-9_]*(\.[a-z][a-z0-9_]*)?$").expect("identifier pattern")
    })
}

fn search_token() -> &'static Regex {
    SEARCH_TOKEN
        .get_or_init(|| Regex::new(r#""([^"]+)("|\s*$)|([^ \t\r\n]+)"#).expect("search token pattern"))
}

/// Escape a table name, column name, or other SQL identifier
///
/// Plain names (`user_`, `t.name`) pass through untouched. Anything else is
/// double-quoted, keeping a dotted qualifier as two quoted parts.
pub fn safe_name(name: &str) -> Result<String> {
    if name.contains('"') || name.trim().is_empty() {
        return Err(Error::InvalidIdentifier(name.to_string()));
    }
    if plain_ident().is_match(name) {
        return Ok(name.to_string());
    }
    Ok(format!("\"{}\"", name.trim().replace('.', "\".\"")))
}

/// Render a literal for direct inclusion in SQL text
pub fn safe_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        other => quote(&other.to_string()),
    }
}

/// Render a string literal
pub fn safe_str(text: &str) -> String {
    quote(text)
}

/// Render a timestamp literal in the canonical stored form
pub fn safe_timestamp(at: &DateTime<Utc>) -> String {
    quote(&timestamp_text(at))
}

/// Canonical text form of a timestamp; sorts chronologically as text
pub fn timestamp_text(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Escape text for use inside a `LIKE '...' ESCAPE '\'` pattern
pub fn like_guts(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
        .replace('\'', "''")
}

/// Case-insensitive "contains" comparison
pub fn expr_contains(expr: &str, value: &str) -> String {
    format!(
        "LOWER({}) LIKE '%{}%' ESCAPE '\\'",
        expr,
        like_guts(&value.to_lowercase())
    )
}

/// Case-insensitive "begins with" comparison
pub fn expr_begins_with(expr: &str, value: &str) -> String {
    format!(
        "LOWER({}) LIKE '{}%' ESCAPE '\\'",
        expr,
        like_guts(&value.to_lowercase())
    )
}

/// Case-insensitive "ends with" comparison
pub fn expr_ends_with(expr: &str, value: &str) -> String {
    format!(
        "LOWER({}) LIKE '%{}' ESCAPE '\\'",
        expr,
        like_guts(&value.to_lowercase())
    )
}

/// Case-insensitive equality
pub fn expr_equals(expr: &str, value: &str) -> String {
    format!("LOWER({}) = {}", expr, safe_str(&value.to_lowercase()))
}

/// Split free-form search text into terms; `"quoted phrases"` stay whole
pub fn search_terms(text: &str) -> Vec<String> {
    search_token()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(3)))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Build a keyword search predicate across one or more columns
///
/// Every term must appear, case-insensitively, in at least one of the
/// columns. The result starts with `AND` so it can follow `1=1` or any other
/// predicate; empty text matches everything.
pub fn text_search_filter(filter_text: Option<&str>, columns: &[&str]) -> Result<String> {
    let terms = match filter_text {
        Some(text) if !text.trim().is_empty() => search_terms(text),
        _ => return Ok("AND 1=1".to_string()),
    };
    if terms.is_empty() {
        return Ok("AND 1=1".to_string());
    }
    if columns.is_empty() {
        return Err(Error::InvalidRequest(
            "text search needs at least one column".to_string(),
        ));
    }
    let columns = columns
        .iter()
        .map(|c| safe_name(c))
        .collect::<Result<Vec<_>>>()?;

    let clauses: Vec<String> = terms
        .iter()
        .map(|term| {
            let pattern = format!("'%{}%'", like_guts(&term.to_lowercase()));
            let alternatives: Vec<String> = columns
                .iter()
                .map(|col| format!("LOWER({}) LIKE {} ESCAPE '\\'", col, pattern))
                .collect();
            format!("AND (\n  {}\n)", alternatives.join(" OR "))
        })
        .collect();
    Ok(clauses.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_safe_name_passes_plain_identifiers() {
        assert_eq!(safe_name("user_").unwrap(), "user_");
        assert_eq!(safe_name("main.encounter").unwrap(), "main.encounter");
        assert_eq!(safe_name("Submitted_At").unwrap(), "Submitted_At");
    }

    #[test]
    fn test_safe_name_quotes_everything_else() {
        assert_eq!(safe_name("my table").unwrap(), "\"my table\"");
        assert_eq!(safe_name("2fa").unwrap(), "\"2fa\"");
        assert_eq!(safe_name("odd schema.x y").unwrap(), "\"odd schema\".\"x y\"");
    }

    #[test]
    fn test_safe_name_rejects_quotes() {
        assert!(matches!(safe_name("a\"; DROP TABLE x; --"), Err(Error::InvalidIdentifier(_))));
        assert!(matches!(safe_name("  "), Err(Error::InvalidIdentifier(_))));
    }

    #[test]
    fn test_safe_value_escapes_strings() {
        assert_eq!(safe_value(&json!("it's")), "'it''s'");
        assert_eq!(safe_value(&json!(null)), "NULL");
        assert_eq!(safe_value(&json!(true)), "TRUE");
        assert_eq!(safe_value(&json!(42)), "42");
        assert_eq!(safe_value(&json!(1.5)), "1.5");
    }

    #[test]
    fn test_like_guts_escapes_wildcards() {
        assert_eq!(like_guts(r"50%_off\'"), r"50\%\_off\\''");
    }

    #[test]
    fn test_search_terms_keep_phrases() {
        assert_eq!(
            search_terms(r#""exact phrase" keyword"#),
            vec!["exact phrase".to_string(), "keyword".to_string()]
        );
        assert_eq!(search_terms(r#"  one   "unterminated two"#), vec!["one", "unterminated two"]);
    }

    #[test]
    fn test_text_search_filter_builds_and_of_ors() {
        let sql = text_search_filter(Some(r#""Exact Phrase" keyword"#), &["a", "b"]).unwrap();
        assert_eq!(sql.matches("AND (").count(), 2);
        assert!(sql.contains("LOWER(a) LIKE '%exact phrase%' ESCAPE '\\' OR LOWER(b) LIKE '%exact phrase%'"));
        assert!(sql.contains("LOWER(b) LIKE '%keyword%'"));
    }

    #[test]
    fn test_text_search_filter_empty_matches_all() {
        assert_eq!(text_search_filter(None, &["a"]).unwrap(), "AND 1=1");
        assert_eq!(text_search_filter(Some("   "), &["a"]).unwrap(), "AND 1=1");
    }
}
