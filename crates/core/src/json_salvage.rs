//! JSON Salvager
//!
//! Models asked for "ONLY valid JSON" still wrap it in prose, fence it in
//! markdown, or leave a trailing comma. This module extracts a JSON value
//! from free-form model output using four strategies, in order, stopping at
//! the first that parses:
//!
//! 1. Direct parse of the whole trimmed text.
//! 2. Parse the contents of the first fenced code block.
//! 3. Extract the outermost balanced `{…}` or `[…]` block, respecting
//!    string escapes, and parse it.
//! 4. Forgiving fixes (drop trailing commas; substitute single quotes when
//!    no double quotes are present), then re-extract and parse.
//!
//! Returns `None` on failure. Never panics.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

static TRAILING_COMMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",\s*([}\]])").expect("valid trailing-comma regex"));

/// Extract a JSON value from model output.
pub fn salvage_value(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    if let Some(fenced) = extract_fenced(trimmed) {
        if let Ok(value) = serde_json::from_str(fenced.trim()) {
            return Some(value);
        }
    }

    if let Some(block) = extract_balanced(trimmed) {
        if let Ok(value) = serde_json::from_str(block) {
            return Some(value);
        }
    }

    // Last resort: repair, then try the balanced block of the repaired text.
    let candidate = extract_fenced(trimmed).unwrap_or(trimmed);
    let repaired = repair(candidate);
    if let Some(block) = extract_balanced(&repaired) {
        if let Ok(value) = serde_json::from_str(block) {
            return Some(value);
        }
    }
    serde_json::from_str(repaired.trim()).ok()
}

/// Extract and deserialize into a concrete type.
pub fn salvage<T: DeserializeOwned>(text: &str) -> Option<T> {
    salvage_value(text).and_then(|value| serde_json::from_value(value).ok())
}

/// Contents of the first triple-backtick block, with an optional language
/// tag on the opening fence.
fn extract_fenced(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_fence = &text[open + 3..];
    // Skip the language tag line (e.g. "json")
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_fence[body_start..];
    let close = body.find("```")?;
    Some(&body[..close])
}

/// The outermost balanced `{…}` or `[…]` block, honoring strings and
/// escape sequences.
fn extract_balanced(text: &str) -> Option<&str> {
    let start = text.find(|c| c == '{' || c == '[')?;
    let bytes = text.as_bytes();
    let open = bytes[start];
    let close = if open == b'{' { b'}' } else { b']' };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b if b == open => depth += 1,
            b if b == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn repair(text: &str) -> String {
    let mut fixed = TRAILING_COMMA.replace_all(text, "$1").into_owned();
    if !fixed.contains('"') && fixed.contains('\'') {
        fixed = fixed.replace('\'', "\"");
    }
    fixed
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_direct_parse() {
        let value = salvage_value(r#"{"status": "done", "count": 3}"#).unwrap();
        assert_eq!(value, json!({"status": "done", "count": 3}));
    }

    #[test]
    fn test_idempotent_on_valid_json() {
        let raw = r#"{"a": [1, 2, {"b": "c"}]}"#;
        let direct: Value = serde_json::from_str(raw).unwrap();
        assert_eq!(salvage_value(raw).unwrap(), direct);
    }

    #[test]
    fn test_fenced_block() {
        let text = "Here is the plan:\n```json\n{\"subtasks\": []}\n```\nDone.";
        assert_eq!(salvage_value(text).unwrap(), json!({"subtasks": []}));
    }

    #[test]
    fn test_fence_agnostic() {
        let inner = r#"{"x": 1}"#;
        let fenced = format!("```json\n{}\n```", inner);
        assert_eq!(salvage_value(&fenced), salvage_value(inner));
    }

    #[test]
    fn test_fence_without_language_tag() {
        let text = "```\n[1, 2, 3]\n```";
        assert_eq!(salvage_value(text).unwrap(), json!([1, 2, 3]));
    }

    #[test]
    fn test_prefix_suffix_tolerant() {
        let text = "Sure! The decisions are:\n{\"verdict\": \"accept\"}\nLet me know.";
        assert_eq!(salvage_value(text).unwrap(), json!({"verdict": "accept"}));
    }

    #[test]
    fn test_balanced_array() {
        let text = "The list: [\"a\", \"b\"] as requested";
        assert_eq!(salvage_value(text).unwrap(), json!(["a", "b"]));
    }

    #[test]
    fn test_braces_inside_strings_ignored() {
        let text = r#"prefix {"msg": "use {braces} and \"quotes\" freely"} suffix"#;
        let value = salvage_value(text).unwrap();
        assert_eq!(value["msg"], "use {braces} and \"quotes\" freely");
    }

    #[test]
    fn test_nested_objects() {
        let text = "x {\"a\": {\"b\": {\"c\": 1}}} y";
        assert_eq!(salvage_value(text).unwrap(), json!({"a": {"b": {"c": 1}}}));
    }

    #[test]
    fn test_trailing_comma_repair() {
        let text = r#"{"items": [1, 2, 3,], "done": true,}"#;
        assert_eq!(
            salvage_value(text).unwrap(),
            json!({"items": [1, 2, 3], "done": true})
        );
    }

    #[test]
    fn test_single_quote_repair() {
        let text = "{'status': 'done'}";
        assert_eq!(salvage_value(text).unwrap(), json!({"status": "done"}));
    }

    #[test]
    fn test_single_quotes_left_alone_when_double_quotes_present() {
        let text = r#"{"note": "it's fine"}"#;
        assert_eq!(salvage_value(text).unwrap()["note"], "it's fine");
    }

    #[test]
    fn test_unsalvageable_returns_none() {
        assert!(salvage_value("no json here at all").is_none());
        assert!(salvage_value("").is_none());
        assert!(salvage_value("{unclosed").is_none());
    }

    #[test]
    fn test_typed_salvage() {
        #[derive(serde::Deserialize)]
        struct Decision {
            verdict: String,
        }
        let decision: Decision = salvage("noise {\"verdict\": \"revise\"} noise").unwrap();
        assert_eq!(decision.verdict, "revise");
    }

    #[test]
    fn test_typed_salvage_shape_mismatch() {
        #[derive(serde::Deserialize)]
        struct Decision {
            #[allow(dead_code)]
            verdict: String,
        }
        assert!(salvage::<Decision>("{\"other\": 1}").is_none());
    }
}
