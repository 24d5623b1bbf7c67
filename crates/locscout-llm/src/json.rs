//! Helpers for pulling JSON out of free-form completion text.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::LlmError;

static CODE_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(?:json|JSON)?\s*([\s\S]*?)```").expect("valid regex"));

/// Returns the body of the first fenced code block, or the trimmed input when
/// there is none.
#[must_use]
pub fn strip_code_blocks(text: &str) -> &str {
    CODE_BLOCK_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map_or_else(|| text.trim(), |m| m.as_str().trim())
}

fn extract_between(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

/// Finds and parses the outermost JSON object in `text`.
///
/// # Errors
///
/// [`LlmError::NoJson`] when no braces are present, [`LlmError::Deserialize`]
/// when the span between them is not valid JSON.
pub fn extract_json_object(text: &str) -> Result<Value, LlmError> {
    let body = strip_code_blocks(text);
    let span = extract_between(body, '{', '}').ok_or(LlmError::NoJson("object"))?;
    serde_json::from_str(span).map_err(|source| LlmError::Deserialize {
        context: "completion JSON object".to_string(),
        source,
    })
}

/// Finds and parses the outermost JSON array in `text`.
///
/// # Errors
///
/// [`LlmError::NoJson`] when no brackets are present, [`LlmError::Deserialize`]
/// when the span between them is not valid JSON.
pub fn extract_json_array(text: &str) -> Result<Value, LlmError> {
    let body = strip_code_blocks(text);
    let span = extract_between(body, '[', ']').ok_or(LlmError::NoJson("array"))?;
    serde_json::from_str(span).map_err(|source| LlmError::Deserialize {
        context: "completion JSON array".to_string(),
        source,
    })
}

/// Truncates to at most `max_chars` characters without splitting a code point.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fenced_json() {
        let text = "Here you go:\n```json\n{\"a\": 1}\n```\nthanks";
        assert_eq!(strip_code_blocks(text), "{\"a\": 1}");
    }

    #[test]
    fn leaves_plain_text_alone() {
        assert_eq!(strip_code_blocks("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[test]
    fn extracts_object_surrounded_by_prose() {
        let value = extract_json_object("Sure! {\"merge\": {}, \"needs_context\": []} Done.").unwrap();
        assert!(value["merge"].is_object());
    }

    #[test]
    fn extracts_array_from_code_block() {
        let value = extract_json_array("```\n[{\"venue_name\": \"A\"}]\n```").unwrap();
        assert_eq!(value[0]["venue_name"], "A");
    }

    #[test]
    fn missing_json_is_reported() {
        assert!(matches!(
            extract_json_object("no json here"),
            Err(LlmError::NoJson("object"))
        ));
        assert!(matches!(
            extract_json_array("{}"),
            Err(LlmError::NoJson("array"))
        ));
    }

    #[test]
    fn malformed_json_is_a_deserialize_error() {
        assert!(matches!(
            extract_json_object("{\"a\": }"),
            Err(LlmError::Deserialize { .. })
        ));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 7), "héllo w");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(truncate_chars("", 3), "");
    }
}
