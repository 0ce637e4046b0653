//! Tolerant parsing of summarizer output.
//!
//! Models wrap JSON in code fences, surround it with prose, or emit almost-JSON
//! with stray control characters. Parsing degrades through three tiers:
//!
//! 1. the whole response (fence stripped) as a JSON object
//! 2. the first balanced `{...}` block as a JSON object
//! 3. per-field regex extraction of `"history_entry"` and `"memory_update"`
//!
//! An empty [`ConsolidationResult`] means nothing was recovered.

use std::sync::LazyLock;

use courier_types::memory::ConsolidationResult;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

const HISTORY_FIELD: &str = "history_entry";
const MEMORY_FIELD: &str = "memory_update";

static HISTORY_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_regex(r#""history_entry"\s*:\s*"((?:[^"\\]|\\.)*)""#));
static MEMORY_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_regex(r#""memory_update"\s*:\s*"((?:[^"\\]|\\.)*)""#));

fn compile_regex(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(regex) => regex,
        // Patterns are constants exercised by the tests below.
        Err(err) => panic!("invalid regex pattern `{pattern}`: {err}"),
    }
}

/// Parse a raw summarizer response into a consolidation result.
pub fn parse_consolidation(raw: &str) -> ConsolidationResult {
    let body = strip_code_fence(raw);

    if let Some(result) = parse_object(body) {
        return result;
    }

    if let Some(block) = first_balanced_block(body) {
        if let Some(result) = parse_object(block) {
            debug!("consolidation parsed from embedded JSON block");
            return result;
        }
    }

    let result = ConsolidationResult {
        history_entry: extract_field(&HISTORY_RE, body),
        memory_update: extract_field(&MEMORY_RE, body),
    };
    if !result.is_empty() {
        debug!("consolidation recovered by field extraction");
    }
    result
}

/// Remove a leading ```` ```lang ```` line and a trailing ```` ``` ````,
/// each independently of the other.
fn strip_code_fence(raw: &str) -> &str {
    let mut body = raw.trim();
    if let Some(rest) = body.strip_prefix("```") {
        // Drop the info string (e.g. "json") up to the first newline.
        body = match rest.find('\n') {
            Some(idx) => &rest[idx + 1..],
            None => rest,
        };
    }
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Parse `text` as a JSON object and pull out the two fields.
///
/// Returns `None` when the text is not an object or neither field is present.
fn parse_object(text: &str) -> Option<ConsolidationResult> {
    let Value::Object(map) = serde_json::from_str::<Value>(text).ok()? else {
        return None;
    };
    let result = ConsolidationResult {
        history_entry: map.get(HISTORY_FIELD).and_then(field_text),
        memory_update: map.get(MEMORY_FIELD).and_then(field_text),
    };
    (!result.is_empty()).then_some(result)
}

/// Strings are taken verbatim; other non-null values keep their JSON text.
fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// The first `{...}` block whose braces balance, ignoring braces that appear
/// inside string literals.
fn first_balanced_block(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
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

/// Regex extraction of one string field, decoding JSON escapes.
///
/// Falls back to the raw captured text when the escapes do not decode
/// (e.g. a literal newline inside the string).
fn extract_field(re: &Regex, text: &str) -> Option<String> {
    let captured = re.captures(text)?.get(1)?.as_str();
    let decoded = serde_json::from_str::<String>(&format!("\"{captured}\""))
        .unwrap_or_else(|_| captured.to_string());
    Some(decoded)
}
