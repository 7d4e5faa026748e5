//! Locating and parsing the JSON object inside free-form model output.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::ExtractError;

static JSON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)```json\s*(.*?)```").expect("Invalid JSON fence regex"));

static ANY_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_-]*\s*(.*?)```").expect("Invalid code fence regex")
});

/// Find the JSON text in a model response: a ```json fence, then any fence,
/// then the first balanced `{...}` object.
pub fn extract_json_block(text: &str) -> Option<&str> {
    for fence in [&*JSON_FENCE, &*ANY_FENCE] {
        if let Some(body) = fence
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .filter(|body| !body.is_empty())
        {
            return Some(balanced_object(body).unwrap_or(body));
        }
    }
    balanced_object(text)
}

/// The first `{...}` span with balanced braces, ignoring braces inside
/// string literals.
fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
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

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Parse the JSON object embedded in a model response.
pub fn parse_json_object(text: &str) -> Result<Map<String, Value>, ExtractError> {
    if text.trim().is_empty() {
        return Err(ExtractError::Empty);
    }
    let block = extract_json_block(text).ok_or(ExtractError::NoJson)?;
    let value: Value =
        serde_json::from_str(block).map_err(|e| ExtractError::InvalidJson(e.to_string()))?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ExtractError::NotAnObject(kind_name(&other))),
    }
}
