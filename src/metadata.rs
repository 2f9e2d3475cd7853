//! Metadata Extraction
//!
//! Best-effort reads over loosely shaped generation metadata. Every accessor
//! returns an empty value for missing or oddly typed fields; nothing here fails.

use serde_json::Value;

const POSITIVE_KEYS: [&str; 3] = ["prompt", "positivePrompt", "positive"];
const NEGATIVE_KEYS: [&str; 2] = ["negativePrompt", "negative"];

/// Positive and negative prompt text recovered from metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptPair {
    pub positive: String,
    pub negative: String,
}

impl PromptPair {
    pub fn is_empty(&self) -> bool {
        self.positive.is_empty() && self.negative.is_empty()
    }
}

/// Non-empty string at `value[key]`.
fn non_empty_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Non-empty string at a nested path such as `["parameters", "prompt"]`.
pub fn str_at_path<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    let (last, parents) = path.split_last()?;
    let parent = parents
        .iter()
        .try_fold(value, |current, key| current.get(*key))?;
    non_empty_str(parent, last)
}

fn first_match(meta: &Value, keys: &[&str], nested: &str) -> String {
    keys.iter()
        .find_map(|key| non_empty_str(meta, key))
        .or_else(|| str_at_path(meta, &["parameters", nested]))
        .unwrap_or_default()
        .to_string()
}

/// Positive prompt from `prompt`, `positivePrompt`, `positive`, then
/// `parameters.prompt`; negative from `negativePrompt`, `negative`, then
/// `parameters.negative`. First non-empty match wins.
pub fn extract_prompts(meta: &Value) -> PromptPair {
    if !meta.is_object() {
        return PromptPair::default();
    }
    PromptPair {
        positive: first_match(meta, &POSITIVE_KEYS, "prompt"),
        negative: first_match(meta, &NEGATIVE_KEYS, "negative"),
    }
}

/// Unwrap one level of `{meta: {...}, id: ...}`.
///
/// Returns the inner metadata and the wrapper's `id` when it had one.
pub fn unwrap_meta(meta: &Value) -> (&Value, Option<String>) {
    match meta.get("meta") {
        Some(inner @ Value::Object(_)) => (inner, meta.get("id").and_then(id_string)),
        _ => (meta, None),
    }
}

/// Name of the first entry in `resources`, or empty.
pub fn primary_model_name(meta: &Value) -> String {
    meta.get("resources")
        .and_then(Value::as_array)
        .and_then(|resources| resources.first())
        .and_then(|first| non_empty_str(first, "name"))
        .unwrap_or_default()
        .to_string()
}

/// Identifier rendered as a string; accepts JSON strings and numbers.
pub fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
