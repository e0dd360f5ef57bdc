// src/utils/decode.rs
//! Best-effort decoding of structured JSON out of free-form model output.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

// Greedy: from the first '{' to the last '}' across lines.
static BRACED_OBJECT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\{.*\}").expect("Failed to compile BRACED_OBJECT_RE")
});

/// Which stage produced the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStage {
    Direct,
    BracedObject,
    Fallback,
}

#[derive(Debug)]
pub struct Decoded<T> {
    pub value: T,
    pub stage: DecodeStage,
}

/// Tries the whole text as JSON, then the first brace-delimited span, and
/// finally calls `fallback`. A stage only counts when it yields a non-empty
/// JSON object that also deserializes into `T`.
pub fn decode_or_else<T, F>(raw: &str, fallback: F) -> Decoded<T>
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    if let Some(value) = decode_object(raw.trim()) {
        return Decoded { value, stage: DecodeStage::Direct };
    }

    if let Some(found) = BRACED_OBJECT_RE.find(raw) {
        if let Some(value) = decode_object(found.as_str()) {
            tracing::debug!("Decoded model output from embedded JSON object at byte {}", found.start());
            return Decoded { value, stage: DecodeStage::BracedObject };
        }
    }

    tracing::warn!("Model output was not decodable JSON ({} chars); using fallback", raw.chars().count());
    Decoded { value: fallback(), stage: DecodeStage::Fallback }
}

fn decode_object<T: DeserializeOwned>(text: &str) -> Option<T> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) if !map.is_empty() => serde_json::from_value(Value::Object(map))
            .map_err(|e| tracing::debug!("JSON object did not match expected shape: {}", e))
            .ok(),
        _ => None,
    }
}

/// Returns at most `max_chars` characters of `text`, respecting char boundaries.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        name: String,
        #[serde(default)]
        tags: Vec<String>,
    }

    fn fallback() -> Sample {
        Sample { name: "fallback".to_string(), tags: vec![] }
    }

    #[test]
    fn decodes_clean_json_directly() {
        let decoded = decode_or_else(r#"  {"name": "direct", "tags": ["a"]} "#, fallback);
        assert_eq!(decoded.stage, DecodeStage::Direct);
        assert_eq!(decoded.value.name, "direct");
        assert_eq!(decoded.value.tags, vec!["a".to_string()]);
    }

    #[test]
    fn extracts_object_wrapped_in_prose() {
        let raw = "Sure! Here is the JSON you asked for:\n{\n  \"name\": \"wrapped\"\n}\nLet me know if you need more.";
        let decoded = decode_or_else(raw, fallback);
        assert_eq!(decoded.stage, DecodeStage::BracedObject);
        assert_eq!(decoded.value.name, "wrapped");
        assert!(decoded.value.tags.is_empty());
    }

    #[test]
    fn falls_back_on_garbage() {
        let decoded = decode_or_else("- bullet one\n- bullet two", fallback);
        assert_eq!(decoded.stage, DecodeStage::Fallback);
        assert_eq!(decoded.value, fallback());
    }

    #[test]
    fn empty_object_and_non_objects_use_fallback() {
        assert_eq!(decode_or_else("{}", fallback).stage, DecodeStage::Fallback);
        assert_eq!(decode_or_else("[1, 2, 3]", fallback).stage, DecodeStage::Fallback);
        assert_eq!(decode_or_else("\"just a string\"", fallback).stage, DecodeStage::Fallback);
    }

    #[test]
    fn wrong_shape_uses_fallback() {
        let decoded = decode_or_else(r#"{"title": "no name field"}"#, fallback);
        assert_eq!(decoded.stage, DecodeStage::Fallback);
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        assert_eq!(truncate_chars("₹₹₹₹", 2), "₹₹");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
