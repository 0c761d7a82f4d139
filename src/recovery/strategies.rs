//! The individual recovery strategies, one per tier.
//!
//! Each strategy is a pure `fn(&str) -> Option<Value>`: it either produces a
//! JSON document from the raw model text or declines.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::fields::extract_fields;
use super::repair::repair;

/// Signature shared by every tier.
pub type Strategy = fn(&str) -> Option<Value>;

static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[ \t]*(?i:json)?[ \t]*\r?\n?(.*?)```").expect("valid regex")
});

/// Tier 1: the whole trimmed text.
pub fn direct(text: &str) -> Option<Value> {
    serde_json::from_str(text.trim()).ok()
}

/// Tier 2: the first fenced code block, optionally tagged `json`.
pub fn fenced(text: &str) -> Option<Value> {
    let caps = FENCE_RE.captures(text)?;
    serde_json::from_str(caps[1].trim()).ok()
}

/// Tier 3: from the first `{` to the last `}`.
pub fn brace_span(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

/// Tier 4: syntactic repairs, then a strict parse.
pub fn repaired(text: &str) -> Option<Value> {
    let fixed = repair(text)?;
    serde_json::from_str(&fixed).ok()
}

/// Tier 5: regex extraction of known fields into a partial object.
pub fn field_extraction(text: &str) -> Option<Value> {
    extract_fields(text)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
