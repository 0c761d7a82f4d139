//! Regex extraction of known analysis fields from text that no longer
//! parses as a whole.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Map, Value};

/// SOAP sections extracted as strings.
pub const SOAP_FIELDS: [&str; 4] = ["subjective", "objective", "assessment", "plan"];

/// Fields extracted as string lists.
pub const LIST_FIELDS: [&str; 2] = ["functional_goals", "treatment_techniques"];

/// Fields extracted as lists of objects.
pub const OBJECT_LIST_FIELDS: [&str; 2] = ["warnings", "suggestions"];

static QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""((?:[^"\\]|\\.)*)""#).expect("valid regex"));

static FLAT_OBJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^{}]*\}").expect("valid regex"));

static STRING_FIELD_RES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    SOAP_FIELDS
        .iter()
        .map(|name| {
            let pattern = format!(r#"(?:^|[^A-Za-z0-9_])["']?{name}["']?\s*:\s*"((?:[^"\\]|\\.)*)(?:"|$)"#);
            (*name, Regex::new(&pattern).expect("valid regex"))
        })
        .collect()
});

static ARRAY_FIELD_RES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    LIST_FIELDS
        .iter()
        .chain(OBJECT_LIST_FIELDS.iter())
        .map(|name| {
            let pattern = format!(r#"(?s)(?:^|[^A-Za-z0-9_])["']?{name}["']?\s*:\s*\[(.*?)(?:\]|$)"#);
            (*name, Regex::new(&pattern).expect("valid regex"))
        })
        .collect()
});

/// Pull every recognisable field out of `text`.
///
/// SOAP sections land under `soap_note`; list fields keep their names.
/// Returns `None` when not a single field was found.
pub fn extract_fields(text: &str) -> Option<Value> {
    let mut doc = Map::new();

    let mut soap = Map::new();
    for (name, re) in STRING_FIELD_RES.iter() {
        if let Some(caps) = re.captures(text) {
            soap.insert((*name).to_string(), Value::String(unescape(&caps[1])));
        }
    }
    if !soap.is_empty() {
        doc.insert("soap_note".into(), Value::Object(soap));
    }

    for (name, re) in ARRAY_FIELD_RES.iter() {
        let Some(caps) = re.captures(text) else {
            continue;
        };
        let body = &caps[1];
        let items: Vec<Value> = if OBJECT_LIST_FIELDS.contains(name) {
            FLAT_OBJECT_RE
                .find_iter(body)
                .filter_map(|m| parse_object(m.as_str()))
                .collect()
        } else {
            QUOTED_RE
                .captures_iter(body)
                .map(|c| Value::String(unescape(&c[1])))
                .collect()
        };
        doc.insert((*name).to_string(), Value::Array(items));
    }

    if doc.is_empty() {
        None
    } else {
        Some(Value::Object(doc))
    }
}

/// Fallback document: every known field present and empty, plus the
/// exhaustion marker.
pub fn empty_document() -> Value {
    let mut doc = json!({
        "warnings": [],
        "suggestions": [],
        "soap_note": {
            "subjective": "",
            "objective": "",
            "assessment": "",
            "plan": ""
        },
        "functional_goals": [],
        "treatment_techniques": []
    });
    doc[super::EXHAUSTED_MARKER] = Value::String("exhausted".into());
    doc
}

fn parse_object(fragment: &str) -> Option<Value> {
    serde_json::from_str::<Value>(fragment)
        .ok()
        .or_else(|| {
            let fixed = super::repair::repair(fragment)?;
            serde_json::from_str(&fixed).ok()
        })
        .filter(Value::is_object)
}

/// Decode JSON string escapes, keeping the raw text when they are malformed.
fn unescape(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{raw}\""))
        .unwrap_or_else(|_| raw.to_string())
        .trim()
        .to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
