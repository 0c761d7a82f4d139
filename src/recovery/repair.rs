//! Syntactic repairs for almost-JSON model output.
//!
//! Models asked for JSON commonly return Python-style literals, unquoted
//! keys, trailing commas, raw newlines inside strings, or an object cut
//! off at the token limit.  [`repair`] rewrites those into strict JSON text
//! without judging whether the result parses; the caller does that.

use std::sync::LazyLock;

use regex::Regex;

static TRAILING_COMMA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(\s*[}\]])").expect("valid regex"));

static BARE_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)(\s*:)").expect("valid regex")
});

/// Apply every repair in order.  `None` when the text holds no `{` at all.
///
/// ```
/// use clinical_cascade::recovery::repair::repair;
///
/// let fixed = repair("Resultado: {plan: 'reposo', goals: ['caminar',],}").unwrap();
/// assert_eq!(fixed, r#"{"plan": "reposo", "goals": ["caminar"]}"#);
/// ```
pub fn repair(text: &str) -> Option<String> {
    let object = balanced_object(text)?;
    let fixed = single_to_double_quotes(object);
    let fixed = escape_raw_newlines(&fixed);
    let fixed = map_outside_strings(&fixed, |seg| {
        BARE_KEY_RE.replace_all(seg, "$1\"$2\"$3").into_owned()
    });
    let fixed = close_truncated(&fixed);
    let fixed = map_outside_strings(&fixed, |seg| {
        TRAILING_COMMA_RE.replace_all(seg, "$1").into_owned()
    });
    Some(fixed)
}

// ---------------------------------------------------------------------------
// Individual repairs
// ---------------------------------------------------------------------------

/// The first `{ … }` object, matched by brace depth outside strings.
/// When the object never closes, everything from the first `{` on.
pub fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + c.len_utf8();
                    return Some(&text[start..end]);
                }
            }
            _ => {}
        }
    }
    Some(&text[start..])
}

/// Rewrite `'single'` quoted strings as `"double"` quoted ones.
///
/// Apostrophes inside double-quoted strings are left alone.
pub fn single_to_double_quotes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut quote: Option<char> = None;
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        match quote {
            None => {
                if c == '\'' || c == '"' {
                    quote = Some(c);
                    out.push('"');
                } else {
                    out.push(c);
                }
            }
            Some('"') => {
                out.push(c);
                if c == '\\' {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                } else if c == '"' {
                    quote = None;
                }
            }
            Some(_) => match c {
                '\\' => match chars.next() {
                    Some('\'') => out.push('\''),
                    Some(next) => {
                        out.push('\\');
                        out.push(next);
                    }
                    None => out.push('\\'),
                },
                '"' => out.push_str("\\\""),
                '\'' => {
                    quote = None;
                    out.push('"');
                }
                _ => out.push(c),
            },
        }
    }
    out
}

/// Escape control characters that appear raw inside double-quoted strings.
pub fn escape_raw_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if !in_string {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
            continue;
        }
        if escaped {
            escaped = false;
            out.push(c);
            continue;
        }
        match c {
            '\\' => {
                escaped = true;
                out.push(c);
            }
            '"' => {
                in_string = false;
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

/// Close an unterminated string and every unclosed `{` / `[`.
///
/// A dangling `,` is dropped and a dangling `:` gets a `null` value first.
pub fn close_truncated(text: &str) -> String {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
    }

    if stack.is_empty() && !in_string {
        return text.to_string();
    }

    let mut out = text.to_string();
    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    } else {
        let trimmed_len = out.trim_end().len();
        out.truncate(trimmed_len);
        if out.ends_with(',') {
            out.pop();
        } else if out.ends_with(':') {
            out.push_str(" null");
        }
    }
    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    out
}

/// Apply `f` to the stretches of `text` that lie outside double-quoted
/// strings, copying string contents through unchanged.
fn map_outside_strings(text: &str, f: impl Fn(&str) -> String) -> String {
    let mut out = String::with_capacity(text.len());
    let mut segment = String::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            out.push_str(&f(&segment));
            segment.clear();
            out.push(c);
            in_string = true;
        } else {
            segment.push(c);
        }
    }
    out.push_str(&f(&segment));
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn parses(text: &str) -> Value {
        serde_json::from_str(&repair(text).unwrap()).unwrap()
    }

    #[test]
    fn balanced_object_ignores_braces_in_strings() {
        let text = r#"prefijo {"a": "}"} sufijo {"b": 2}"#;
        assert_eq!(balanced_object(text), Some(r#"{"a": "}"}"#));
    }

    #[test]
    fn balanced_object_without_brace_is_none() {
        assert_eq!(balanced_object("sin json"), None);
        assert!(repair("sin json").is_none());
    }

    #[test]
    fn drops_trailing_commas() {
        assert_eq!(parses(r#"{"a": [1, 2,], }"#), json!({"a": [1, 2]}));
    }

    #[test]
    fn trailing_comma_inside_string_is_kept() {
        assert_eq!(parses(r#"{"a": "x, }"}"#), json!({"a": "x, }"}));
    }

    #[test]
    fn converts_single_quotes() {
        assert_eq!(
            parses("{'plan': 'reposo \"relativo\"'}"),
            json!({"plan": "reposo \"relativo\""})
        );
    }

    #[test]
    fn keeps_apostrophes_in_double_quoted_strings() {
        assert_eq!(parses(r#"{"note": "patient's knee"}"#), json!({"note": "patient's knee"}));
    }

    #[test]
    fn quotes_bare_keys_only_outside_strings() {
        assert_eq!(
            parses(r#"{plan: "hora: 10, dolor: alto", score: 3}"#),
            json!({"plan": "hora: 10, dolor: alto", "score": 3})
        );
    }

    #[test]
    fn escapes_raw_newlines() {
        assert_eq!(parses("{\"s\": \"línea 1\nlínea 2\"}"), json!({"s": "línea 1\nlínea 2"}));
    }

    #[test]
    fn closes_truncated_string_and_containers() {
        assert_eq!(
            parses(r#"{"warnings": [{"title": "Dolor noct"#),
            json!({"warnings": [{"title": "Dolor noct"}]})
        );
    }

    #[test]
    fn closes_after_dangling_separators() {
        assert_eq!(parses(r#"{"a": 1, "#), json!({"a": 1}));
        assert_eq!(parses(r#"{"a": 1, "b": "#), json!({"a": 1, "b": null}));
    }

    #[test]
    fn complete_objects_pass_through() {
        let text = r#"{"a": {"b": [1, 2]}}"#;
        assert_eq!(repair(text).unwrap(), text);
    }
}
