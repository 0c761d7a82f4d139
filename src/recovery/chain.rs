//! The ordered recovery chain.
//!
//! [`recover`] runs the strategies in tier order and stops at the first
//! one that yields a document.  It never fails: when every strategy
//! declines, the result is the marked fallback document.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use super::fields::empty_document;
use super::strategies::{brace_span, direct, fenced, field_extraction, repaired, Strategy};

/// Key set on the fallback document.
pub const EXHAUSTED_MARKER: &str = "_recovery";

// ---------------------------------------------------------------------------
// RecoveryTier
// ---------------------------------------------------------------------------

/// Recovery tiers, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryTier {
    Direct,
    Fenced,
    BraceSpan,
    Repaired,
    FieldExtraction,
    /// No strategy succeeded; the value is the fallback document.
    Exhausted,
}

impl RecoveryTier {
    pub fn label(&self) -> &'static str {
        match self {
            RecoveryTier::Direct => "direct",
            RecoveryTier::Fenced => "fenced",
            RecoveryTier::BraceSpan => "brace_span",
            RecoveryTier::Repaired => "repaired",
            RecoveryTier::FieldExtraction => "field_extraction",
            RecoveryTier::Exhausted => "exhausted",
        }
    }
}

impl fmt::Display for RecoveryTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

const CHAIN: [(RecoveryTier, Strategy); 5] = [
    (RecoveryTier::Direct, direct),
    (RecoveryTier::Fenced, fenced),
    (RecoveryTier::BraceSpan, brace_span),
    (RecoveryTier::Repaired, repaired),
    (RecoveryTier::FieldExtraction, field_extraction),
];

// ---------------------------------------------------------------------------
// RecoveryTrace
// ---------------------------------------------------------------------------

/// Which tiers were attempted and how each went.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecoveryTrace {
    pub attempts: Vec<(RecoveryTier, bool)>,
}

impl RecoveryTrace {
    fn push(&mut self, tier: RecoveryTier, succeeded: bool) {
        self.attempts.push((tier, succeeded));
    }

    /// Tiers tried, in order.
    pub fn tiers(&self) -> impl Iterator<Item = RecoveryTier> + '_ {
        self.attempts.iter().map(|(tier, _)| *tier)
    }
}

impl fmt::Display for RecoveryTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (tier, ok)) in self.attempts.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{tier}:{}", if *ok { "ok" } else { "miss" })?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Recovery
// ---------------------------------------------------------------------------

/// A recovered document and how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct Recovery {
    pub value: Value,
    pub tier: RecoveryTier,
    pub trace: RecoveryTrace,
}

impl Recovery {
    pub fn is_exhausted(&self) -> bool {
        self.tier == RecoveryTier::Exhausted
    }
}

/// Recover a JSON document from raw model text.
///
/// ```
/// use clinical_cascade::recovery::{recover, RecoveryTier};
///
/// let r = recover("```json\n{\"plan\": \"reposo\"}\n```");
/// assert_eq!(r.tier, RecoveryTier::Fenced);
/// assert_eq!(r.value["plan"], "reposo");
/// ```
pub fn recover(text: &str) -> Recovery {
    let mut trace = RecoveryTrace::default();

    for (tier, strategy) in CHAIN {
        match strategy(text) {
            Some(value) => {
                trace.push(tier, true);
                log::debug!("recovery: succeeded at {tier} ({trace})");
                return Recovery { value, tier, trace };
            }
            None => trace.push(tier, false),
        }
    }

    trace.push(RecoveryTier::Exhausted, true);
    log::debug!(
        "recovery: all strategies declined for {} chars ({trace})",
        text.len()
    );
    Recovery {
        value: empty_document(),
        tier: RecoveryTier::Exhausted,
        trace,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "warnings": [{"severity": "HIGH", "category": "clinica", "title": "Dolor nocturno",
                          "description": "d", "action": "a"}],
            "suggestions": [],
            "soap_note": {"subjective": "s", "objective": "o", "assessment": "a", "plan": "p"},
            "quality_score": 80
        })
    }

    #[test]
    fn valid_json_round_trips_at_first_tier() {
        for value in [sample(), json!({}), json!([1, "dos", null]), json!("texto"), json!(3.5)] {
            let text = serde_json::to_string_pretty(&value).unwrap();
            let r = recover(&text);
            assert_eq!(r.tier, RecoveryTier::Direct);
            assert_eq!(r.value, value);
            assert_eq!(r.trace.attempts.len(), 1);
        }
    }

    #[test]
    fn noise_does_not_change_the_result() {
        let clean = serde_json::to_string(&sample()).unwrap();
        let wrapped = [
            format!("```json\n{clean}\n```"),
            format!("Aquí está el análisis:\n{clean}\nQuedo atento."),
            format!("Texto previo\n```\n{clean}\n```\ny posterior"),
        ];
        for text in &wrapped {
            assert_eq!(recover(text).value, sample(), "input: {text}");
        }
    }

    #[test]
    fn never_panics_on_hostile_input() {
        for text in [
            "",
            "   ",
            "Lo siento, no puedo ayudar con esta solicitud.",
            "{\"warnings\": [{\"title\": \"Dolor",
            "{{{{",
            "}}}}",
            "```",
            "```json\n{",
            "\"",
            "ñ{ü}ß",
        ] {
            let r = recover(text);
            assert!(r.value.is_object() || r.value.is_array() || r.value.is_string(), "input: {text:?}");
        }
    }

    #[test]
    fn empty_and_refusal_are_exhausted() {
        for text in ["", "Lo siento, no puedo ayudar."] {
            let r = recover(text);
            assert!(r.is_exhausted());
            assert_eq!(r.value[EXHAUSTED_MARKER], "exhausted");
            assert_eq!(r.trace.attempts.len(), 6);
        }
    }

    #[test]
    fn truncated_json_is_repaired() {
        let r = recover("{\"soap_note\": {\"subjective\": \"Dolor lumbar\", \"plan\": \"Ejerc");
        assert_eq!(r.tier, RecoveryTier::Repaired);
        assert_eq!(r.value["soap_note"]["plan"], "Ejerc");
    }

    #[test]
    fn trace_records_every_attempt_in_order() {
        let r = recover("prosa {\"a\": 1} prosa");
        let tiers: Vec<_> = r.trace.tiers().collect();
        assert_eq!(
            tiers,
            vec![RecoveryTier::Direct, RecoveryTier::Fenced, RecoveryTier::BraceSpan]
        );
        assert_eq!(r.trace.to_string(), "direct:miss -> fenced:miss -> brace_span:ok");
    }
}
