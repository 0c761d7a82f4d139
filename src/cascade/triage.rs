//! Fast red-flag screen on the economy model.
//!
//! The stage is total: any inference error is recovered into
//! [`TriageVerdict::unavailable`] and reported as
//! [`StageOutcome::Degraded`], so the pipeline always continues.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;

use crate::cascade::outcome::StageOutcome;
use crate::cascade::types::{RiskLevel, TriageVerdict};
use crate::config::TriageConfig;
use crate::knowledge::RedFlagCatalog;
use crate::llm::{GenerationParams, InferenceGateway, PromptBuilder, TRIAGE_NONE_TOKEN};
use crate::pipeline::CascadeStage;

/// Confidence assigned to a parsed reply that did not state one.
const DEFAULT_CONFIDENCE: f32 = 0.9;

/// English lines mentioning "none" anywhere are commentary, not flags.
static NONE_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bnone\b").expect("valid regex"));

/// Spanish only counts as "no flag" when the whole line says so; "ninguna
/// mejoría con reposo" is a real finding.
static NINGUNA_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:[-*•·]+\s*)?(?:ninguna|ninguno|nada)(?:\s+(?:más|otra|otras|otro|otros))?\s*[.!]?\s*$")
        .expect("valid regex")
});

static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*•·]+|\d+[.)])\s*").expect("valid regex"));

static RISK_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:risk|riesgo)(?:\s+level)?\s*[:=]\s*([[:alpha:]]+)").expect("valid regex")
});

static CONFIDENCE_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:confidence|confianza)\s*[:=]\s*([0-9]+(?:[.,][0-9]+)?)")
        .expect("valid regex")
});

// ---------------------------------------------------------------------------
// TriageStage
// ---------------------------------------------------------------------------

pub struct TriageStage {
    gateway: Arc<dyn InferenceGateway>,
    model: String,
    config: TriageConfig,
    timeout: Duration,
}

impl TriageStage {
    pub fn new(
        gateway: Arc<dyn InferenceGateway>,
        model: impl Into<String>,
        config: TriageConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            model: model.into(),
            config,
            timeout,
        }
    }

    pub async fn run(
        &self,
        transcript: &str,
        prompts: &PromptBuilder,
        catalog: &RedFlagCatalog,
    ) -> StageOutcome<TriageVerdict> {
        let prompt = prompts.triage(transcript, catalog.phrases());
        let params = GenerationParams::for_stage(CascadeStage::Triage)
            .max_output_tokens(self.config.max_output_tokens)
            .temperature(self.config.temperature)
            .timeout(self.timeout);

        match self
            .gateway
            .invoke(transcript, &prompt, &self.model, &params)
            .await
        {
            Ok(reply) => {
                let verdict = parse_reply(&reply, self.config.max_red_flags);
                log::info!(
                    "triage: {} red flag(s), risk={}, confidence={:.2}",
                    verdict.red_flags.len(),
                    verdict.risk_level,
                    verdict.confidence
                );
                StageOutcome::Ok(verdict)
            }
            Err(e) => {
                log::warn!("triage: recovered from {}: {e}", e.kind());
                StageOutcome::Degraded(
                    TriageVerdict::unavailable(format!("Cribado no disponible: {e}")),
                    format!("triage {}: {e}", e.kind()),
                )
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Reply parsing
// ---------------------------------------------------------------------------

/// Turn the raw triage reply into a verdict.  Total.
///
/// * `NONE` / `NINGUNA` alone means no flags.
/// * Otherwise every non-empty line is a flag, minus bullets, minus lines
///   mentioning none (or reading only "ninguna"), minus `RISK:` /
///   `CONFIDENCE:` metadata, capped at `max_flags`.
pub fn parse_reply(reply: &str, max_flags: usize) -> TriageVerdict {
    let trimmed = reply.trim();
    let mut red_flags: Vec<String> = Vec::new();
    let mut risk: Option<RiskLevel> = None;
    let mut confidence: Option<f32> = None;
    let mut capped = false;

    if !is_none_token(trimmed) {
        for line in trimmed.lines() {
            if let Some(caps) = RISK_LINE_RE.captures(line) {
                risk = risk.or(RiskLevel::parse(&caps[1]));
                continue;
            }
            if let Some(caps) = CONFIDENCE_LINE_RE.captures(line) {
                confidence = confidence.or(caps[1].replace(',', ".").parse().ok());
                continue;
            }
            if NONE_WORD_RE.is_match(line) || NINGUNA_LINE_RE.is_match(line) {
                continue;
            }
            let flag = BULLET_RE.replace(line, "").trim().to_string();
            if flag.is_empty() {
                continue;
            }
            if red_flags.iter().any(|f| f.eq_ignore_ascii_case(&flag)) {
                continue;
            }
            if red_flags.len() == max_flags {
                // Keep scanning: RISK / CONFIDENCE lines may follow the flags.
                if !capped {
                    log::debug!("triage: red flag list capped at {max_flags}");
                    capped = true;
                }
                continue;
            }
            red_flags.push(flag);
        }
    }

    let risk_level = risk.unwrap_or(if red_flags.is_empty() {
        RiskLevel::Low
    } else {
        RiskLevel::High
    });
    let confidence = confidence.unwrap_or(DEFAULT_CONFIDENCE).clamp(0.0, 1.0);
    let reasoning = if red_flags.is_empty() {
        "Sin banderas rojas en el cribado.".to_string()
    } else {
        format!("Banderas rojas detectadas: {}.", red_flags.join(", "))
    };

    TriageVerdict {
        red_flags,
        risk_level,
        confidence,
        reasoning,
    }
}

fn is_none_token(text: &str) -> bool {
    let token = text.trim_matches(|c: char| c.is_whitespace() || c == '.' || c == '"');
    token.eq_ignore_ascii_case(TRIAGE_NONE_TOKEN) || token.eq_ignore_ascii_case("ninguna")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
