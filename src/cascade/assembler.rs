//! Merge stage outputs into the final [`CascadeResult`].  Pure and
//! infallible.

use std::collections::HashSet;

use crate::cascade::types::{
    CascadeResult, ClinicalFacts, FinalAnalysis, ModelDecision, Severity, SoapNote, StageNote,
    TriageVerdict, Warning,
};

/// Points per populated SOAP section when the model gave no score.
const POINTS_PER_SOAP_SECTION: u8 = 25;

/// Everything the assembler merges.
#[derive(Debug, Clone)]
pub struct StageOutputs {
    pub triage: TriageVerdict,
    pub facts: ClinicalFacts,
    pub decision: ModelDecision,
    pub analysis: FinalAnalysis,
    pub notes: Vec<StageNote>,
}

pub struct ResultAssembler;

impl ResultAssembler {
    /// Triage alerts first, then model warnings, de-duplicated by title.
    pub fn assemble(outputs: StageOutputs) -> CascadeResult {
        let StageOutputs {
            triage,
            facts,
            decision,
            analysis,
            notes,
        } = outputs;

        let quality_score = quality_score(&analysis);

        let warnings = dedupe_by_title(
            triage
                .red_flags
                .iter()
                .map(|flag| red_flag_warning(flag))
                .chain(analysis.warnings),
        );

        CascadeResult {
            warnings,
            suggestions: analysis.suggestions,
            soap_note: analysis.soap_note,
            functional_goals: analysis.functional_goals,
            treatment_techniques: analysis.treatment_techniques,
            quality_score,
            triage,
            clinical_facts: facts,
            model_decision: decision,
            stage_notes: notes,
        }
    }
}

/// The CRITICAL alert raised for one triage red flag.
pub fn red_flag_warning(flag: &str) -> Warning {
    Warning {
        severity: Severity::Critical,
        category: "red_flag".into(),
        title: format!("Bandera roja: {flag}"),
        description: format!("El cribado detectó la bandera roja «{flag}» en la transcripción."),
        action: "Valorar derivación médica urgente antes de continuar el tratamiento.".into(),
    }
}

/// Keep the first warning for each title; comparison ignores case and
/// whitespace.
pub fn dedupe_by_title(warnings: impl IntoIterator<Item = Warning>) -> Vec<Warning> {
    let mut seen = HashSet::new();
    warnings
        .into_iter()
        .filter(|w| seen.insert(title_key(&w.title)))
        .collect()
}

fn title_key(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// The model's own score, or 25 points per populated SOAP section.
pub fn quality_score(analysis: &FinalAnalysis) -> u8 {
    analysis
        .quality_score
        .map(|s| s.min(100))
        .unwrap_or_else(|| soap_score(&analysis.soap_note))
}

fn soap_score(soap: &SoapNote) -> u8 {
    soap.populated_sections() as u8 * POINTS_PER_SOAP_SECTION
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
