//! Prompt builder for the three cascade stages.
//!
//! [`PromptBuilder`] produces one self-contained prompt string per stage.
//! Builders are pure: the output depends only on their inputs.  Prompts are
//! written in Spanish, the language of the consultations; the specialty is
//! selected at construction time and only changes the final-analysis
//! instructions.

use crate::cascade::types::{ClinicalFacts, TriageVerdict};
use crate::knowledge::Specialty;

// ---------------------------------------------------------------------------
// Instructions
// ---------------------------------------------------------------------------

/// Literal token the triage model returns when no red flag applies.
pub const TRIAGE_NONE_TOKEN: &str = "NONE";

const TRIAGE_INSTRUCTION: &str = "\
Eres un sistema de cribado clínico. Revisa la transcripción y decide cuáles de \
las BANDERAS ROJAS de la lista están respaldadas explícitamente por el texto.

Reglas:
1. Responde solo con banderas rojas de la lista, copiadas literalmente, una por línea.
2. No añadas explicaciones, numeración ni banderas que no estén en la lista.
3. Si ninguna aplica, responde únicamente: NONE
4. Opcionalmente, añade al final una línea `RISK: LOW|MEDIUM|HIGH` y otra \
`CONFIDENCE: <0-1>`.";

const EXTRACTION_INSTRUCTION: &str = "\
Extrae de la transcripción SOLO los hechos clínicos mencionados explícitamente.

Reglas:
1. Devuelve un único objeto JSON con las claves: symptoms, history, medications, \
functional_status, demographics.
2. Usa null para cualquier dato que no aparezca en la transcripción.
3. No infieras, no diagnostiques y no completes datos ausentes.
4. Responde solo con el JSON, sin texto adicional.";

const ANALYSIS_INSTRUCTION: &str = "\
Analiza la consulta clínica y genera documentación estructurada.

Responde con UN ÚNICO objeto JSON con esta forma:
{
  \"warnings\": [{\"severity\": \"LOW|MEDIUM|HIGH|CRITICAL\", \"category\": \"\", \"title\": \"\", \"description\": \"\", \"action\": \"\"}],
  \"suggestions\": [{\"type\": \"\", \"title\": \"\", \"description\": \"\", \"priority\": \"low|medium|high\"}],
  \"soap_note\": {\"subjective\": \"\", \"objective\": \"\", \"assessment\": \"\", \"plan\": \"\"},
  \"quality_score\": 0
}

Reglas:
1. Basa cada advertencia y sugerencia en la transcripción o en el contexto dado.
2. Toda bandera roja detectada debe reflejarse en al menos una advertencia.
3. quality_score (0-100) valora la completitud de la documentación.
4. Responde solo con el JSON.";

const PHYSIOTHERAPY_EXTRA: &str = "\
Incluye además las claves \"functional_goals\" (lista de objetivos funcionales) \
y \"treatment_techniques\" (lista de técnicas de tratamiento indicadas).";

// ---------------------------------------------------------------------------
// PromptBuilder
// ---------------------------------------------------------------------------

/// Builds the per-stage prompts.
///
/// ```rust
/// use clinical_cascade::knowledge::Specialty;
/// use clinical_cascade::llm::PromptBuilder;
///
/// let builder = PromptBuilder::new(Specialty::Physiotherapy);
/// let prompt = builder.triage("Dolor lumbar con dolor nocturno.", &["dolor nocturno".to_string()]);
/// assert!(prompt.contains("- dolor nocturno"));
/// ```
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    specialty: Specialty,
}

impl PromptBuilder {
    pub fn new(specialty: Specialty) -> Self {
        Self { specialty }
    }

    pub fn specialty(&self) -> Specialty {
        self.specialty
    }

    /// Red-flag screen: the catalog as a bullet list, then the transcript.
    pub fn triage(&self, transcript: &str, red_flags: &[String]) -> String {
        let mut prompt = String::with_capacity(1024 + transcript.len());
        prompt.push_str(TRIAGE_INSTRUCTION);
        prompt.push_str(&format!(
            "\n\nBANDERAS ROJAS ({}):\n",
            self.specialty.label_es()
        ));
        for flag in red_flags {
            prompt.push_str(&format!("- {flag}\n"));
        }
        push_transcript(&mut prompt, transcript);
        prompt.push_str("\nBanderas rojas presentes:\n");
        prompt
    }

    /// Fact extraction into the fixed categories.
    pub fn extraction(&self, transcript: &str) -> String {
        let mut prompt = String::with_capacity(1024 + transcript.len());
        prompt.push_str(EXTRACTION_INSTRUCTION);
        prompt.push('\n');
        push_transcript(&mut prompt, transcript);
        prompt.push_str("\nJSON:\n");
        prompt
    }

    /// Final analysis with triage and extraction results as context.
    pub fn final_analysis(
        &self,
        transcript: &str,
        verdict: &TriageVerdict,
        facts: &ClinicalFacts,
    ) -> String {
        let facts_block = facts.to_prompt_block();
        let mut prompt = String::with_capacity(2048 + transcript.len() + facts_block.len());
        prompt.push_str(ANALYSIS_INSTRUCTION);
        if self.specialty == Specialty::Physiotherapy {
            prompt.push('\n');
            prompt.push_str(PHYSIOTHERAPY_EXTRA);
        }

        prompt.push_str(&format!(
            "\n\nEspecialidad: {}\n",
            self.specialty.label_es()
        ));

        prompt.push_str("\nBanderas rojas detectadas en el cribado:\n");
        if verdict.red_flags.is_empty() {
            prompt.push_str("- ninguna\n");
        } else {
            for flag in &verdict.red_flags {
                prompt.push_str(&format!("- {flag}\n"));
            }
        }
        prompt.push_str(&format!("Nivel de riesgo: {}\n", verdict.risk_level));

        prompt.push_str("\nHechos clínicos extraídos:\n");
        prompt.push_str(&facts_block);
        prompt.push('\n');

        push_transcript(&mut prompt, transcript);
        prompt.push_str("\nJSON:\n");
        prompt
    }
}

fn push_transcript(prompt: &mut String, transcript: &str) {
    prompt.push_str("\nTRANSCRIPCIÓN:\n\"\"\"\n");
    prompt.push_str(transcript.trim());
    prompt.push_str("\n\"\"\"\n");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::types::RiskLevel;
    use serde_json::json;

    fn verdict(flags: &[&str]) -> TriageVerdict {
        TriageVerdict {
            red_flags: flags.iter().map(|s| s.to_string()).collect(),
            risk_level: if flags.is_empty() { RiskLevel::Low } else { RiskLevel::High },
            confidence: 0.9,
            reasoning: String::new(),
        }
    }

    #[test]
    fn triage_lists_catalog_and_none_token() {
        let builder = PromptBuilder::new(Specialty::Physiotherapy);
        let flags = vec!["fiebre".to_string(), "dolor nocturno".to_string()];
        let prompt = builder.triage("El paciente refiere fiebre.", &flags);

        assert!(prompt.contains("- fiebre\n- dolor nocturno\n"));
        assert!(prompt.contains(TRIAGE_NONE_TOKEN));
        assert!(prompt.contains("El paciente refiere fiebre."));
        assert!(prompt.contains("fisioterapia"));
    }

    #[test]
    fn extraction_names_every_category() {
        let prompt = PromptBuilder::new(Specialty::Psychology).extraction("texto");
        for category in ClinicalFacts::CATEGORIES {
            assert!(prompt.contains(category), "missing {category}");
        }
        assert!(prompt.contains("null"));
    }

    #[test]
    fn final_analysis_embeds_all_context() {
        let builder = PromptBuilder::new(Specialty::Physiotherapy);
        let facts = ClinicalFacts::from_value(json!({"symptoms": {"dolor": "lumbar"}})).unwrap();
        let prompt = builder.final_analysis("Dolor lumbar.", &verdict(&["dolor nocturno"]), &facts);

        assert!(prompt.contains("- dolor nocturno"));
        assert!(prompt.contains("Nivel de riesgo: HIGH"));
        assert!(prompt.contains("\"dolor\": \"lumbar\""));
        assert!(prompt.contains("Dolor lumbar."));
        assert!(prompt.contains("soap_note"));
        assert!(prompt.contains("functional_goals"));
    }

    #[test]
    fn final_analysis_without_flags_says_none() {
        let builder = PromptBuilder::new(Specialty::GeneralMedicine);
        let prompt = builder.final_analysis("Consulta.", &verdict(&[]), &ClinicalFacts::empty());
        assert!(prompt.contains("- ninguna"));
        assert!(!prompt.contains("functional_goals"));
    }

    #[test]
    fn builders_are_pure() {
        let builder = PromptBuilder::new(Specialty::Physiotherapy);
        let a = builder.extraction("mismo texto");
        let b = builder.extraction("mismo texto");
        assert_eq!(a, b);
    }
}
