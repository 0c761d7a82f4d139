//! Final contextualised analysis on the selected model.
//!
//! The reply goes through [`recover`](crate::recovery::recover) and a lenient
//! decoder.  When recovery is exhausted, nothing usable decodes, or the model
//! refuses, the stage degrades into [`manual_review_payload`].  Timeouts and
//! transport failures are not recovered here; they surface to the
//! orchestrator as errors.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::cascade::outcome::StageOutcome;
use crate::cascade::types::{
    ClinicalFacts, FinalAnalysis, ModelDecision, Severity, SoapNote, Suggestion, TriageVerdict,
    Warning,
};
use crate::config::{AnalysisConfig, InferenceConfig};
use crate::llm::{GenerationParams, InferenceError, InferenceGateway, PromptBuilder};
use crate::pipeline::CascadeStage;
use crate::recovery::recover;

// ---------------------------------------------------------------------------
// FinalAnalysisStage
// ---------------------------------------------------------------------------

pub struct FinalAnalysisStage {
    gateway: Arc<dyn InferenceGateway>,
    inference: InferenceConfig,
    config: AnalysisConfig,
}

impl FinalAnalysisStage {
    pub fn new(
        gateway: Arc<dyn InferenceGateway>,
        inference: InferenceConfig,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            gateway,
            inference,
            config,
        }
    }

    fn timeout(&self) -> Duration {
        self.inference.timeouts.analysis()
    }

    pub async fn run(
        &self,
        transcript: &str,
        prompts: &PromptBuilder,
        verdict: &TriageVerdict,
        facts: &ClinicalFacts,
        decision: &ModelDecision,
    ) -> Result<StageOutcome<FinalAnalysis>, InferenceError> {
        let tier = decision.selected_model;
        let model = &self.inference.profile(tier).id;
        let (max_tokens, temperature) = self.config.budget(tier);

        let prompt = prompts.final_analysis(transcript, verdict, facts);
        let params = GenerationParams::for_stage(CascadeStage::FinalAnalysis)
            .max_output_tokens(max_tokens)
            .temperature(temperature)
            .timeout(self.timeout())
            .json_output();

        log::info!("analysis: calling {tier} model {model} (max_tokens={max_tokens})");

        let reply = match self.gateway.invoke(transcript, &prompt, model, &params).await {
            Ok(reply) => reply,
            Err(InferenceError::Refusal(reason)) => {
                log::warn!("analysis: model refused, manual review required");
                return Ok(StageOutcome::Degraded(
                    manual_review_payload(),
                    format!("final analysis refused: {reason}"),
                ));
            }
            Err(e) => {
                log::error!("analysis: {} from {model}: {e}", e.kind());
                return Err(e);
            }
        };

        let recovery = recover(&reply);
        if recovery.is_exhausted() {
            log::warn!("analysis: recovery exhausted ({})", recovery.trace);
            return Ok(StageOutcome::Degraded(
                manual_review_payload(),
                "final analysis unparseable: recovery exhausted".into(),
            ));
        }

        let analysis = decode_analysis(&recovery.value);
        if analysis.is_empty() {
            log::warn!(
                "analysis: {} recovery yielded nothing usable",
                recovery.tier
            );
            return Ok(StageOutcome::Degraded(
                manual_review_payload(),
                format!("final analysis empty after {} recovery", recovery.tier),
            ));
        }

        log::info!(
            "analysis: {} warning(s), {} suggestion(s), {}/4 SOAP sections (recovered at {})",
            analysis.warnings.len(),
            analysis.suggestions.len(),
            analysis.soap_note.populated_sections(),
            recovery.tier
        );
        Ok(StageOutcome::Ok(analysis))
    }
}

// ---------------------------------------------------------------------------
// Manual-review payload
// ---------------------------------------------------------------------------

/// Deterministic result shown when the analysis could not be recovered.
pub fn manual_review_payload() -> FinalAnalysis {
    FinalAnalysis {
        warnings: vec![Warning {
            severity: Severity::High,
            category: "sistema".into(),
            title: "Análisis automático fallido".into(),
            description: "No se pudo interpretar la respuesta del modelo para esta consulta."
                .into(),
            action: "Revisar la transcripción y documentar la consulta manualmente.".into(),
        }],
        suggestions: vec![Suggestion {
            kind: "revision".into(),
            title: "Revisión manual".into(),
            description: "Completar la nota SOAP manualmente a partir de la transcripción."
                .into(),
            priority: "high".into(),
        }],
        soap_note: SoapNote::default(),
        functional_goals: Vec::new(),
        treatment_techniques: Vec::new(),
        quality_score: Some(0),
    }
}

// ---------------------------------------------------------------------------
// Lenient decoding
// ---------------------------------------------------------------------------

const SOAP_CONTAINERS: [&str; 3] = ["soap_note", "soapNote", "soap"];

/// Decode a recovered document into a [`FinalAnalysis`].
///
/// Total: unknown shapes decode to empty parts rather than errors.
pub fn decode_analysis(doc: &Value) -> FinalAnalysis {
    let Some(root) = doc.as_object() else {
        return FinalAnalysis::default();
    };

    FinalAnalysis {
        warnings: items(root, &["warnings", "advertencias"])
            .iter()
            .filter_map(decode_warning)
            .collect(),
        suggestions: items(root, &["suggestions", "sugerencias"])
            .iter()
            .filter_map(decode_suggestion)
            .collect(),
        soap_note: decode_soap(root),
        functional_goals: strings(root, &["functional_goals", "functionalGoals"]),
        treatment_techniques: strings(root, &["treatment_techniques", "treatmentTechniques"]),
        quality_score: first(root, &["quality_score", "qualityScore"]).and_then(decode_score),
    }
}

fn first<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

fn items<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> &'a [Value] {
    first(obj, keys)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn text(obj: &Map<String, Value>, keys: &[&str]) -> String {
    first(obj, keys).map(flatten_text).unwrap_or_default()
}

/// Strings pass through, lists are joined with newlines, scalars are printed.
fn flatten_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Array(parts) => parts
            .iter()
            .map(flatten_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn strings(obj: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    match first(obj, keys) {
        Some(Value::Array(parts)) => parts
            .iter()
            .map(flatten_text)
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

fn decode_warning(value: &Value) -> Option<Warning> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(Warning {
            severity: Severity::Medium,
            category: "general".into(),
            title: s.trim().to_string(),
            description: String::new(),
            action: String::new(),
        }),
        Value::Object(obj) => {
            let title = text(obj, &["title", "titulo", "título"]);
            let description = text(obj, &["description", "descripcion", "descripción"]);
            if title.is_empty() && description.is_empty() {
                return None;
            }
            Some(Warning {
                severity: Severity::parse_lenient(&text(obj, &["severity", "severidad"])),
                category: text(obj, &["category", "categoria", "categoría"]),
                title,
                description,
                action: text(obj, &["action", "accion", "acción"]),
            })
        }
        _ => None,
    }
}

fn decode_suggestion(value: &Value) -> Option<Suggestion> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(Suggestion {
            kind: "general".into(),
            title: s.trim().to_string(),
            description: String::new(),
            priority: "medium".into(),
        }),
        Value::Object(obj) => {
            let title = text(obj, &["title", "titulo", "título"]);
            let description = text(obj, &["description", "descripcion", "descripción"]);
            if title.is_empty() && description.is_empty() {
                return None;
            }
            let priority = text(obj, &["priority", "prioridad"]);
            Some(Suggestion {
                kind: text(obj, &["type", "kind", "tipo"]),
                title,
                description,
                priority: if priority.is_empty() {
                    "medium".into()
                } else {
                    priority.to_lowercase()
                },
            })
        }
        _ => None,
    }
}

fn decode_soap(root: &Map<String, Value>) -> SoapNote {
    let container = first(root, &SOAP_CONTAINERS)
        .and_then(Value::as_object)
        .unwrap_or(root);

    SoapNote {
        subjective: text(container, &["subjective", "subjetivo", "S"]),
        objective: text(container, &["objective", "objetivo", "O"]),
        assessment: text(container, &["assessment", "evaluacion", "evaluación", "analisis", "análisis", "A"]),
        plan: text(container, &["plan", "P"]),
    }
}

fn decode_score(value: &Value) -> Option<u8> {
    let score = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !score.is_finite() {
        return None;
    }
    Some(score.round().clamp(0.0, 100.0) as u8)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::selector::ModelSelector;
    use crate::cascade::types::{ModelTier, RiskLevel};
    use crate::knowledge::Specialty;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Replies with a fixed result and remembers the model it was asked for.
    struct Scripted {
        reply: Result<String, InferenceError>,
        models: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl InferenceGateway for Scripted {
        async fn invoke(
            &self,
            _t: &str,
            _p: &str,
            model: &str,
            _params: &GenerationParams,
        ) -> Result<String, InferenceError> {
            self.models.lock().unwrap().push(model.to_string());
            self.reply.clone()
        }
    }

    fn verdict(flags: &[&str]) -> TriageVerdict {
        TriageVerdict {
            red_flags: flags.iter().map(|s| s.to_string()).collect(),
            risk_level: RiskLevel::Low,
            confidence: 0.9,
            reasoning: String::new(),
        }
    }

    async fn run_with(
        reply: Result<String, InferenceError>,
        flags: &[&str],
    ) -> (Result<StageOutcome<FinalAnalysis>, InferenceError>, Vec<String>) {
        let gateway = Arc::new(Scripted {
            reply,
            models: Mutex::new(Vec::new()),
        });
        let stage = FinalAnalysisStage::new(
            gateway.clone(),
            InferenceConfig::default(),
            AnalysisConfig::default(),
        );
        let v = verdict(flags);
        let decision = ModelSelector::default().decide(&v);
        let result = stage
            .run(
                "Dolor lumbar de tres semanas.",
                &PromptBuilder::new(Specialty::Physiotherapy),
                &v,
                &ClinicalFacts::empty(),
                &decision,
            )
            .await;
        let models = gateway.models.lock().unwrap().clone();
        (result, models)
    }

    // ---- decode_analysis ---

    #[test]
    fn decodes_canonical_document() {
        let doc = json!({
            "warnings": [{"severity": "HIGH", "category": "clinica", "title": "T",
                          "description": "D", "action": "A"}],
            "suggestions": [{"type": "ejercicio", "title": "Puente", "description": "3x10",
                             "priority": "HIGH"}],
            "soap_note": {"subjective": "s", "objective": "o", "assessment": "a", "plan": "p"},
            "functional_goals": ["caminar"],
            "treatment_techniques": ["terapia manual"],
            "quality_score": 85
        });
        let analysis = decode_analysis(&doc);
        assert_eq!(analysis.warnings[0].severity, Severity::High);
        assert_eq!(analysis.suggestions[0].kind, "ejercicio");
        assert_eq!(analysis.suggestions[0].priority, "high");
        assert_eq!(analysis.soap_note.populated_sections(), 4);
        assert_eq!(analysis.functional_goals, vec!["caminar"]);
        assert_eq!(analysis.treatment_techniques, vec!["terapia manual"]);
        assert_eq!(analysis.quality_score, Some(85));
    }

    #[test]
    fn soap_may_be_top_level_or_camel_case() {
        let top = decode_analysis(&json!({"subjective": "s", "plan": ["a", "b"]}));
        assert_eq!(top.soap_note.subjective, "s");
        assert_eq!(top.soap_note.plan, "a\nb");

        let camel = decode_analysis(&json!({"soapNote": {"objective": "o"}}));
        assert_eq!(camel.soap_note.objective, "o");

        let short = decode_analysis(&json!({"soap": {"assessment": "a"}}));
        assert_eq!(short.soap_note.assessment, "a");
    }

    #[test]
    fn severities_are_lenient() {
        let doc = json!({"warnings": [
            {"severity": "crítica", "title": "a"},
            {"severity": "alta", "title": "b"},
            {"severity": "whatever", "title": "c"},
            {"title": "d"},
            "texto libre",
            {"severity": "LOW"},
            42
        ]});
        let severities: Vec<_> = decode_analysis(&doc).warnings.iter().map(|w| w.severity).collect();
        assert_eq!(
            severities,
            vec![Severity::Critical, Severity::High, Severity::Medium, Severity::Medium, Severity::Medium]
        );
    }

    #[test]
    fn scores_are_clamped_and_parsed() {
        assert_eq!(decode_analysis(&json!({"quality_score": 140})).quality_score, Some(100));
        assert_eq!(decode_analysis(&json!({"qualityScore": "70%"})).quality_score, Some(70));
        assert_eq!(decode_analysis(&json!({"quality_score": -3})).quality_score, Some(0));
        assert_eq!(decode_analysis(&json!({"quality_score": "alta"})).quality_score, None);
    }

    #[test]
    fn non_objects_decode_empty() {
        assert!(decode_analysis(&json!([1, 2])).is_empty());
        assert!(decode_analysis(&json!("texto")).is_empty());
    }

    #[test]
    fn manual_review_payload_is_fixed() {
        let payload = manual_review_payload();
        assert_eq!(payload, manual_review_payload());
        assert_eq!(payload.warnings.len(), 1);
        assert_eq!(payload.warnings[0].severity, Severity::High);
        assert_eq!(payload.suggestions.len(), 1);
        assert!(payload.soap_note.is_empty());
        assert_eq!(payload.quality_score, Some(0));
    }

    // ---- FinalAnalysisStage::run ---

    #[tokio::test]
    async fn uses_selected_tier() {
        let reply = r#"{"soap_note": {"subjective": "s"}}"#.to_string();
        let (result, models) = run_with(Ok(reply.clone()), &["dolor nocturno"]).await;
        assert!(result.unwrap().is_ok());
        assert_eq!(models, vec![InferenceConfig::default().profile(ModelTier::Premium).id.clone()]);

        let (_, models) = run_with(Ok(reply), &[]).await;
        assert_eq!(models, vec![InferenceConfig::default().economy.id]);
    }

    #[tokio::test]
    async fn unparseable_reply_degrades_to_manual_review() {
        let (result, _) = run_with(Ok("Consulta sin hallazgos relevantes.".into()), &[]).await;
        let outcome = result.unwrap();
        assert!(outcome.is_degraded());
        assert_eq!(outcome.value(), Some(&manual_review_payload()));
    }

    #[tokio::test]
    async fn empty_document_degrades_to_manual_review() {
        let (result, _) = run_with(Ok("{\"warnings\": []}".into()), &[]).await;
        assert!(result.unwrap().is_degraded());
    }

    #[tokio::test]
    async fn refusal_degrades_to_manual_review() {
        let (result, _) =
            run_with(Err(InferenceError::Refusal("Lo siento".into())), &[]).await;
        let outcome = result.unwrap();
        assert!(outcome.is_degraded());
        assert!(outcome.reason().unwrap().contains("refused"));
    }

    #[tokio::test]
    async fn timeout_and_failure_surface() {
        let timeout = InferenceError::Timeout(Duration::from_secs(30));
        let (result, _) = run_with(Err(timeout.clone()), &["fiebre"]).await;
        assert_eq!(result.unwrap_err(), timeout);

        let (result, _) = run_with(Err(InferenceError::Failure("503".into())), &[]).await;
        assert!(matches!(result, Err(InferenceError::Failure(_))));
    }
}
