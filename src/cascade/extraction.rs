//! Structured fact extraction on the economy model.  Never fatal.

use std::sync::Arc;
use std::time::Duration;

use crate::cascade::outcome::StageOutcome;
use crate::cascade::types::ClinicalFacts;
use crate::config::ExtractionConfig;
use crate::llm::{GenerationParams, InferenceGateway, PromptBuilder};
use crate::pipeline::CascadeStage;
use crate::recovery::strategies::brace_span;

pub struct ExtractionStage {
    gateway: Arc<dyn InferenceGateway>,
    model: String,
    config: ExtractionConfig,
    timeout: Duration,
}

impl ExtractionStage {
    pub fn new(
        gateway: Arc<dyn InferenceGateway>,
        model: impl Into<String>,
        config: ExtractionConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            model: model.into(),
            config,
            timeout,
        }
    }

    /// `Failed` when the call errors; empty facts, reported as `Degraded`,
    /// when the reply holds no usable object.
    pub async fn run(&self, transcript: &str, prompts: &PromptBuilder) -> StageOutcome<ClinicalFacts> {
        let prompt = prompts.extraction(transcript);
        let params = GenerationParams::for_stage(CascadeStage::Extraction)
            .max_output_tokens(self.config.max_output_tokens)
            .temperature(self.config.temperature)
            .timeout(self.timeout)
            .json_output();

        let reply = match self
            .gateway
            .invoke(transcript, &prompt, &self.model, &params)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                log::warn!("extraction: no reply ({}): {e}", e.kind());
                return StageOutcome::Failed(format!("extraction {}: {e}", e.kind()));
            }
        };

        match parse_facts(&reply) {
            Some(facts) => {
                log::info!(
                    "extraction: {} categor(ies) with data",
                    ClinicalFacts::CATEGORIES
                        .iter()
                        .filter(|c| facts.category(c).is_some())
                        .count()
                );
                StageOutcome::Ok(facts)
            }
            None => {
                log::warn!(
                    "extraction: no JSON object in {}-char reply, using empty facts",
                    reply.len()
                );
                StageOutcome::Degraded(
                    ClinicalFacts::empty(),
                    "extraction reply held no JSON object".into(),
                )
            }
        }
    }
}

/// First `{` … last `}` span parsed as an object.
pub fn parse_facts(reply: &str) -> Option<ClinicalFacts> {
    brace_span(reply).and_then(ClinicalFacts::from_value)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::Specialty;
    use crate::llm::InferenceError;
    use async_trait::async_trait;
    use serde_json::json;

    struct Reply(Result<String, InferenceError>);

    #[async_trait]
    impl InferenceGateway for Reply {
        async fn invoke(
            &self,
            _t: &str,
            _p: &str,
            _m: &str,
            _params: &GenerationParams,
        ) -> Result<String, InferenceError> {
            self.0.clone()
        }
    }

    async fn run(reply: Result<String, InferenceError>) -> StageOutcome<ClinicalFacts> {
        let stage = ExtractionStage::new(
            Arc::new(Reply(reply)),
            "claude-3-haiku",
            ExtractionConfig::default(),
            Duration::from_secs(15),
        );
        stage
            .run("Mujer de 45 años con lumbalgia.", &PromptBuilder::new(Specialty::Physiotherapy))
            .await
    }

    #[test]
    fn parses_object_inside_prose() {
        let facts = parse_facts("Hechos:\n{\"demographics\": {\"edad\": 45}, \"history\": null}\nFin").unwrap();
        assert_eq!(facts.category("demographics"), Some(&json!({"edad": 45})));
        assert_eq!(facts.category("history"), None);
    }

    #[test]
    fn rejects_non_objects_and_garbage() {
        assert!(parse_facts("[1, 2]").is_none());
        assert!(parse_facts("sin datos").is_none());
        assert!(parse_facts("{roto").is_none());
    }

    #[tokio::test]
    async fn run_returns_facts() {
        let outcome = run(Ok("{\"symptoms\": {\"dolor\": \"lumbar\"}}".into())).await;
        assert!(outcome.is_ok());
        assert!(outcome.value().unwrap().category("symptoms").is_some());
    }

    #[tokio::test]
    async fn run_degrades_on_parse_failure() {
        let outcome = run(Ok("No encontré hechos.".into())).await;
        assert!(outcome.is_degraded());
        assert!(outcome.value().unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_fails_on_inference_error() {
        let outcome = run(Err(InferenceError::Timeout(Duration::from_secs(15)))).await;
        assert!(matches!(outcome, StageOutcome::Failed(_)));
        assert!(outcome.value().is_none());
        assert!(outcome.reason().unwrap().contains("timeout"));
    }

    #[tokio::test]
    async fn run_asks_for_json_output() {
        struct JsonOnly;

        #[async_trait]
        impl InferenceGateway for JsonOnly {
            async fn invoke(
                &self,
                _t: &str,
                _p: &str,
                _m: &str,
                params: &GenerationParams,
            ) -> Result<String, InferenceError> {
                if params.json {
                    Ok("{\"history\": {\"cirugias\": 1}}".into())
                } else {
                    Err(InferenceError::Failure("plain text requested".into()))
                }
            }
        }

        let stage = ExtractionStage::new(
            Arc::new(JsonOnly),
            "claude-3-haiku",
            ExtractionConfig::default(),
            Duration::from_secs(15),
        );
        let outcome = stage
            .run("Operada de rodilla en 2019.", &PromptBuilder::new(Specialty::Physiotherapy))
            .await;
        assert!(outcome.is_ok());
    }
}
