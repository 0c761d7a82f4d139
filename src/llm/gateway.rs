//! Core `InferenceGateway` trait, generation parameters and error taxonomy.
//!
//! Every cascade stage talks to the model through this one call:
//! `invoke(transcript, prompt, model, params) -> text`.  The transcript is
//! passed alongside the prompt so implementations can meter input size
//! without re-parsing the prompt; prompts already embed it.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::ModelProfile;
use crate::pipeline::CascadeStage;

// ---------------------------------------------------------------------------
// InferenceError
// ---------------------------------------------------------------------------

/// Errors a model call can end in.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    /// The call did not complete within its budget.
    #[error("inference timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Transport, HTTP status or response-shape error.
    #[error("inference failed: {0}")]
    Failure(String),

    /// The model answered with prose declining the task.
    #[error("model declined to answer: {0}")]
    Refusal(String),
}

impl InferenceError {
    /// Short label for logs and telemetry.
    pub fn kind(&self) -> &'static str {
        match self {
            InferenceError::Timeout(_) => "timeout",
            InferenceError::Failure(_) => "failure",
            InferenceError::Refusal(_) => "refusal",
        }
    }
}

// ---------------------------------------------------------------------------
// GenerationParams
// ---------------------------------------------------------------------------

/// Per-call generation options.  `None` fields use the model's defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationParams {
    pub max_output_tokens: Option<u32>,
    /// Clamped to `[0, 1]` when resolved.
    pub temperature: Option<f32>,
    /// Per-call budget; enforced by [`MeteredGateway`](crate::llm::MeteredGateway).
    pub timeout: Option<Duration>,
    /// Stage issuing the call, for telemetry.
    pub stage: Option<CascadeStage>,
    /// Ask the backend for a JSON object reply (`response_format`).
    pub json: bool,
}

impl GenerationParams {
    pub fn for_stage(stage: CascadeStage) -> Self {
        Self {
            stage: Some(stage),
            ..Self::default()
        }
    }

    pub fn max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn json_output(mut self) -> Self {
        self.json = true;
        self
    }

    /// Fill unspecified options from `profile`.
    pub fn resolve(&self, profile: Option<&ModelProfile>) -> (u32, f32) {
        let fallback = ModelProfile::default();
        let profile = profile.unwrap_or(&fallback);
        let max_tokens = self.max_output_tokens.unwrap_or(profile.default_max_tokens);
        let temperature = self
            .temperature
            .unwrap_or(profile.default_temperature)
            .clamp(0.0, 1.0);
        (max_tokens, temperature)
    }
}

// ---------------------------------------------------------------------------
// InferenceGateway trait
// ---------------------------------------------------------------------------

/// Async, object-safe model call used by every stage.
///
/// Implementors must be `Send + Sync` so they can be shared across
/// concurrent stages behind `Arc<dyn InferenceGateway>`.  No implementation
/// retries internally.
#[async_trait]
pub trait InferenceGateway: Send + Sync {
    async fn invoke(
        &self,
        transcript: &str,
        prompt: &str,
        model: &str,
        params: &GenerationParams,
    ) -> Result<String, InferenceError>;
}

// ---------------------------------------------------------------------------
// Refusal detection
// ---------------------------------------------------------------------------

const REFUSAL_OPENERS: &[&str] = &[
    "i'm sorry",
    "i am sorry",
    "i cannot",
    "i can't",
    "i can not",
    "i'm unable",
    "i am unable",
    "as an ai",
    "lo siento",
    "no puedo",
    "lamento no poder",
    "como modelo de lenguaje",
];

/// `true` when `text` reads like the model declining the task: it opens
/// with a known refusal phrase and carries no JSON object.
pub fn looks_like_refusal(text: &str) -> bool {
    let lowered = text.trim_start().to_lowercase();
    if lowered.contains('{') {
        return false;
    }
    REFUSAL_OPENERS
        .iter()
        .any(|opener| lowered.starts_with(opener))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_uses_profile_defaults() {
        let params = GenerationParams::default();
        let profile = ModelProfile::premium();
        assert_eq!(params.resolve(Some(&profile)), (4_000, 0.1));
    }

    #[test]
    fn resolve_prefers_explicit_values_and_clamps() {
        let params = GenerationParams::default()
            .max_output_tokens(50)
            .temperature(1.7);
        assert_eq!(params.resolve(Some(&ModelProfile::economy())), (50, 1.0));
    }

    #[test]
    fn resolve_without_profile_uses_economy_defaults() {
        let (tokens, _) = GenerationParams::default().resolve(None);
        assert_eq!(tokens, ModelProfile::economy().default_max_tokens);
    }

    #[test]
    fn detects_refusals_in_both_languages() {
        assert!(looks_like_refusal("I'm sorry, but I can't help with that."));
        assert!(looks_like_refusal("  Lo siento, no puedo analizar esta consulta."));
        assert!(!looks_like_refusal("NONE"));
        assert!(!looks_like_refusal("I'm sorry for the format: {\"a\": 1}"));
    }

    #[test]
    fn error_kinds_are_distinct() {
        assert_eq!(InferenceError::Timeout(Duration::from_secs(5)).kind(), "timeout");
        assert_eq!(InferenceError::Failure("x".into()).kind(), "failure");
        assert_eq!(InferenceError::Refusal("x".into()).kind(), "refusal");
        assert_eq!(
            InferenceError::Timeout(Duration::from_millis(1500)).to_string(),
            "inference timed out after 1500ms"
        );
    }

    #[test]
    fn gateway_is_object_safe() {
        struct Echo;

        #[async_trait]
        impl InferenceGateway for Echo {
            async fn invoke(
                &self,
                _t: &str,
                prompt: &str,
                _m: &str,
                _p: &GenerationParams,
            ) -> Result<String, InferenceError> {
                Ok(prompt.to_string())
            }
        }

        let gateway: Box<dyn InferenceGateway> = Box::new(Echo);
        drop(gateway);
    }
}
