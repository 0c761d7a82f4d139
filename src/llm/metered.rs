//! Metered gateway: wraps any [`InferenceGateway`] with the per-call
//! budget and cost/latency telemetry.
//!
//! The orchestrator always talks to the model through a `MeteredGateway`,
//! so a stage's timeout holds whatever backend sits underneath.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::config::InferenceConfig;
use crate::llm::gateway::{GenerationParams, InferenceError, InferenceGateway};
use crate::llm::telemetry::{estimate_tokens, CallOutcome, CallRecord, TelemetrySink};

/// Enforces `params.timeout` and emits one [`CallRecord`] per call.
pub struct MeteredGateway {
    inner: Arc<dyn InferenceGateway>,
    config: InferenceConfig,
    telemetry: Arc<dyn TelemetrySink>,
}

impl MeteredGateway {
    /// `config` supplies model prices for the cost estimate.
    pub fn new(
        inner: Arc<dyn InferenceGateway>,
        config: InferenceConfig,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            inner,
            config,
            telemetry,
        }
    }

    fn emit(
        &self,
        model: &str,
        params: &GenerationParams,
        started: Instant,
        prompt: &str,
        result: &Result<String, InferenceError>,
    ) {
        let input_tokens = estimate_tokens(prompt);
        let (output_tokens, outcome) = match result {
            Ok(text) => (estimate_tokens(text), CallOutcome::Success),
            Err(InferenceError::Timeout(_)) => (0, CallOutcome::Timeout),
            Err(InferenceError::Failure(_)) => (0, CallOutcome::Failure),
            Err(InferenceError::Refusal(_)) => (0, CallOutcome::Refusal),
        };
        let estimated_cost_usd = self
            .config
            .profile_for_model(model)
            .map(|p| p.estimate_cost(input_tokens, output_tokens))
            .unwrap_or(0.0);

        self.telemetry.record_call(&CallRecord {
            stage: params.stage,
            model: model.to_string(),
            latency: started.elapsed(),
            input_tokens,
            output_tokens,
            estimated_cost_usd,
            outcome,
        });
    }
}

#[async_trait]
impl InferenceGateway for MeteredGateway {
    async fn invoke(
        &self,
        transcript: &str,
        prompt: &str,
        model: &str,
        params: &GenerationParams,
    ) -> Result<String, InferenceError> {
        let started = Instant::now();
        let call = self.inner.invoke(transcript, prompt, model, params);

        let result = match params.timeout {
            Some(budget) => match tokio::time::timeout(budget, call).await {
                Ok(result) => result,
                Err(_elapsed) => Err(InferenceError::Timeout(budget)),
            },
            None => call.await,
        };

        if let Err(e) = &result {
            log::warn!("gateway: call to {model} ended in {}: {e}", e.kind());
        }

        self.emit(model, params, started, prompt, &result);
        result
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::telemetry::MemoryTelemetry;
    use crate::pipeline::CascadeStage;
    use std::time::Duration;

    struct Slow(Duration);

    #[async_trait]
    impl InferenceGateway for Slow {
        async fn invoke(
            &self,
            _t: &str,
            _p: &str,
            _m: &str,
            _params: &GenerationParams,
        ) -> Result<String, InferenceError> {
            tokio::time::sleep(self.0).await;
            Ok("late".into())
        }
    }

    struct Fixed(Result<String, InferenceError>);

    #[async_trait]
    impl InferenceGateway for Fixed {
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

    fn metered(inner: impl InferenceGateway + 'static) -> (MeteredGateway, Arc<MemoryTelemetry>) {
        let telemetry = Arc::new(MemoryTelemetry::new());
        let gateway = MeteredGateway::new(
            Arc::new(inner),
            InferenceConfig::default(),
            telemetry.clone(),
        );
        (gateway, telemetry)
    }

    #[tokio::test]
    async fn enforces_budget() {
        let (gateway, telemetry) = metered(Slow(Duration::from_secs(5)));
        let params = GenerationParams::for_stage(CascadeStage::Triage)
            .timeout(Duration::from_millis(20));

        let started = Instant::now();
        let result = gateway.invoke("t", "p", "claude-3-haiku", &params).await;

        assert_eq!(result, Err(InferenceError::Timeout(Duration::from_millis(20))));
        assert!(started.elapsed() < Duration::from_secs(1));
        let calls = telemetry.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].outcome, CallOutcome::Timeout);
        assert_eq!(calls[0].stage, Some(CascadeStage::Triage));
    }

    #[tokio::test]
    async fn success_records_cost_for_known_model() {
        let (gateway, telemetry) = metered(Fixed(Ok("respuesta larga del modelo".into())));
        let params = GenerationParams::default();

        let result = gateway
            .invoke("t", "prompt text", "claude-3-5-sonnet", &params)
            .await;

        assert_eq!(result.as_deref(), Ok("respuesta larga del modelo"));
        let calls = telemetry.calls();
        assert_eq!(calls[0].outcome, CallOutcome::Success);
        assert!(calls[0].estimated_cost_usd > 0.0);
        assert!(calls[0].output_tokens > 0);
    }

    #[tokio::test]
    async fn unknown_model_costs_nothing() {
        let (gateway, telemetry) = metered(Fixed(Ok("x".into())));
        let _ = gateway
            .invoke("t", "p", "mystery", &GenerationParams::default())
            .await;
        assert_eq!(telemetry.calls()[0].estimated_cost_usd, 0.0);
    }

    #[tokio::test]
    async fn passes_errors_through_and_records_kind() {
        let (gateway, telemetry) = metered(Fixed(Err(InferenceError::Refusal("no".into()))));
        let result = gateway
            .invoke("t", "p", "claude-3-haiku", &GenerationParams::default())
            .await;
        assert!(matches!(result, Err(InferenceError::Refusal(_))));
        assert_eq!(telemetry.calls()[0].outcome, CallOutcome::Refusal);
    }
}
