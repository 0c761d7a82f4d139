//! `ApiGateway`: calls any OpenAI-compatible `/v1/chat/completions`
//! endpoint (Ollama in OpenAI mode, OpenAI, Groq, LM Studio, vLLM, …).
//!
//! All connection details come from [`InferenceConfig`]; nothing is
//! hardcoded.  Per-model defaults for `max_tokens` and `temperature` come
//! from the configured [`ModelProfile`](crate::config::ModelProfile)s.

use async_trait::async_trait;

use crate::config::InferenceConfig;
use crate::llm::gateway::{looks_like_refusal, GenerationParams, InferenceError, InferenceGateway};

/// System message sent with every call; stage instructions travel in the
/// user message.
const SYSTEM_ROLE: &str = "\
Eres un asistente de documentación clínica. Respondes exactamente en el \
formato que se te pide y nunca inventas datos que no estén en la transcripción.";

/// Calls an OpenAI-compatible chat-completions endpoint.
pub struct ApiGateway {
    client: reqwest::Client,
    config: InferenceConfig,
}

impl ApiGateway {
    /// Build an `ApiGateway` from configuration.
    ///
    /// The HTTP client's own timeout is the longest stage budget; tighter
    /// per-call budgets are enforced by [`MeteredGateway`](crate::llm::MeteredGateway).
    pub fn from_config(config: &InferenceConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.max_timeout())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn request_body(&self, prompt: &str, model: &str, params: &GenerationParams) -> serde_json::Value {
        let (max_tokens, temperature) = params.resolve(self.config.profile_for_model(model));
        let mut body = serde_json::json!({
            "model":       model,
            "messages": [
                { "role": "system", "content": SYSTEM_ROLE },
                { "role": "user",   "content": prompt      }
            ],
            "stream":      false,
            "temperature": temperature,
            "max_tokens":  max_tokens
        });
        if params.json {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }
        body
    }
}

/// Pull the reply text out of a chat-completions response.
fn parse_completion(json: &serde_json::Value) -> Result<String, InferenceError> {
    let choice = &json["choices"][0];

    if choice["finish_reason"].as_str() == Some("content_filter") {
        return Err(InferenceError::Refusal(
            "response blocked by provider content filter".into(),
        ));
    }

    let text = choice["message"]["content"]
        .as_str()
        .ok_or_else(|| InferenceError::Failure("response has no message content".into()))?
        .trim()
        .to_string();

    if text.is_empty() {
        return Err(InferenceError::Failure("model returned an empty response".into()));
    }

    if looks_like_refusal(&text) {
        return Err(InferenceError::Refusal(text.chars().take(120).collect()));
    }

    Ok(text)
}

fn map_transport_error(e: reqwest::Error, params: &GenerationParams) -> InferenceError {
    if e.is_timeout() {
        InferenceError::Timeout(params.timeout.unwrap_or_default())
    } else {
        InferenceError::Failure(format!("HTTP request failed: {e}"))
    }
}

#[async_trait]
impl InferenceGateway for ApiGateway {
    /// The `Authorization: Bearer …` header is attached only when an API
    /// key is configured and non-empty.
    async fn invoke(
        &self,
        transcript: &str,
        prompt: &str,
        model: &str,
        params: &GenerationParams,
    ) -> Result<String, InferenceError> {
        log::debug!(
            "gateway: model={model} prompt_chars={} transcript_chars={}",
            prompt.len(),
            transcript.len()
        );

        let mut req = self
            .client
            .post(self.endpoint())
            .json(&self.request_body(prompt, model, params));

        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req
            .send()
            .await
            .map_err(|e| map_transport_error(e, params))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(InferenceError::Failure(format!(
                "backend returned {status}: {snippet}"
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| InferenceError::Failure(format!("failed to parse response: {e}")))?;

        parse_completion(&json)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
