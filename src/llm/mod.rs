//! Inference layer for the clinical cascade.
//!
//! This module provides:
//! * [`InferenceGateway`]: async trait every stage calls the model through.
//! * [`ApiGateway`]: OpenAI-compatible REST implementation.
//! * [`MeteredGateway`]: wraps any gateway with per-call budgets and telemetry.
//! * [`PromptBuilder`]: builds the triage / extraction / analysis prompts.
//! * [`TelemetrySink`]: injected cost/latency telemetry capability.
//! * [`InferenceError`]: timeout / failure / refusal taxonomy.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use clinical_cascade::config::AppConfig;
//! use clinical_cascade::llm::{ApiGateway, GenerationParams, InferenceGateway, LogTelemetry, MeteredGateway};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let gateway = MeteredGateway::new(
//!         Arc::new(ApiGateway::from_config(&config.inference)),
//!         config.inference.clone(),
//!         Arc::new(LogTelemetry),
//!     );
//!
//!     let params = GenerationParams::default()
//!         .max_output_tokens(100)
//!         .timeout(config.inference.timeouts.triage());
//!     let reply = gateway
//!         .invoke("transcripción", "prompt", &config.inference.economy.id, &params)
//!         .await;
//!     println!("{reply:?}");
//! }
//! ```

pub mod api;
pub mod gateway;
pub mod metered;
pub mod prompt;
pub mod telemetry;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use api::ApiGateway;
pub use gateway::{looks_like_refusal, GenerationParams, InferenceError, InferenceGateway};
pub use metered::MeteredGateway;
pub use prompt::{PromptBuilder, TRIAGE_NONE_TOKEN};
pub use telemetry::{
    CallOutcome, CallRecord, LogTelemetry, MemoryTelemetry, NoopTelemetry, StageRecord,
    TelemetrySink,
};
