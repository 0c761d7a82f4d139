//! Cascade orchestration.
//!
//! This module validates requests and drives each one through the cascade.
//!
//! # Architecture
//!
//! ```text
//! CascadeRequest (validated transcript + specialty)
//!        │
//!        ▼
//! CascadeOrchestrator::run()
//!        │
//!        ├─ tokio::join!(TriageStage, ExtractionStage)   economy model
//!        ├─ ModelSelector::decide / safe_fallback
//!        ├─ FinalAnalysisStage                            selected model
//!        └─ ResultAssembler::assemble                     → CascadeResult
//!
//! every model call ──▶ MeteredGateway ──▶ InferenceGateway
//!                          └─ TelemetrySink (per call / per stage)
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use clinical_cascade::config::AppConfig;
//! use clinical_cascade::knowledge::{FileKnowledgeSource, Specialty};
//! use clinical_cascade::llm::{ApiGateway, LogTelemetry};
//! use clinical_cascade::pipeline::{CascadeOrchestrator, CascadeRequest};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let orchestrator = Arc::new(CascadeOrchestrator::new(
//!         Arc::new(ApiGateway::from_config(&config.inference)),
//!         &config,
//!         &FileKnowledgeSource::new(config.knowledge.resolved_path()),
//!         Arc::new(LogTelemetry),
//!     ));
//!
//!     let request = CascadeRequest::from_config(
//!         "Paciente con lumbalgia y dolor nocturno.",
//!         Some(Specialty::Physiotherapy),
//!         &config.request,
//!     )
//!     .unwrap();
//!
//!     match orchestrator.run(&request).await {
//!         Ok(result) => println!("{}", serde_json::to_string_pretty(&result).unwrap()),
//!         Err(e) => eprintln!("{}", e.fallback_body()),
//!     }
//! }
//! ```

pub mod request;
pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use request::{CascadeRequest, RequestError};
pub use runner::{CascadeError, CascadeOrchestrator};
pub use state::CascadeStage;
