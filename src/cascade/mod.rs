//! The inference cascade: stages, model selection and result assembly.
//!
//! ```text
//! transcript ─┬─▶ TriageStage     ──▶ TriageVerdict ─┐
//!             └─▶ ExtractionStage ──▶ ClinicalFacts ─┤
//!                                                    ▼
//!                          ModelSelector::decide ──▶ ModelDecision
//!                                                    ▼
//!                                    FinalAnalysisStage ──▶ FinalAnalysis
//!                                                    ▼
//!                                    ResultAssembler ──▶ CascadeResult
//! ```

pub mod analysis;
pub mod assembler;
pub mod extraction;
pub mod outcome;
pub mod selector;
pub mod triage;
pub mod types;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use analysis::{decode_analysis, manual_review_payload, FinalAnalysisStage};
pub use assembler::{ResultAssembler, StageOutputs};
pub use extraction::ExtractionStage;
pub use outcome::StageOutcome;
pub use selector::ModelSelector;
pub use triage::TriageStage;
pub use types::{
    CascadeResult, ClinicalFacts, CostEstimate, FinalAnalysis, ModelDecision, ModelTier,
    RiskLevel, Severity, SoapNote, StageNote, Suggestion, TriageVerdict, Warning,
};
