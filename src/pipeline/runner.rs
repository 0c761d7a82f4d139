//! Cascade orchestrator: drives one transcript through every stage.
//!
//! # Pipeline flow
//!
//! ```text
//! CascadeRequest
//!   └─▶ tokio::join!(triage, extraction)            [Triage | Extraction]
//!         └─▶ decide / safe_fallback                [Selection]
//!               └─▶ final analysis                  [FinalAnalysis]
//!                     ├─ Ok / Degraded → assemble   [Assembly] → CascadeResult
//!                     └─ timeout / failure          → CascadeError (carries red flags)
//! ```
//!
//! Triage and extraction failures never stop a run; they leave a
//! [`StageNote`] on the result.  All model calls go through a
//! [`MeteredGateway`], which enforces each stage's time budget.

use std::borrow::Cow;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use thiserror::Error;

use crate::cascade::assembler::red_flag_warning;
use crate::cascade::{
    manual_review_payload, CascadeResult, ExtractionStage, FinalAnalysisStage, ModelDecision,
    ModelSelector, ResultAssembler, StageNote, StageOutcome, StageOutputs, TriageStage,
    TriageVerdict,
};
use crate::config::AppConfig;
use crate::knowledge::{KnowledgeSource, RedFlagCatalog, Specialty};
use crate::llm::{
    InferenceError, InferenceGateway, MeteredGateway, PromptBuilder, StageRecord, TelemetrySink,
};

use super::request::CascadeRequest;
use super::state::CascadeStage;

// ---------------------------------------------------------------------------
// CascadeError
// ---------------------------------------------------------------------------

/// A run that produced no [`CascadeResult`].
#[derive(Debug, Error)]
pub enum CascadeError {
    /// The final analysis call timed out or failed.  Triage already ran, so
    /// its red flags travel with the error.
    #[error("final analysis failed: {source}")]
    FinalAnalysisFailed {
        source: InferenceError,
        triage: TriageVerdict,
        model_decision: ModelDecision,
        stage_notes: Vec<StageNote>,
    },

    /// The caller cancelled the run; in-flight calls were abandoned.
    #[error("cascade run cancelled")]
    Cancelled,
}

impl CascadeError {
    /// Red flags detected before the failure, if any.
    pub fn red_flags(&self) -> &[String] {
        match self {
            CascadeError::FinalAnalysisFailed { triage, .. } => &triage.red_flags,
            CascadeError::Cancelled => &[],
        }
    }

    /// Deterministic error body for callers that still need a readable
    /// result: the red-flag alerts plus the manual-review payload.
    pub fn fallback_body(&self) -> serde_json::Value {
        let review = manual_review_payload();
        let warnings: Vec<_> = self
            .red_flags()
            .iter()
            .map(|flag| red_flag_warning(flag))
            .chain(review.warnings)
            .collect();

        let mut body = json!({
            "error": self.to_string(),
            "redFlags": self.red_flags(),
            "warnings": warnings,
            "suggestions": review.suggestions,
            "soapNote": review.soap_note,
            "qualityScore": 0
        });
        if let CascadeError::FinalAnalysisFailed {
            source,
            triage,
            model_decision,
            stage_notes,
        } = self
        {
            body["errorKind"] = json!(source.kind());
            body["triage"] = json!(triage);
            body["modelDecision"] = json!(model_decision);
            body["stageNotes"] = json!(stage_notes);
        }
        body
    }
}

// ---------------------------------------------------------------------------
// CascadeOrchestrator
// ---------------------------------------------------------------------------

/// Runs the cascade.  `Send + Sync`; share one behind an `Arc` across
/// concurrent requests.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use clinical_cascade::config::AppConfig;
/// use clinical_cascade::knowledge::{BuiltinKnowledgeSource, Specialty};
/// use clinical_cascade::llm::{ApiGateway, LogTelemetry};
/// use clinical_cascade::pipeline::{CascadeOrchestrator, CascadeRequest};
///
/// # async fn example() {
/// let config = AppConfig::default();
/// let orchestrator = CascadeOrchestrator::new(
///     Arc::new(ApiGateway::from_config(&config.inference)),
///     &config,
///     &BuiltinKnowledgeSource,
///     Arc::new(LogTelemetry),
/// );
/// let request = CascadeRequest::new("Dolor lumbar con dolor nocturno.", Specialty::Physiotherapy, 10).unwrap();
/// let result = orchestrator.run(&request).await;
/// # }
/// ```
pub struct CascadeOrchestrator {
    triage: TriageStage,
    extraction: ExtractionStage,
    selector: ModelSelector,
    analysis: FinalAnalysisStage,
    catalogs: HashMap<Specialty, RedFlagCatalog>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl CascadeOrchestrator {
    /// Build an orchestrator.
    ///
    /// # Arguments
    ///
    /// * `gateway`  : model backend; wrapped in a [`MeteredGateway`] here.
    /// * `config`   : budgets, timeouts, model profiles, thresholds.
    /// * `knowledge`: red-flag store; every specialty is loaded up front.
    /// * `telemetry`: receives per-call and per-stage records.
    pub fn new(
        gateway: Arc<dyn InferenceGateway>,
        config: &AppConfig,
        knowledge: &dyn KnowledgeSource,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        let metered: Arc<dyn InferenceGateway> = Arc::new(MeteredGateway::new(
            gateway,
            config.inference.clone(),
            Arc::clone(&telemetry),
        ));
        let economy_model = config.inference.economy.id.clone();
        let timeouts = &config.inference.timeouts;

        let catalogs = Specialty::ALL
            .iter()
            .map(|&s| (s, RedFlagCatalog::load(knowledge, s)))
            .collect();

        Self {
            triage: TriageStage::new(
                Arc::clone(&metered),
                economy_model.clone(),
                config.triage.clone(),
                timeouts.triage(),
            ),
            extraction: ExtractionStage::new(
                Arc::clone(&metered),
                economy_model,
                config.extraction.clone(),
                timeouts.extraction(),
            ),
            selector: ModelSelector::new(&config.inference, &config.selection),
            analysis: FinalAnalysisStage::new(
                metered,
                config.inference.clone(),
                config.analysis.clone(),
            ),
            catalogs,
            telemetry,
        }
    }

    /// The catalog used for `specialty`.
    pub fn catalog(&self, specialty: Specialty) -> Cow<'_, RedFlagCatalog> {
        match self.catalogs.get(&specialty) {
            Some(catalog) => Cow::Borrowed(catalog),
            None => Cow::Owned(RedFlagCatalog::builtin(specialty)),
        }
    }

    // -----------------------------------------------------------------------
    // Runs
    // -----------------------------------------------------------------------

    /// Run the full cascade for one request.
    pub async fn run(&self, request: &CascadeRequest) -> Result<CascadeResult, CascadeError> {
        let run_started = Instant::now();
        let transcript = request.transcript();
        let specialty = request.specialty();
        let prompts = PromptBuilder::new(specialty);
        let catalog = self.catalog(specialty);

        log::info!(
            "pipeline: run started specialty={specialty} transcript_chars={} catalog_phrases={}",
            transcript.chars().count(),
            catalog.len()
        );

        // ── 1. Triage ∥ extraction ───────────────────────────────────────
        let (triage_outcome, extraction_outcome) = tokio::join!(
            self.timed(
                CascadeStage::Triage,
                self.triage.run(transcript, &prompts, &catalog)
            ),
            self.timed(
                CascadeStage::Extraction,
                self.extraction.run(transcript, &prompts)
            ),
        );

        let mut notes = Vec::new();
        let triage_degraded = !triage_outcome.is_ok();
        let verdict = take(CascadeStage::Triage, triage_outcome, &mut notes, || {
            TriageVerdict::unavailable("Cribado no disponible.")
        });
        let facts = take(
            CascadeStage::Extraction,
            extraction_outcome,
            &mut notes,
            Default::default,
        );

        // ── 2. Model selection ───────────────────────────────────────────
        let started = Instant::now();
        let decision = if triage_degraded {
            log::warn!("pipeline: triage unavailable, using safe fallback selection");
            self.selector.safe_fallback()
        } else {
            self.selector.decide(&verdict)
        };
        self.record(CascadeStage::Selection, started, None);

        // ── 3. Final analysis ────────────────────────────────────────────
        let started = Instant::now();
        let outcome = match self
            .analysis
            .run(transcript, &prompts, &verdict, &facts, &decision)
            .await
        {
            Ok(outcome) => outcome,
            Err(source) => {
                let reason = source.to_string();
                self.record(CascadeStage::FinalAnalysis, started, Some(&reason));
                log::error!(
                    "pipeline: final analysis failed after {}ms ({} red flag(s) carried): {reason}",
                    run_started.elapsed().as_millis(),
                    verdict.red_flags.len()
                );
                return Err(CascadeError::FinalAnalysisFailed {
                    source,
                    triage: verdict,
                    model_decision: decision,
                    stage_notes: notes,
                });
            }
        };
        self.record(CascadeStage::FinalAnalysis, started, outcome.reason());
        let analysis = take(
            CascadeStage::FinalAnalysis,
            outcome,
            &mut notes,
            manual_review_payload,
        );

        // ── 4. Assembly ──────────────────────────────────────────────────
        let started = Instant::now();
        let result = ResultAssembler::assemble(StageOutputs {
            triage: verdict,
            facts,
            decision,
            analysis,
            notes,
        });
        self.record(CascadeStage::Assembly, started, None);

        log::info!(
            "pipeline: run finished in {}ms model={} warnings={} quality={} degraded_stages={}",
            run_started.elapsed().as_millis(),
            result.model_decision.selected_model,
            result.warnings.len(),
            result.quality_score,
            result.stage_notes.len()
        );
        Ok(result)
    }

    /// Like [`run`](Self::run), but gives up as soon as `cancel` completes.
    ///
    /// In-flight model calls are dropped, not awaited.
    pub async fn run_until_cancelled(
        &self,
        request: &CascadeRequest,
        cancel: impl Future<Output = ()>,
    ) -> Result<CascadeResult, CascadeError> {
        tokio::select! {
            result = self.run(request) => result,
            _ = cancel => {
                log::warn!("pipeline: run cancelled, abandoning in-flight calls");
                Err(CascadeError::Cancelled)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn timed<T>(
        &self,
        stage: CascadeStage,
        stage_run: impl Future<Output = StageOutcome<T>>,
    ) -> StageOutcome<T> {
        let started = Instant::now();
        let outcome = stage_run.await;
        self.record(stage, started, outcome.reason());
        outcome
    }

    fn record(&self, stage: CascadeStage, started: Instant, degraded: Option<&str>) {
        self.telemetry.record_stage(&StageRecord {
            stage,
            elapsed: started.elapsed(),
            degraded: degraded.map(str::to_string),
        });
    }
}

/// Unwrap a stage outcome, leaving a note when it degraded.
fn take<T>(
    stage: CascadeStage,
    outcome: StageOutcome<T>,
    notes: &mut Vec<StageNote>,
    fallback: impl FnOnce() -> T,
) -> T {
    let (value, reason) = outcome.into_parts_or(fallback);
    if let Some(reason) = reason {
        notes.push(StageNote {
            stage: stage.label().to_string(),
            reason,
        });
    }
    value
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
