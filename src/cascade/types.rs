//! Data model shared by the cascade stages.
//!
//! Every value here is created during one pipeline run and never mutated
//! after it has been handed to the next stage.  External JSON uses
//! camelCase keys; enums serialise as upper-case tokens (`"HIGH"`,
//! `"PREMIUM"`).

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// RiskLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Parse an English or Spanish risk token (`"HIGH"`, `"alto"`, …).
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_lowercase().as_str() {
            "low" | "bajo" | "baja" => Some(RiskLevel::Low),
            "medium" | "moderate" | "medio" | "media" | "moderado" => Some(RiskLevel::Medium),
            "high" | "alto" | "alta" => Some(RiskLevel::High),
            _ => None,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        })
    }
}

// ---------------------------------------------------------------------------
// TriageVerdict
// ---------------------------------------------------------------------------

/// Result of the fast red-flag screen.
///
/// `red_flags` and `risk_level` come from an unreliable upstream and may
/// contradict each other; consumers check both independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriageVerdict {
    /// Detected phrases in detection order.
    pub red_flags: Vec<String>,
    pub risk_level: RiskLevel,
    /// In `[0, 1]`.
    pub confidence: f32,
    pub reasoning: String,
}

impl TriageVerdict {
    /// The verdict used when triage could not run: no flags, LOW, zero
    /// confidence.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            red_flags: Vec::new(),
            risk_level: RiskLevel::Low,
            confidence: 0.0,
            reasoning: reason.into(),
        }
    }

    pub fn has_red_flags(&self) -> bool {
        !self.red_flags.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ClinicalFacts
// ---------------------------------------------------------------------------

/// Best-effort facts pulled from the transcript.
///
/// Deliberately schemaless: the upstream shape is not guaranteed, so the
/// document is kept as a JSON object and only the categories a stage reads
/// are inspected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClinicalFacts(Map<String, Value>);

impl ClinicalFacts {
    pub const SYMPTOMS: &'static str = "symptoms";
    pub const HISTORY: &'static str = "history";
    pub const MEDICATIONS: &'static str = "medications";
    pub const FUNCTIONAL_STATUS: &'static str = "functional_status";
    pub const DEMOGRAPHICS: &'static str = "demographics";

    /// The named categories the extraction prompt asks for.
    pub const CATEGORIES: [&'static str; 5] = [
        Self::SYMPTOMS,
        Self::HISTORY,
        Self::MEDICATIONS,
        Self::FUNCTIONAL_STATUS,
        Self::DEMOGRAPHICS,
    ];

    pub fn empty() -> Self {
        Self::default()
    }

    /// Wrap a parsed document; anything but an object is rejected.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn category(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|v| !v.is_null())
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(Value::is_null)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Pretty JSON block for embedding in a prompt.
    pub fn to_prompt_block(&self) -> String {
        serde_json::to_string_pretty(&self.0).unwrap_or_else(|_| "{}".to_string())
    }
}

// ---------------------------------------------------------------------------
// ModelTier / CostEstimate / ModelDecision
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ModelTier {
    Economy,
    Premium,
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ModelTier::Economy => "ECONOMY",
            ModelTier::Premium => "PREMIUM",
        })
    }
}

/// List price of the selected tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    pub model_id: String,
    pub input_usd_per_1k: f64,
    pub output_usd_per_1k: f64,
    /// Output price relative to the premium tier (premium = 1.0).
    pub relative_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDecision {
    pub selected_model: ModelTier,
    pub reasoning: String,
    pub cost_estimate: CostEstimate,
}

// ---------------------------------------------------------------------------
// Warning / Suggestion / SoapNote
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Lenient parse of model-provided severities.  Unknown tokens map to
    /// `Medium`.
    pub fn parse_lenient(token: &str) -> Self {
        match token.trim().to_lowercase().as_str() {
            "critical" | "crítica" | "critica" | "crítico" | "critico" | "urgent" | "urgente" => {
                Severity::Critical
            }
            "high" | "alta" | "alto" => Severity::High,
            "low" | "baja" | "bajo" => Severity::Low,
            _ => Severity::Medium,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub severity: Severity,
    pub category: String,
    pub title: String,
    pub description: String,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub description: String,
    pub priority: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SoapNote {
    pub subjective: String,
    pub objective: String,
    pub assessment: String,
    pub plan: String,
}

impl SoapNote {
    pub fn sections(&self) -> [&str; 4] {
        [
            self.subjective.as_str(),
            self.objective.as_str(),
            self.assessment.as_str(),
            self.plan.as_str(),
        ]
    }

    /// Number of sections with non-blank text.
    pub fn populated_sections(&self) -> usize {
        self.sections()
            .iter()
            .filter(|s| !s.trim().is_empty())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.populated_sections() == 0
    }
}

// ---------------------------------------------------------------------------
// FinalAnalysis
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalAnalysis {
    pub warnings: Vec<Warning>,
    pub suggestions: Vec<Suggestion>,
    pub soap_note: SoapNote,
    pub functional_goals: Vec<String>,
    pub treatment_techniques: Vec<String>,
    /// `None` when the model did not score the note itself.
    pub quality_score: Option<u8>,
}

impl FinalAnalysis {
    /// `true` when nothing a clinician could read was recovered.
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
            && self.suggestions.is_empty()
            && self.soap_note.is_empty()
            && self.functional_goals.is_empty()
            && self.treatment_techniques.is_empty()
    }
}

// ---------------------------------------------------------------------------
// StageNote / CascadeResult
// ---------------------------------------------------------------------------

/// Records that a stage ran in a degraded mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageNote {
    pub stage: String,
    pub reason: String,
}

/// The assembled, externally visible output of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeResult {
    pub warnings: Vec<Warning>,
    pub suggestions: Vec<Suggestion>,
    pub soap_note: SoapNote,
    pub functional_goals: Vec<String>,
    pub treatment_techniques: Vec<String>,
    pub quality_score: u8,
    pub triage: TriageVerdict,
    pub clinical_facts: ClinicalFacts,
    pub model_decision: ModelDecision,
    pub stage_notes: Vec<StageNote>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
