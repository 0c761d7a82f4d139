//! Cascade stage identifiers.
//!
//! [`CascadeStage`] names each step of a cascade run.  It tags gateway calls
//! and stage records in telemetry and labels degradation notes on the result.

use std::fmt;

use serde::Serialize;

// ---------------------------------------------------------------------------
// CascadeStage
// ---------------------------------------------------------------------------

/// Steps of one cascade run.
///
/// ```text
/// request ──▶ Triage ─────┐
///        └──▶ Extraction ─┴──▶ Selection ──▶ FinalAnalysis ──▶ Assembly ──▶ result
/// ```
///
/// Triage and extraction run concurrently; everything after is sequential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeStage {
    /// Red-flag screen on the economy model.
    Triage,

    /// Fact extraction on the economy model.
    Extraction,

    /// Model choice for the final stage.  No model call.
    Selection,

    /// Full analysis on the selected model.
    FinalAnalysis,

    /// Merge into the final result.  No model call.
    Assembly,
}

impl CascadeStage {
    /// Every stage in execution order.
    pub const ALL: [CascadeStage; 5] = [
        CascadeStage::Triage,
        CascadeStage::Extraction,
        CascadeStage::Selection,
        CascadeStage::FinalAnalysis,
        CascadeStage::Assembly,
    ];

    /// Short label used in logs, telemetry and stage notes.
    pub fn label(&self) -> &'static str {
        match self {
            CascadeStage::Triage => "triage",
            CascadeStage::Extraction => "extraction",
            CascadeStage::Selection => "selection",
            CascadeStage::FinalAnalysis => "final_analysis",
            CascadeStage::Assembly => "assembly",
        }
    }
}

impl fmt::Display for CascadeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_match_serde_names() {
        for stage in CascadeStage::ALL {
            let json = serde_json::to_value(stage).unwrap();
            assert_eq!(json, serde_json::json!(stage.label()));
        }
    }

    #[test]
    fn display_uses_label() {
        assert_eq!(CascadeStage::FinalAnalysis.to_string(), "final_analysis");
    }
}
