//! Cost-aware model selection.
//!
//! [`ModelSelector::decide`] is a pure function of the triage verdict:
//!
//! 1. any red flag, or risk HIGH          → PREMIUM
//! 2. risk MEDIUM below the threshold     → PREMIUM
//! 3. anything else                       → ECONOMY
//!
//! Rule 1 is checked first and nothing downstream can weaken it.

use crate::cascade::types::{CostEstimate, ModelDecision, ModelTier, RiskLevel, TriageVerdict};
use crate::config::{InferenceConfig, ModelProfile, SelectionConfig};

#[derive(Debug, Clone)]
pub struct ModelSelector {
    economy: ModelProfile,
    premium: ModelProfile,
    medium_confidence_threshold: f32,
}

impl ModelSelector {
    pub fn new(inference: &InferenceConfig, selection: &SelectionConfig) -> Self {
        Self {
            economy: inference.economy.clone(),
            premium: inference.premium.clone(),
            medium_confidence_threshold: selection.medium_confidence_threshold,
        }
    }

    pub fn decide(&self, verdict: &TriageVerdict) -> ModelDecision {
        if verdict.has_red_flags() {
            return self.decision(
                ModelTier::Premium,
                format!(
                    "Banderas rojas detectadas ({}): {}. Se escala al modelo premium.",
                    verdict.red_flags.len(),
                    verdict.red_flags.join(", ")
                ),
            );
        }

        if verdict.risk_level == RiskLevel::High {
            return self.decision(
                ModelTier::Premium,
                "Riesgo HIGH en el cribado sin banderas rojas concretas. Se escala al modelo premium."
                    .into(),
            );
        }

        if verdict.risk_level == RiskLevel::Medium
            && verdict.confidence < self.medium_confidence_threshold
        {
            return self.decision(
                ModelTier::Premium,
                format!(
                    "Riesgo MEDIUM con confianza {:.2} < {:.2}. Se escala al modelo premium.",
                    verdict.confidence, self.medium_confidence_threshold
                ),
            );
        }

        self.decision(
            ModelTier::Economy,
            format!(
                "Riesgo {} sin banderas rojas (confianza {:.2}). Modelo económico suficiente.",
                verdict.risk_level, verdict.confidence
            ),
        )
    }

    /// Decision used only when the triage call itself failed.
    pub fn safe_fallback(&self) -> ModelDecision {
        self.decision(
            ModelTier::Economy,
            "Selección de respaldo (fallback): el cribado no estuvo disponible. \
             Tratar el resultado con precaución."
                .into(),
        )
    }

    fn profile(&self, tier: ModelTier) -> &ModelProfile {
        match tier {
            ModelTier::Economy => &self.economy,
            ModelTier::Premium => &self.premium,
        }
    }

    fn decision(&self, tier: ModelTier, reasoning: String) -> ModelDecision {
        log::info!("selector: {tier}");
        ModelDecision {
            selected_model: tier,
            reasoning,
            cost_estimate: self.cost_estimate(tier),
        }
    }

    fn cost_estimate(&self, tier: ModelTier) -> CostEstimate {
        let profile = self.profile(tier);
        let relative_cost = if self.premium.output_usd_per_1k > 0.0 {
            profile.output_usd_per_1k / self.premium.output_usd_per_1k
        } else {
            1.0
        };
        CostEstimate {
            model_id: profile.id.clone(),
            input_usd_per_1k: profile.input_usd_per_1k,
            output_usd_per_1k: profile.output_usd_per_1k,
            relative_cost,
        }
    }
}

impl Default for ModelSelector {
    fn default() -> Self {
        Self::new(&InferenceConfig::default(), &SelectionConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
