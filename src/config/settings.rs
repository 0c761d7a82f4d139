//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.
//! Every section uses `#[serde(default)]` so a partial `settings.toml` only
//! needs to name the values it overrides.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::cascade::types::ModelTier;
use crate::knowledge::Specialty;

// ---------------------------------------------------------------------------
// ModelProfile
// ---------------------------------------------------------------------------

/// One inference model: its identifier, generation defaults and list price.
///
/// Prices are in USD per 1 000 tokens and only feed cost telemetry and the
/// selector's [`CostEstimate`](crate::cascade::types::CostEstimate); they
/// never change routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelProfile {
    /// Model identifier sent to the API (e.g. `"claude-3-haiku"`).
    pub id: String,
    /// Output token budget used when a call does not specify one.
    pub default_max_tokens: u32,
    /// Sampling temperature used when a call does not specify one.
    pub default_temperature: f32,
    /// USD per 1 000 prompt tokens.
    pub input_usd_per_1k: f64,
    /// USD per 1 000 completion tokens.
    pub output_usd_per_1k: f64,
}

impl ModelProfile {
    /// Cheap/fast defaults.
    pub fn economy() -> Self {
        Self {
            id: "claude-3-haiku".into(),
            default_max_tokens: 1_000,
            default_temperature: 0.3,
            input_usd_per_1k: 0.000_25,
            output_usd_per_1k: 0.001_25,
        }
    }

    /// High-quality defaults.
    pub fn premium() -> Self {
        Self {
            id: "claude-3-5-sonnet".into(),
            default_max_tokens: 4_000,
            default_temperature: 0.1,
            input_usd_per_1k: 0.003,
            output_usd_per_1k: 0.015,
        }
    }

    /// Estimated USD cost of a call with the given token counts.
    pub fn estimate_cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        (input_tokens as f64 / 1_000.0) * self.input_usd_per_1k
            + (output_tokens as f64 / 1_000.0) * self.output_usd_per_1k
    }
}

impl Default for ModelProfile {
    fn default() -> Self {
        Self::economy()
    }
}

// ---------------------------------------------------------------------------
// StageTimeouts
// ---------------------------------------------------------------------------

/// Per-call time budgets.  Timeouts are per call, never per pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageTimeouts {
    pub triage_secs: u64,
    pub extraction_secs: u64,
    pub analysis_secs: u64,
}

impl StageTimeouts {
    pub fn triage(&self) -> Duration {
        Duration::from_secs(self.triage_secs)
    }

    pub fn extraction(&self) -> Duration {
        Duration::from_secs(self.extraction_secs)
    }

    pub fn analysis(&self) -> Duration {
        Duration::from_secs(self.analysis_secs)
    }
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            triage_secs: 5,
            extraction_secs: 15,
            analysis_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// InferenceConfig
// ---------------------------------------------------------------------------

/// Connection settings for the inference backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Base URL of the OpenAI-compatible endpoint.
    ///
    /// - Ollama default: `http://localhost:11434`
    /// - OpenAI: `https://api.openai.com`
    pub base_url: String,
    /// API key. `None` for local providers.
    pub api_key: Option<String>,
    /// Cheap tier used for triage, extraction and low-risk analysis.
    pub economy: ModelProfile,
    /// Expensive tier used only for escalated analysis.
    pub premium: ModelProfile,
    /// Per-stage call budgets.
    pub timeouts: StageTimeouts,
}

impl InferenceConfig {
    /// Profile backing a tier.
    pub fn profile(&self, tier: ModelTier) -> &ModelProfile {
        match tier {
            ModelTier::Economy => &self.economy,
            ModelTier::Premium => &self.premium,
        }
    }

    /// Look up a profile by model identifier.
    pub fn profile_for_model(&self, model: &str) -> Option<&ModelProfile> {
        [&self.economy, &self.premium]
            .into_iter()
            .find(|profile| profile.id == model)
    }

    /// The longest per-stage budget; used as the HTTP client's own ceiling.
    pub fn max_timeout(&self) -> Duration {
        let t = &self.timeouts;
        Duration::from_secs(t.triage_secs.max(t.extraction_secs).max(t.analysis_secs))
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            api_key: None,
            economy: ModelProfile::economy(),
            premium: ModelProfile::premium(),
            timeouts: StageTimeouts::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Stage settings
// ---------------------------------------------------------------------------

/// Red-flag triage call settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    pub max_output_tokens: u32,
    pub temperature: f32,
    /// Upper bound on reported red flags; protects downstream prompts.
    pub max_red_flags: usize,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            max_output_tokens: 100,
            temperature: 0.0,
            max_red_flags: 10,
        }
    }
}

/// Clinical fact extraction call settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_output_tokens: 1_000,
            temperature: 0.1,
        }
    }
}

/// Final analysis call settings, one budget per tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub economy_max_tokens: u32,
    pub economy_temperature: f32,
    pub premium_max_tokens: u32,
    pub premium_temperature: f32,
}

impl AnalysisConfig {
    /// `(max_tokens, temperature)` for a tier.
    pub fn budget(&self, tier: ModelTier) -> (u32, f32) {
        match tier {
            ModelTier::Economy => (self.economy_max_tokens, self.economy_temperature),
            ModelTier::Premium => (self.premium_max_tokens, self.premium_temperature),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            economy_max_tokens: 2_000,
            economy_temperature: 0.3,
            premium_max_tokens: 4_000,
            premium_temperature: 0.1,
        }
    }
}

/// Model selection thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// A MEDIUM verdict below this confidence escalates to premium.
    pub medium_confidence_threshold: f32,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            medium_confidence_threshold: 0.8,
        }
    }
}

/// Where the red-flag catalog is read from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Catalog JSON file.  `None` means the platform default path.
    pub red_flags_file: Option<PathBuf>,
}

impl KnowledgeConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.red_flags_file
            .clone()
            .unwrap_or_else(|| AppPaths::new().red_flags_file)
    }
}

/// Entry-point request validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Minimum trimmed transcript length in characters.
    pub min_transcript_chars: usize,
    /// Specialty used when the caller does not name one.
    pub default_specialty: Specialty,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            min_transcript_chars: 10,
            default_specialty: Specialty::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use clinical_cascade::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// assert_eq!(config.triage.max_red_flags, 10);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub inference: InferenceConfig,
    pub triage: TriageConfig,
    pub extraction: ExtractionConfig,
    pub analysis: AnalysisConfig,
    pub selection: SelectionConfig,
    pub knowledge: KnowledgeConfig,
    pub request: RequestConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(original.inference.base_url, loaded.inference.base_url);
        assert_eq!(original.inference.api_key, loaded.inference.api_key);
        assert_eq!(original.inference.economy, loaded.inference.economy);
        assert_eq!(original.inference.premium, loaded.inference.premium);
        assert_eq!(original.inference.timeouts, loaded.inference.timeouts);
        assert_eq!(original.triage.max_red_flags, loaded.triage.max_red_flags);
        assert_eq!(
            original.selection.medium_confidence_threshold,
            loaded.selection.medium_confidence_threshold
        );
        assert_eq!(
            original.request.default_specialty,
            loaded.request.default_specialty
        );
    }

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        assert_eq!(config.inference.economy.id, "claude-3-haiku");
        assert_eq!(config.request.min_transcript_chars, 10);
    }

    #[test]
    fn default_budgets() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.inference.timeouts.triage(), Duration::from_secs(5));
        assert_eq!(cfg.inference.timeouts.extraction(), Duration::from_secs(15));
        assert_eq!(cfg.inference.timeouts.analysis(), Duration::from_secs(30));
        assert_eq!(cfg.inference.max_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.triage.temperature, 0.0);

        // Premium gets the larger budget and the lower temperature.
        let (eco_tokens, eco_temp) = cfg.analysis.budget(ModelTier::Economy);
        let (pre_tokens, pre_temp) = cfg.analysis.budget(ModelTier::Premium);
        assert!(pre_tokens > eco_tokens);
        assert!(pre_temp < eco_temp);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("partial.toml");
        std::fs::write(
            &path,
            "[inference]\nbase_url = \"https://api.openai.com\"\n\n[inference.premium]\nid = \"gpt-4o\"\n",
        )
        .unwrap();

        let cfg = AppConfig::load_from(&path).expect("load");
        assert_eq!(cfg.inference.base_url, "https://api.openai.com");
        assert_eq!(cfg.inference.premium.id, "gpt-4o");
        assert_eq!(cfg.inference.economy.id, "claude-3-haiku");
        assert_eq!(cfg.inference.timeouts.triage_secs, 5);
    }

    #[test]
    fn profile_lookup_by_model_id() {
        let cfg = InferenceConfig::default();
        assert_eq!(
            cfg.profile_for_model("claude-3-5-sonnet"),
            Some(&cfg.premium)
        );
        assert!(cfg.profile_for_model("unknown").is_none());
        assert_eq!(cfg.profile(ModelTier::Economy).id, "claude-3-haiku");
    }

    #[test]
    fn cost_estimate_scales_with_tokens() {
        let p = ModelProfile::premium();
        let cost = p.estimate_cost(1_000, 1_000);
        assert!((cost - 0.018).abs() < 1e-9);
    }
}
