//! Configuration module.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each cascade
//! stage, `AppPaths` for cross-platform locations, and TOML persistence via
//! `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AnalysisConfig, AppConfig, ExtractionConfig, InferenceConfig, KnowledgeConfig, ModelProfile,
    RequestConfig, SelectionConfig, StageTimeouts, TriageConfig,
};
