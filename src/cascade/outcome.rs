//! Explicit stage results.
//!
//! Stages never use errors to signal "fall back to the default": an expected
//! degraded path is a [`StageOutcome::Degraded`] carrying the usable value
//! and the reason.  `Failed` means the stage produced no value at all; the
//! orchestrator supplies the stage's default and keeps the reason.

/// Outcome of one cascade stage.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    /// The stage produced its value normally.
    Ok(T),
    /// The stage hit a recoverable problem and substituted a safe value.
    Degraded(T, String),
    /// The stage produced nothing usable.
    Failed(String),
}

impl<T> StageOutcome<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, StageOutcome::Ok(_))
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, StageOutcome::Degraded(..))
    }

    /// The value, if any, regardless of degradation.
    pub fn value(&self) -> Option<&T> {
        match self {
            StageOutcome::Ok(v) | StageOutcome::Degraded(v, _) => Some(v),
            StageOutcome::Failed(_) => None,
        }
    }

    /// Why the stage did not succeed normally.
    pub fn reason(&self) -> Option<&str> {
        match self {
            StageOutcome::Ok(_) => None,
            StageOutcome::Degraded(_, reason) | StageOutcome::Failed(reason) => Some(reason),
        }
    }

    /// Split into the value and the degradation reason.  `Failed` yields
    /// `fallback()` together with its reason.
    pub fn into_parts_or(self, fallback: impl FnOnce() -> T) -> (T, Option<String>) {
        match self {
            StageOutcome::Ok(v) => (v, None),
            StageOutcome::Degraded(v, reason) => (v, Some(reason)),
            StageOutcome::Failed(reason) => (fallback(), Some(reason)),
        }
    }
}
