//! Validated cascade input.

use thiserror::Error;

use crate::config::RequestConfig;
use crate::knowledge::Specialty;

/// Why a transcript was rejected before any model call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("transcript is empty")]
    EmptyTranscript,

    #[error("transcript too short: {chars} characters, at least {min} required")]
    TooShort { chars: usize, min: usize },
}

/// A transcript that passed validation, plus its specialty.
///
/// The transcript is stored trimmed and never changes afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeRequest {
    transcript: String,
    specialty: Specialty,
}

impl CascadeRequest {
    /// ```
    /// use clinical_cascade::knowledge::Specialty;
    /// use clinical_cascade::pipeline::{CascadeRequest, RequestError};
    ///
    /// assert!(CascadeRequest::new("Dolor lumbar desde hace 3 semanas.", Specialty::Physiotherapy, 10).is_ok());
    /// assert_eq!(
    ///     CascadeRequest::new("   ", Specialty::Physiotherapy, 10),
    ///     Err(RequestError::EmptyTranscript)
    /// );
    /// ```
    pub fn new(
        transcript: impl AsRef<str>,
        specialty: Specialty,
        min_chars: usize,
    ) -> Result<Self, RequestError> {
        let trimmed = transcript.as_ref().trim();
        if trimmed.is_empty() {
            return Err(RequestError::EmptyTranscript);
        }
        let chars = trimmed.chars().count();
        if chars < min_chars {
            return Err(RequestError::TooShort {
                chars,
                min: min_chars,
            });
        }
        Ok(Self {
            transcript: trimmed.to_string(),
            specialty,
        })
    }

    /// Validate with the configured minimum; `specialty` falls back to the
    /// configured default.
    pub fn from_config(
        transcript: impl AsRef<str>,
        specialty: Option<Specialty>,
        config: &RequestConfig,
    ) -> Result<Self, RequestError> {
        Self::new(
            transcript,
            specialty.unwrap_or(config.default_specialty),
            config.min_transcript_chars,
        )
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn specialty(&self) -> Specialty {
        self.specialty
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
