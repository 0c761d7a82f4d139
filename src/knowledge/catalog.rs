//! Red-flag catalog and the knowledge collaborator that supplies it.
//!
//! [`FileKnowledgeSource`] reads a JSON map of specialty key → phrase list
//! from the platform config directory:
//!
//! | Platform | Path |
//! |----------|------|
//! | Windows  | `%APPDATA%\clinical-cascade\red-flags.json` |
//! | macOS    | `~/Library/Application Support/clinical-cascade/red-flags.json` |
//! | Linux    | `~/.config/clinical-cascade/red-flags.json` |
//!
//! ```json
//! { "physiotherapy": ["dolor nocturno", "fiebre"], "psychology": ["ideación suicida"] }
//! ```
//!
//! [`RedFlagCatalog::load`] never fails: when the source errors or has
//! nothing for the specialty it falls back to [`builtin_red_flags`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use super::builtin::builtin_red_flags;
use super::Specialty;

// ---------------------------------------------------------------------------
// KnowledgeError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("catalog store unavailable: {0}")]
    Unavailable(String),

    #[error("catalog file is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// KnowledgeSource trait
// ---------------------------------------------------------------------------

/// External collaborator that knows which phrases are critical red flags.
pub trait KnowledgeSource: Send + Sync {
    fn critical_red_flags(&self, specialty: Specialty) -> Result<Vec<String>, KnowledgeError>;
}

// ---------------------------------------------------------------------------
// FileKnowledgeSource
// ---------------------------------------------------------------------------

/// Reads the catalog JSON on every lookup; the file is small and the
/// catalog is loaded once per process by the CLI.
pub struct FileKnowledgeSource {
    path: PathBuf,
}

impl FileKnowledgeSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KnowledgeSource for FileKnowledgeSource {
    fn critical_red_flags(&self, specialty: Specialty) -> Result<Vec<String>, KnowledgeError> {
        if !self.path.exists() {
            return Err(KnowledgeError::Unavailable(format!(
                "{} does not exist",
                self.path.display()
            )));
        }
        let data = std::fs::read_to_string(&self.path)?;
        let mut catalog: HashMap<String, Vec<String>> = serde_json::from_str(&data)?;
        Ok(catalog.remove(specialty.key()).unwrap_or_default())
    }
}

/// Source that only serves the built-in lists.
pub struct BuiltinKnowledgeSource;

impl KnowledgeSource for BuiltinKnowledgeSource {
    fn critical_red_flags(&self, specialty: Specialty) -> Result<Vec<String>, KnowledgeError> {
        Ok(builtin_red_flags(specialty)
            .iter()
            .map(|s| s.to_string())
            .collect())
    }
}

// ---------------------------------------------------------------------------
// RedFlagCatalog
// ---------------------------------------------------------------------------

/// Ordered, de-duplicated critical phrases for one specialty.
///
/// Read-only once built; shared by reference across concurrent runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RedFlagCatalog {
    specialty: Specialty,
    phrases: Vec<String>,
    from_fallback: bool,
}

impl RedFlagCatalog {
    /// Build a catalog from explicit phrases.  Blank entries and repeats
    /// (case-insensitive) are dropped, first occurrence wins.
    pub fn new(specialty: Specialty, phrases: impl IntoIterator<Item = String>) -> Self {
        let mut seen = Vec::<String>::new();
        let mut kept = Vec::new();
        for phrase in phrases {
            let trimmed = phrase.trim();
            if trimmed.is_empty() {
                continue;
            }
            let key = trimmed.to_lowercase();
            if seen.contains(&key) {
                continue;
            }
            seen.push(key);
            kept.push(trimmed.to_string());
        }
        Self {
            specialty,
            phrases: kept,
            from_fallback: false,
        }
    }

    /// The built-in minimal catalog.
    pub fn builtin(specialty: Specialty) -> Self {
        let mut catalog = Self::new(
            specialty,
            builtin_red_flags(specialty).iter().map(|s| s.to_string()),
        );
        catalog.from_fallback = true;
        catalog
    }

    /// Ask `source` for the specialty's red flags, falling back to the
    /// built-in list on error or when the source has none.
    pub fn load(source: &dyn KnowledgeSource, specialty: Specialty) -> Self {
        match source.critical_red_flags(specialty) {
            Ok(phrases) => {
                let catalog = Self::new(specialty, phrases);
                if catalog.is_empty() {
                    log::warn!("knowledge: no red flags stored for {specialty}; using built-in list");
                    Self::builtin(specialty)
                } else {
                    log::debug!(
                        "knowledge: loaded {} red flags for {specialty}",
                        catalog.len()
                    );
                    catalog
                }
            }
            Err(e) => {
                log::warn!("knowledge: catalog store failed ({e}); using built-in list for {specialty}");
                Self::builtin(specialty)
            }
        }
    }

    pub fn specialty(&self) -> Specialty {
        self.specialty
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    /// `true` when the phrases came from the hard-coded fallback list.
    pub fn is_fallback(&self) -> bool {
        self.from_fallback
    }

    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
