//! Clinical specialties the cascade knows red flags for.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Clinical specialty of a consultation.
///
/// Accepts English and Spanish identifiers:
///
/// ```
/// use clinical_cascade::knowledge::Specialty;
///
/// assert_eq!("fisioterapia".parse::<Specialty>().unwrap(), Specialty::Physiotherapy);
/// assert_eq!("general_medicine".parse::<Specialty>().unwrap(), Specialty::GeneralMedicine);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Specialty {
    Physiotherapy,
    Psychology,
    GeneralMedicine,
}

impl Specialty {
    pub const ALL: [Specialty; 3] = [
        Specialty::Physiotherapy,
        Specialty::Psychology,
        Specialty::GeneralMedicine,
    ];

    /// Canonical key, also used in the catalog JSON file.
    pub fn key(&self) -> &'static str {
        match self {
            Specialty::Physiotherapy => "physiotherapy",
            Specialty::Psychology => "psychology",
            Specialty::GeneralMedicine => "general_medicine",
        }
    }

    /// Spanish label embedded in prompts.
    pub fn label_es(&self) -> &'static str {
        match self {
            Specialty::Physiotherapy => "fisioterapia",
            Specialty::Psychology => "psicología",
            Specialty::GeneralMedicine => "medicina general",
        }
    }
}

impl Default for Specialty {
    fn default() -> Self {
        Self::Physiotherapy
    }
}

impl fmt::Display for Specialty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown specialty: {0:?}")]
pub struct UnknownSpecialty(pub String);

impl FromStr for Specialty {
    type Err = UnknownSpecialty;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "physiotherapy" | "physio" | "fisioterapia" | "fisio" => Ok(Specialty::Physiotherapy),
            "psychology" | "psicologia" | "psicología" => Ok(Specialty::Psychology),
            "general_medicine" | "general" | "medicina_general" | "medicina" => {
                Ok(Specialty::GeneralMedicine)
            }
            _ => Err(UnknownSpecialty(s.to_string())),
        }
    }
}
