//! Hard-coded minimal red-flag lists, used when the catalog store is
//! unavailable.
//!
//! Lists are short and high-precision: triage trades recall for speed, so
//! every phrase here must justify an escalation on its own.

use super::Specialty;

static PHYSIOTHERAPY: &[&str] = &[
    "dolor nocturno",
    "pérdida de peso inexplicada",
    "fiebre",
    "pérdida de control de esfínteres",
    "anestesia en silla de montar",
    "déficit neurológico progresivo",
    "traumatismo grave reciente",
    "antecedentes de cáncer",
];

static PSYCHOLOGY: &[&str] = &[
    "ideación suicida",
    "plan suicida",
    "autolesiones",
    "síntomas psicóticos",
    "riesgo de violencia",
    "abuso de sustancias grave",
];

static GENERAL_MEDICINE: &[&str] = &[
    "dolor torácico",
    "disnea súbita",
    "pérdida de conciencia",
    "déficit neurológico agudo",
    "sangrado abundante",
    "fiebre alta persistente",
];

/// The built-in red-flag phrases for `specialty`, in priority order.
pub fn builtin_red_flags(specialty: Specialty) -> &'static [&'static str] {
    match specialty {
        Specialty::Physiotherapy => PHYSIOTHERAPY,
        Specialty::Psychology => PSYCHOLOGY,
        Specialty::GeneralMedicine => GENERAL_MEDICINE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_specialty_has_a_fallback_list() {
        for specialty in Specialty::ALL {
            assert!(!builtin_red_flags(specialty).is_empty(), "{specialty}");
        }
    }

    #[test]
    fn physiotherapy_covers_night_pain() {
        assert!(builtin_red_flags(Specialty::Physiotherapy).contains(&"dolor nocturno"));
    }
}
