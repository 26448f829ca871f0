//! Reconciles the plant a user says they photographed with the label the
//! disease model produced, and picks the advice to show.

use crate::catalog::{Catalog, FALLBACK_ADVICE, LABEL_SEPARATOR};

#[derive(Debug, Clone, PartialEq)]
pub enum ReconciliationOutcome {
    /// The user's plant is not in the synonym table.
    UnrecognizedPlant {
        user_plant: String,
        supported: Vec<String>,
    },
    /// The label does not start with a known plant followed by `___`.
    UnparsableLabel { label: String, confidence: f32 },
    PlantMismatch {
        declared: String,
        detected: String,
        condition: String,
        confidence: f32,
    },
    Match {
        declared: String,
        detected: String,
        confidence: f32,
        diagnosis: Diagnosis,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Diagnosis {
    Healthy,
    Diseased { disease: String, advice: String },
}

/// Matches `label` against `user_plant` using the tables in `catalog`.
///
/// Never fails: every unexpected input is reported as an outcome variant.
pub fn reconcile(
    catalog: &Catalog,
    user_plant: &str,
    label: &str,
    confidence: f32,
) -> ReconciliationOutcome {
    let user_plant = user_plant.trim();

    let Some(expected) = catalog.canonical_plant(user_plant) else {
        return ReconciliationOutcome::UnrecognizedPlant {
            user_plant: user_plant.to_string(),
            supported: catalog.supported_plants(),
        };
    };

    let Some((detected, condition)) = split_label(catalog, label) else {
        return ReconciliationOutcome::UnparsableLabel {
            label: label.to_string(),
            confidence,
        };
    };

    let declared = title_case(user_plant);

    if expected != detected {
        return ReconciliationOutcome::PlantMismatch {
            declared,
            detected: display_name(detected),
            condition: display_name(condition),
            confidence,
        };
    }

    let diagnosis = if condition.eq_ignore_ascii_case("healthy") {
        Diagnosis::Healthy
    } else {
        Diagnosis::Diseased {
            disease: display_name(condition),
            advice: catalog
                .advice_for(label)
                .unwrap_or(FALLBACK_ADVICE)
                .to_string(),
        }
    };

    ReconciliationOutcome::Match {
        declared,
        detected: display_name(detected),
        confidence,
        diagnosis,
    }
}

/// Splits `label` into a known canonical plant and a non-empty condition.
fn split_label<'a>(catalog: &'a Catalog, label: &'a str) -> Option<(&'a str, &'a str)> {
    // Longest first, so "Corn" never shadows a longer name such as "Corn_Sweet".
    let (plant, rest) = catalog.prefixes().iter().find_map(|prefix| {
        label
            .strip_prefix(prefix.as_str())
            .and_then(|rest| rest.strip_prefix(LABEL_SEPARATOR))
            .map(|rest| (prefix.as_str(), rest))
    })?;

    let condition = rest.trim();
    (!condition.is_empty()).then_some((plant, condition))
}

fn display_name(part: &str) -> String {
    part.replace('_', " ")
}

/// Upper-cases the first letter of every alphabetic run, lower-cases the rest.
fn title_case(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_word = false;
    for c in raw.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_cases_words() {
        assert_eq!(title_case("maize"), "Maize");
        assert_eq!(title_case("sWEET corn"), "Sweet Corn");
        assert_eq!(title_case("corn-2x"), "Corn-2X");
    }

    #[test]
    fn split_requires_separator_and_condition() {
        let catalog = Catalog::builtin();
        assert_eq!(
            split_label(&catalog, "Rice___Leaf_Blast"),
            Some(("Rice", "Leaf_Blast"))
        );
        assert_eq!(split_label(&catalog, "Rice___"), None);
        assert_eq!(split_label(&catalog, "Rice__Leaf_Blast"), None);
        assert_eq!(split_label(&catalog, "Ricefield___Blast"), None);
        assert_eq!(split_label(&catalog, "rice___Leaf_Blast"), None);
    }

    #[test]
    fn mismatch_uses_display_names() {
        let catalog = Catalog::builtin();
        let outcome = reconcile(&catalog, "maize", "Wheat___Yellow_Rust", 0.8);
        assert_eq!(
            outcome,
            ReconciliationOutcome::PlantMismatch {
                declared: "Maize".into(),
                detected: "Wheat".into(),
                condition: "Yellow Rust".into(),
                confidence: 0.8,
            }
        );
    }

    #[test]
    fn healthy_is_case_insensitive() {
        let catalog = Catalog::builtin();
        let outcome = reconcile(&catalog, "Rice", "Rice___HEALTHY", 0.5);
        assert!(matches!(
            outcome,
            ReconciliationOutcome::Match {
                diagnosis: Diagnosis::Healthy,
                ..
            }
        ));
    }
}
