//! Static lookup tables for the disease model: user plant synonyms and
//! per-label treatment advice.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, ServiceError};

/// Separates the plant and condition parts of a model label.
pub const LABEL_SEPARATOR: &str = "___";

pub const FALLBACK_ADVICE: &str =
    "Specific treatment advice not found. Please consult a local agricultural expert.";

// Plant names the crop_leaf_diseases_vit model card covers.
const PLANT_SYNONYMS: &[(&str, &str)] = &[
    ("corn", "Corn"),
    ("maize", "Corn"),
    ("potato", "Potato"),
    ("rice", "Rice"),
    ("wheat", "Wheat"),
];

const ADVICE: &[(&str, &str)] = &[
    (
        "Corn___Common_Rust",
        "Apply appropriate fungicides. Resistant varieties can help manage Common Rust in Corn.",
    ),
    (
        "Corn___Gray_Leaf_Spot",
        "Use resistant hybrids and consider fungicide application for Gray Leaf Spot in Corn. Crop rotation can also help.",
    ),
    (
        "Corn___Leaf_Blight",
        "Several types of leaf blight affect corn. Fungicides and resistant varieties are key. (Specify if Northern, Southern, etc. if model distinguishes)",
    ),
    (
        "Corn___Healthy",
        "Your corn plants appear healthy. Continue good crop management practices.",
    ),
    (
        "Potato___Early_Blight",
        "Apply fungicides preventatively or at first sign. Rotate crops and remove infected debris for Potato Early Blight.",
    ),
    (
        "Potato___Late_Blight",
        "Late Blight is aggressive. Use resistant varieties, ensure good air circulation, and apply fungicides proactively.",
    ),
    (
        "Potato___Healthy",
        "Your potato plants appear healthy. Monitor for pests and diseases.",
    ),
    (
        "Rice___Brown_Spot",
        "Ensure balanced nutrition, manage water properly. Fungicides can be used for Rice Brown Spot.",
    ),
    (
        "Rice___Leaf_Blast",
        "Use resistant varieties. Water management and fungicide application are important for Rice Leaf Blast.",
    ),
    ("Rice___Healthy", "Your rice plants appear healthy."),
    (
        "Wheat___Brown_Rust",
        "Use resistant varieties. Fungicides can be effective for Wheat Brown Rust (Leaf Rust).",
    ),
    (
        "Wheat___Yellow_Rust",
        "Use resistant varieties. Early fungicide application is crucial for Wheat Yellow Rust (Stripe Rust).",
    ),
    ("Wheat___Healthy", "Your wheat crop appears healthy."),
];

/// On-disk shape of a catalog file.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    plants: BTreeMap<String, String>,
    #[serde(default)]
    advice: HashMap<String, String>,
}

/// Immutable plant/advice tables, built once at startup and shared by
/// reference with every request.
#[derive(Debug, Clone)]
pub struct Catalog {
    plants: BTreeMap<String, String>,
    advice: HashMap<String, String>,
    // Canonical names, longest first.
    prefixes: Vec<String>,
}

impl Catalog {
    pub fn builtin() -> Self {
        Self::from_tables(
            PLANT_SYNONYMS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ADVICE
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(raw)
            .map_err(|e| ServiceError::Config(format!("invalid catalog: {e}")))?;

        for (user, canonical) in &file.plants {
            if user.is_empty() || user.trim().to_lowercase() != *user {
                return Err(ServiceError::Config(format!(
                    "plant key '{user}' must be non-empty, trimmed and lower-case"
                )));
            }
            if canonical.is_empty() || canonical.contains(LABEL_SEPARATOR) {
                return Err(ServiceError::Config(format!(
                    "canonical plant '{canonical}' must be non-empty and must not contain '{LABEL_SEPARATOR}'"
                )));
            }
        }
        if let Some(label) = file.advice.keys().find(|k| k.is_empty()) {
            return Err(ServiceError::Config(format!(
                "advice label '{label}' must not be empty"
            )));
        }

        Ok(Self::from_tables(file.plants, file.advice))
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_json_str(&raw)
    }

    fn from_tables(plants: BTreeMap<String, String>, advice: HashMap<String, String>) -> Self {
        let mut prefixes: Vec<String> = plants.values().cloned().collect();
        prefixes.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        prefixes.dedup();

        Self {
            plants,
            advice,
            prefixes,
        }
    }

    /// Canonical model name for a free-text plant name, if supported.
    pub fn canonical_plant(&self, user_plant: &str) -> Option<&str> {
        self.plants
            .get(&user_plant.trim().to_lowercase())
            .map(String::as_str)
    }

    /// Recognized user-facing plant names, sorted.
    pub fn supported_plants(&self) -> Vec<String> {
        self.plants.keys().cloned().collect()
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    pub fn advice_for(&self, label: &str) -> Option<&str> {
        self.advice.get(label).map(String::as_str)
    }

    pub fn advice_len(&self) -> usize {
        self.advice.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_tables() {
        let catalog = Catalog::builtin();
        assert_eq!(
            catalog.supported_plants(),
            vec!["corn", "maize", "potato", "rice", "wheat"]
        );
        assert_eq!(catalog.advice_len(), 13);
        assert_eq!(catalog.canonical_plant("  Maize "), Some("Corn"));
        assert_eq!(catalog.canonical_plant("tomato"), None);
    }

    #[test]
    fn prefixes_are_longest_first_and_unique() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.prefixes(), &["Potato", "Wheat", "Corn", "Rice"]);
    }

    #[test]
    fn canonical_names_are_label_prefixes() {
        let catalog = Catalog::builtin();
        for plant in catalog.supported_plants() {
            let canonical = catalog.canonical_plant(&plant).unwrap();
            assert!(catalog.prefixes().iter().any(|p| p == canonical));
        }
    }

    #[test]
    fn loads_json_catalog() {
        let catalog = Catalog::from_json_str(
            r#"{
                "plants": {"corn": "Corn", "sweetcorn": "Corn_Sweet"},
                "advice": {"Corn_Sweet___Smut": "Remove galls before they rupture."}
            }"#,
        )
        .unwrap();
        assert_eq!(catalog.prefixes(), &["Corn_Sweet", "Corn"]);
        assert_eq!(
            catalog.advice_for("Corn_Sweet___Smut"),
            Some("Remove galls before they rupture.")
        );
    }

    #[tokio::test]
    async fn loads_catalog_file() {
        let path = std::env::temp_dir().join("agro_service_rs_catalog.json");
        tokio::fs::write(
            &path,
            r#"{"plants": {"barley": "Barley"}, "advice": {"Barley___Net_Blotch": "Use clean seed."}}"#,
        )
        .await
        .unwrap();

        let catalog = Catalog::load(&path).await.unwrap();
        tokio::fs::remove_file(&path).await.unwrap();

        assert_eq!(catalog.supported_plants(), vec!["barley"]);
        assert_eq!(catalog.canonical_plant("Barley"), Some("Barley"));
        assert_eq!(catalog.advice_for("Barley___Net_Blotch"), Some("Use clean seed."));
    }

    #[tokio::test]
    async fn missing_catalog_file_is_io_error() {
        let path = std::env::temp_dir().join("agro_service_rs_no_such_dir/catalog.json");
        let err = Catalog::load(&path).await.unwrap_err();
        assert!(matches!(err, ServiceError::Io(_)));
    }

    #[test]
    fn rejects_bad_catalogs() {
        assert!(Catalog::from_json_str(r#"{"plants": {"Corn": "Corn"}}"#).is_err());
        assert!(Catalog::from_json_str(r#"{"plants": {"corn": "Co___rn"}}"#).is_err());
        assert!(Catalog::from_json_str(r#"{"plants": {"corn": ""}}"#).is_err());
        assert!(Catalog::from_json_str("not json").is_err());
    }
}
