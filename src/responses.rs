use serde::{Deserialize, Serialize};

use crate::reconcile::{Diagnosis, ReconciliationOutcome};

/// Body returned by `/detect-disease`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResponse {
    pub confirmation: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub healthy: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub disease: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub advice: Option<String>,
}

impl DetectionResponse {
    fn rejected(message: String, confidence: Option<f32>) -> Self {
        Self {
            confirmation: false,
            healthy: None,
            message: Some(message),
            disease: None,
            confidence,
            advice: None,
        }
    }
}

impl From<&ReconciliationOutcome> for DetectionResponse {
    fn from(outcome: &ReconciliationOutcome) -> Self {
        match outcome {
            ReconciliationOutcome::UnrecognizedPlant {
                user_plant,
                supported,
            } => Self::rejected(
                format!(
                    "The plant name '{user_plant}' is not one the system is trained to specifically analyze with this model. This model supports: {}.",
                    supported.join(", ")
                ),
                None,
            ),
            ReconciliationOutcome::UnparsableLabel { label, confidence } => Self::rejected(
                format!(
                    "Model prediction format unexpected. Predicted: '{label}'. Could not determine plant/disease."
                ),
                Some(*confidence),
            ),
            ReconciliationOutcome::PlantMismatch {
                declared,
                detected,
                condition,
                confidence,
            } => Self::rejected(
                format!(
                    "Image for '{declared}' identified by model as '{detected}' (disease: {condition}). Please upload correct image for '{declared}'."
                ),
                Some(*confidence),
            ),
            ReconciliationOutcome::Match {
                declared,
                detected,
                confidence,
                diagnosis: Diagnosis::Healthy,
            } => Self {
                confirmation: true,
                healthy: Some(true),
                message: Some(format!("Your {declared} ({detected}) appears healthy!")),
                disease: None,
                confidence: Some(*confidence),
                advice: None,
            },
            ReconciliationOutcome::Match {
                confidence,
                diagnosis: Diagnosis::Diseased { disease, advice },
                ..
            } => Self {
                confirmation: true,
                healthy: Some(false),
                message: None,
                disease: Some(disease.clone()),
                confidence: Some(*confidence),
                advice: Some(advice.clone()),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptRequest {
    #[serde(default)]
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptResponse {
    pub response: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
