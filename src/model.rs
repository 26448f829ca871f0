use std::io::Cursor;

use async_trait::async_trait;
use image::{DynamicImage, ImageOutputFormat};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServiceError};

/// Top-1 output of the disease classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: String,
    pub confidence: f32,
}

impl ClassificationResult {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            label: label.into(),
            confidence,
        }
    }
}

#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classifies an RGB leaf image.
    async fn classify(&self, image: DynamicImage) -> Result<ClassificationResult>;
}

#[derive(Debug, Deserialize)]
struct HostedPrediction {
    label: String,
    score: f32,
}

/// Image classifier served by a hosted inference API
/// (`POST <base>/<model>` with the encoded image as body).
pub struct HostedClassifier {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl HostedClassifier {
    pub fn new(client: reqwest::Client, base_url: &str, model: &str, token: Option<String>) -> Self {
        Self {
            client,
            endpoint: model_endpoint(base_url, model),
            token,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Classifier for HostedClassifier {
    async fn classify(&self, image: DynamicImage) -> Result<ClassificationResult> {
        let png = tokio::task::spawn_blocking(move || encode_png(&image))
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))??;

        let mut request = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "image/png")
            .body(png);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ServiceError::Inference(format!("{status}: {body}")));
        }

        let predictions: Vec<HostedPrediction> = serde_json::from_str(&body)
            .map_err(|e| ServiceError::Inference(format!("unexpected response: {e}")))?;
        let top = top_prediction(predictions)
            .ok_or_else(|| ServiceError::Inference("model returned no predictions".into()))?;

        tracing::debug!(label = %top.label, confidence = top.confidence, "hosted classification");
        Ok(top)
    }
}

fn top_prediction(predictions: Vec<HostedPrediction>) -> Option<ClassificationResult> {
    predictions
        .into_iter()
        .max_by(|a, b| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|p| ClassificationResult::new(p.label, p.score))
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .map_err(|e| ServiceError::Internal(format!("failed to encode image: {e}")))?;
    Ok(bytes)
}

pub(crate) fn model_endpoint(base_url: &str, model: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        model.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_highest_score() {
        let predictions: Vec<HostedPrediction> = serde_json::from_str(
            r#"[
                {"label": "Corn___Healthy", "score": 0.12},
                {"label": "Corn___Common_Rust", "score": 0.85},
                {"label": "Corn___Gray_Leaf_Spot", "score": 0.03}
            ]"#,
        )
        .unwrap();
        let top = top_prediction(predictions).unwrap();
        assert_eq!(top.label, "Corn___Common_Rust");
        assert!((top.confidence - 0.85).abs() < f32::EPSILON);
    }

    #[test]
    fn empty_predictions() {
        assert!(top_prediction(Vec::new()).is_none());
    }

    #[test]
    fn clamps_confidence() {
        assert_eq!(ClassificationResult::new("x", 1.3).confidence, 1.0);
        assert_eq!(ClassificationResult::new("x", -0.1).confidence, 0.0);
        assert_eq!(ClassificationResult::new("x", f32::NAN).confidence, 0.0);
    }

    #[test]
    fn joins_endpoint() {
        assert_eq!(
            model_endpoint("https://host/models/", "wambugu71/crop_leaf_diseases_vit"),
            "https://host/models/wambugu71/crop_leaf_diseases_vit"
        );
    }

    #[test]
    fn encodes_png() {
        let image = DynamicImage::ImageRgb8(image::RgbImage::new(2, 2));
        let bytes = encode_png(&image).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }
}
