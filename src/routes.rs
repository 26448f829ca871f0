use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State},
    routing::{get, post},
    Json, Router,
};
use image::DynamicImage;
use tower_http::trace::TraceLayer;

use crate::catalog::Catalog;
use crate::chat::TextGenerator;
use crate::error::{Result, ServiceError};
use crate::model::Classifier;
use crate::reconcile::reconcile;
use crate::responses::{DetectionResponse, HealthResponse, PromptRequest, PromptResponse};

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub classifier: Arc<dyn Classifier>,
    /// `None` when no Gemini key is configured.
    pub gemini: Option<Arc<dyn TextGenerator>>,
    pub agriqbot: Arc<dyn TextGenerator>,
}

pub fn router(state: AppState, body_limit_bytes: usize) -> Router {
    Router::new()
        .route("/detect-disease", post(detect_disease))
        .route("/palm-chat", post(palm_chat))
        .route("/agriqbot", post(agriqbot))
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .with_state(state)
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
}

async fn detect_disease(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<DetectionResponse>> {
    let mut image_data: Option<Bytes> = None;
    let mut plant: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "image" => image_data = Some(field.bytes().await?),
            "plant" => plant = Some(field.text().await?),
            _ => {}
        }
    }

    let (Some(image_data), Some(plant)) = (image_data, plant) else {
        return Err(ServiceError::InvalidRequest(
            "Image and plant name are required.".into(),
        ));
    };

    let image = tokio::task::spawn_blocking(move || {
        image::load_from_memory(&image_data).map(|img| DynamicImage::ImageRgb8(img.to_rgb8()))
    })
    .await
    .map_err(|e| ServiceError::Internal(e.to_string()))?
    .map_err(|e| ServiceError::InvalidImage(e.to_string()))?;

    let prediction = state.classifier.classify(image).await?;
    let outcome = reconcile(&state.catalog, &plant, &prediction.label, prediction.confidence);
    tracing::info!(
        plant = %plant.trim(),
        label = %prediction.label,
        confidence = prediction.confidence,
        outcome = ?outcome,
        "disease detection"
    );

    Ok(Json(DetectionResponse::from(&outcome)))
}

async fn palm_chat(
    State(state): State<AppState>,
    Json(request): Json<PromptRequest>,
) -> Result<Json<PromptResponse>> {
    let gemini = state
        .gemini
        .as_ref()
        .ok_or_else(|| ServiceError::Unavailable("PALM_API_KEY is not configured.".into()))?;
    let response = gemini.generate(&request.prompt).await?;
    Ok(Json(PromptResponse { response }))
}

async fn agriqbot(
    State(state): State<AppState>,
    Json(request): Json<PromptRequest>,
) -> Result<Json<PromptResponse>> {
    let response = state.agriqbot.generate(&request.prompt).await?;
    Ok(Json(PromptResponse { response }))
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
    })
}
