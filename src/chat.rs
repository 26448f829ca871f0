//! Prompt proxies for hosted text-generation models.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::{Result, ServiceError};
use crate::model::model_endpoint;

const AGRIQBOT_MAX_LENGTH: u32 = 256;

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Client for the Gemini `generateContent` REST API.
pub struct GeminiClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(client: reqwest::Client, base_url: &str, model: &str, api_key: String) -> Self {
        Self {
            client,
            endpoint: format!(
                "{}/models/{}:generateContent",
                base_url.trim_end_matches('/'),
                model
            ),
            api_key,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate.
    fn text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        Some(text)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let payload = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ServiceError::Upstream(format!("gemini returned {status}: {body}")));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| ServiceError::Upstream(format!("unexpected gemini response: {e}")))?;
        parsed
            .text()
            .ok_or_else(|| ServiceError::Upstream("gemini returned no candidates".into()))
    }
}

/// Client for a hosted text2text-generation model prompted as `Q: <prompt>`.
pub struct AgriQBotClient {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl AgriQBotClient {
    pub fn new(client: reqwest::Client, base_url: &str, model: &str, token: Option<String>) -> Self {
        Self {
            client,
            endpoint: model_endpoint(base_url, model),
            token,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Generation {
    generated_text: String,
}

#[async_trait]
impl TextGenerator for AgriQBotClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let payload = json!({
            "inputs": format!("Q: {prompt}"),
            "parameters": { "max_length": AGRIQBOT_MAX_LENGTH }
        });

        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ServiceError::Upstream(format!("agriqbot returned {status}: {body}")));
        }

        let generations: Vec<Generation> = serde_json::from_str(&body)
            .map_err(|e| ServiceError::Upstream(format!("unexpected agriqbot response: {e}")))?;
        generations
            .into_iter()
            .next()
            .map(|g| g.generated_text)
            .ok_or_else(|| ServiceError::Upstream("agriqbot returned no generations".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemini_text_joins_parts_of_first_candidate() {
        let parsed: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates": [
                {"content": {"parts": [{"text": "Rotate "}, {"text": "your crops."}], "role": "model"}},
                {"content": {"parts": [{"text": "ignored"}]}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(parsed.text().as_deref(), Some("Rotate your crops."));
    }

    #[test]
    fn gemini_without_candidates() {
        let parsed: GenerateContentResponse =
            serde_json::from_str(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#).unwrap();
        assert!(parsed.text().is_none());
    }

    #[test]
    fn gemini_endpoint() {
        let client = GeminiClient::new(
            reqwest::Client::new(),
            "https://generativelanguage.googleapis.com/v1beta/",
            "gemini-1.5-flash-latest",
            "k".into(),
        );
        assert_eq!(
            client.endpoint,
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash-latest:generateContent"
        );
    }
}
