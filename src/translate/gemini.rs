use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

use super::Translator;
use crate::config::TranslateConfig;
use crate::error::{Result, TranslarrError};
use crate::models::TranslationSettings;
use crate::settings::GEMINI_API_KEY;

/// Finish reasons meaning the candidate was withheld by a content filter
const BLOCKED_FINISH_REASONS: &[&str] = &["SAFETY", "PROHIBITED_CONTENT", "BLOCKLIST", "SPII", "RECITATION"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    fn text(role: Option<&str>, text: &str) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![Part {
                text: Some(text.to_string()),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
}

/// `models/{model}:generateContent` request body
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub system_instruction: Content,
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

impl GenerateContentRequest {
    pub fn new(text: &str, system_prompt: &str, temperature: f32) -> Self {
        Self {
            system_instruction: Content::text(None, system_prompt),
            contents: vec![Content::text(Some("user"), text)],
            generation_config: GenerationConfig { temperature },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

impl GenerateContentResponse {
    /// Translated text, or the distinct failure the API signalled
    pub fn into_text(self) -> Result<String> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(TranslarrError::SafetyBlocked(reason));
        }

        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or(TranslarrError::EmptyResponse)?;

        if let Some(reason) = candidate.finish_reason.as_deref() {
            if BLOCKED_FINISH_REASONS.contains(&reason) {
                return Err(TranslarrError::SafetyBlocked(reason.to_string()));
            }
        }

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(TranslarrError::EmptyResponse);
        }
        Ok(text)
    }
}

/// Google Gemini REST client
pub struct GeminiTranslator {
    client: Client,
    endpoint: String,
}

impl GeminiTranslator {
    pub fn new(config: &TranslateConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, model)
    }

    /// Send a one-word prompt to verify key and model
    pub async fn test_connection(&self, settings: &TranslationSettings) -> Result<String> {
        let ping = TranslationSettings {
            system_prompt: "Reply with a single word.".to_string(),
            temperature: 0.0,
            ..settings.clone()
        };
        self.translate("Hello", &ping).await
    }
}

fn api_key(settings: &TranslationSettings) -> Result<&str> {
    match settings.api_key.trim() {
        "" => Err(TranslarrError::Config(format!("{} setting is not configured", GEMINI_API_KEY))),
        key => Ok(key),
    }
}

#[async_trait]
impl Translator for GeminiTranslator {
    async fn translate(&self, text: &str, settings: &TranslationSettings) -> Result<String> {
        let key = api_key(settings)?;
        let model = settings.model.as_str();
        let request = GenerateContentRequest::new(text, &settings.system_prompt, settings.temperature);

        info!("Sending {} bytes to Gemini model {}", text.len(), model);

        let response = self
            .client
            .post(self.url(model))
            .header("x-goog-api-key", key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            error!("Gemini API quota exhausted for model {}", model);
            return Err(TranslarrError::RateLimitExceeded);
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("Gemini API error ({}): {}", status, error_text);
            return Err(TranslarrError::Translation(format!(
                "Gemini API error ({}): {}",
                status, error_text
            )));
        }

        let body: GenerateContentResponse = response.json().await?;
        let translated = body.into_text()?;
        debug!("Gemini returned {} bytes", translated.len());
        Ok(translated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SizeLimits;

    fn parse(json: &str) -> Result<String> {
        serde_json::from_str::<GenerateContentResponse>(json).unwrap().into_text()
    }

    #[test]
    fn test_request_body_shape() {
        let request = GenerateContentRequest::new("1\n00:00:01,000 --> 00:00:02,000\nHi", "Translate", 0.55);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["systemInstruction"]["parts"][0]["text"], "Translate");
        assert!(value["systemInstruction"].get("role").is_none());
        assert_eq!(value["contents"][0]["role"], "user");
        assert!(value["contents"][0]["parts"][0]["text"].as_str().unwrap().ends_with("Hi"));
        assert!((value["generationConfig"]["temperature"].as_f64().unwrap() - 0.55).abs() < 1e-6);
    }

    #[test]
    fn test_text_parts_are_joined() {
        let json = r#"{"candidates": [{"content": {"role": "model",
            "parts": [{"text": "1\n00:00:01,000 --> "}, {"text": "00:00:02,000\nCześć"}]},
            "finishReason": "STOP"}]}"#;
        assert_eq!(parse(json).unwrap(), "1\n00:00:01,000 --> 00:00:02,000\nCześć");
    }

    #[test]
    fn test_blocked_prompt_is_safety_blocked() {
        let json = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        assert!(matches!(parse(json), Err(TranslarrError::SafetyBlocked(r)) if r == "SAFETY"));
    }

    #[test]
    fn test_blocked_candidate_is_safety_blocked() {
        let json = r#"{"candidates": [{"finishReason": "PROHIBITED_CONTENT"}]}"#;
        assert!(matches!(parse(json), Err(TranslarrError::SafetyBlocked(_))));
    }

    #[test]
    fn test_missing_text_is_empty_response() {
        assert!(matches!(parse(r#"{"candidates": []}"#), Err(TranslarrError::EmptyResponse)));
        let blank = r#"{"candidates": [{"content": {"parts": [{"text": "  "}]}, "finishReason": "STOP"}]}"#;
        assert!(matches!(parse(blank), Err(TranslarrError::EmptyResponse)));
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_before_network() {
        let config = TranslateConfig {
            endpoint: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
        };
        let translator = GeminiTranslator::new(&config).unwrap();
        let settings = TranslationSettings {
            api_key: "  ".to_string(),
            model: "gemini-2.5-pro".to_string(),
            system_prompt: "prompt".to_string(),
            temperature: 0.5,
            preferred_lang: "pl".to_string(),
            size_limits: SizeLimits {
                plain_bytes: 1024,
                advanced_bytes: 2048,
            },
        };

        let err = translator.translate("text", &settings).await.unwrap_err();
        assert!(matches!(err, TranslarrError::Config(_)));
        assert_eq!(err.to_string(), "Configuration error: GeminiApiKey setting is not configured");
    }
}
