//! Gemini enricher — Google's generative-language `generateContent` API.
//!
//! Supports:
//! - Prompt enhancement (free text)
//! - Suggestions and clarifying questions (JSON arrays, parsed leniently)
//! - Reference images sent as inline data parts

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use promptscaffold_core::error::ProviderError;
use promptscaffold_core::{ClarifyingQuestion, Enricher, EnrichmentRequest, Scaffold, SlotKey};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::prompts;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// A Gemini `generateContent` client.
pub struct GeminiProvider {
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl GeminiProvider {
    /// Create a new Gemini provider with the default endpoint and model.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_timeout(api_key, Duration::from_secs(60))
    }

    pub fn with_timeout(api_key: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to build HTTP client with timeout, using defaults");
                reqwest::Client::new()
            });

        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.into(),
            temperature: 0.7,
            client,
        }
    }

    /// Override the API base URL (proxies, tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    /// Build the request body for a text instruction plus optional images.
    fn request_body(&self, instruction: &str, images: &[String]) -> serde_json::Value {
        let mut parts = vec![serde_json::json!({ "text": instruction })];
        for url in images {
            match parse_data_url(url) {
                Some(image) => parts.push(serde_json::json!({
                    "inline_data": { "mime_type": image.mime_type, "data": image.data }
                })),
                None => warn!("Skipping reference image that is not a base64 data URL"),
            }
        }

        serde_json::json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": { "temperature": self.temperature },
        })
    }

    /// Send one `generateContent` call and return the concatenated text parts.
    async fn generate(&self, instruction: &str, images: &[String]) -> Result<String, ProviderError> {
        if self.api_key.trim().is_empty() {
            return Err(ProviderError::NotConfigured(
                "No Gemini API key. Set PROMPTSCAFFOLD_API_KEY or api_key in config.toml".into(),
            ));
        }

        let body = self.request_body(instruction, images);
        debug!(model = %self.model, images = images.len(), "Sending generateContent request");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            return Err(status_error(status, error_body));
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        api_response.text()
    }
}

/// Map a non-200 status to a provider error.
fn status_error(status: u16, body: String) -> ProviderError {
    match status {
        429 => ProviderError::RateLimited {
            retry_after_secs: 5,
        },
        401 | 403 => ProviderError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ),
        _ => {
            warn!(status, body = %body, "Gemini returned error");
            ProviderError::ApiError {
                status_code: status,
                message: body,
            }
        }
    }
}

#[async_trait]
impl Enricher for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn enhance(&self, request: &EnrichmentRequest) -> Result<String, ProviderError> {
        let instruction = prompts::enhance_instruction(&request.prompt, request.images.len());
        let text = prompts::clean_text(&self.generate(&instruction, &request.images).await?);
        if text.is_empty() {
            return Err(ProviderError::InvalidResponse("Empty enhancement".into()));
        }
        Ok(text)
    }

    async fn suggestions(&self, request: &EnrichmentRequest) -> Result<Vec<String>, ProviderError> {
        let raw = self
            .generate(&prompts::suggestions_instruction(&request.prompt), &[])
            .await?;
        prompts::parse_string_list(&raw)
            .ok_or_else(|| ProviderError::InvalidResponse("No JSON array of suggestions".into()))
    }

    async fn clarifying_questions(
        &self,
        scaffold: &Scaffold,
    ) -> Result<Vec<ClarifyingQuestion>, ProviderError> {
        let empty: Vec<SlotKey> = scaffold
            .slots()
            .iter()
            .filter(|s| !s.is_filled())
            .map(|s| s.key)
            .collect();
        if empty.is_empty() {
            return Ok(Vec::new());
        }

        let raw = self
            .generate(&prompts::questions_instruction(scaffold, &empty), &[])
            .await?;
        prompts::parse_questions(&raw, &empty)
            .ok_or_else(|| ProviderError::InvalidResponse("No JSON array of questions".into()))
    }
}

/// A decoded `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    /// Base64 payload, verified decodable.
    pub data: String,
}

/// Parse `data:<mime>;base64,<payload>`.
pub fn parse_data_url(url: &str) -> Option<InlineImage> {
    let rest = url.trim().strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    let mime_type = meta.strip_suffix(";base64")?;
    if mime_type.is_empty() || STANDARD.decode(payload).is_err() {
        return None;
    }
    Some(InlineImage {
        mime_type: mime_type.to_string(),
        data: payload.to_string(),
    })
}

/// Encode raw bytes as a data URL.
pub fn to_data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", STANDARD.encode(bytes))
}

// --- Gemini API types ---

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
}

#[derive(Debug, Deserialize)]
struct ApiCandidate {
    content: Option<ApiContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiContent {
    #[serde(default)]
    parts: Vec<ApiPart>,
}

#[derive(Debug, Deserialize)]
struct ApiPart {
    text: Option<String>,
}

impl ApiResponse {
    fn text(self) -> Result<String, ProviderError> {
        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No candidates in response".into()))?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".into());
            return Err(ProviderError::InvalidResponse(format!(
                "Empty candidate (finish reason: {reason})"
            )));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const GENERATE_PATH: &str = "/v1beta/models/gemini-test:generateContent";

    fn candidate(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] }, "finishReason": "STOP" }]
        })
    }

    fn provider_for(server: &MockServer) -> GeminiProvider {
        GeminiProvider::new("key")
            .with_base_url(server.uri())
            .with_model("gemini-test")
    }

    #[test]
    fn endpoint_includes_model() {
        let provider = GeminiProvider::new("key")
            .with_base_url("http://localhost:9/")
            .with_model("gemini-test");
        assert_eq!(
            provider.endpoint(),
            "http://localhost:9/v1beta/models/gemini-test:generateContent"
        );
    }

    #[test]
    fn request_body_carries_images_as_inline_data() {
        let provider = GeminiProvider::new("key").with_temperature(0.2);
        let image = to_data_url("image/png", b"\x89PNG");
        let body = provider.request_body("describe", &[image, "not a data url".into()]);

        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["text"], "describe");
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
        assert!((body["generationConfig"]["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn data_url_parsing() {
        let url = to_data_url("image/jpeg", b"hello");
        let image = parse_data_url(&url).unwrap();
        assert_eq!(image.mime_type, "image/jpeg");
        assert_eq!(STANDARD.decode(&image.data).unwrap(), b"hello");

        assert!(parse_data_url("data:image/png,rawbytes").is_none());
        assert!(parse_data_url("data:image/png;base64,***").is_none());
        assert!(parse_data_url("https://example.com/a.png").is_none());
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(status_error(429, String::new()), ProviderError::RateLimited { .. }));
        assert!(matches!(
            status_error(403, String::new()),
            ProviderError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            status_error(500, "boom".into()),
            ProviderError::ApiError { status_code: 500, .. }
        ));
    }

    #[test]
    fn response_text_joins_parts() {
        let response: ApiResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"a fox, "},{"text":"watercolor"}]},"finishReason":"STOP"}]}"#,
        )
        .unwrap();
        assert_eq!(response.text().unwrap(), "a fox, watercolor");
    }

    #[test]
    fn blocked_response_is_invalid() {
        let response: ApiResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap();
        let err = response.text().unwrap_err();
        assert!(err.to_string().contains("SAFETY"));

        let response: ApiResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(response.text(), Err(ProviderError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn missing_key_is_not_configured() {
        let provider = GeminiProvider::new("  ");
        let err = provider
            .enhance(&EnrichmentRequest::new("a fox"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn enhance_against_mock_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .and(header("x-goog-api-key", "key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(candidate("\"a red fox, watercolor, golden hour\"")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let text = provider_for(&server)
            .enhance(&EnrichmentRequest::new("a fox"))
            .await
            .unwrap();
        assert_eq!(text, "a red fox, watercolor, golden hour");
    }

    #[tokio::test]
    async fn images_reach_the_api_as_inline_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate("a fox")))
            .expect(1)
            .mount(&server)
            .await;

        let request = EnrichmentRequest::new("a fox")
            .with_images(vec![to_data_url("image/webp", b"RIFF")]);
        provider_for(&server).enhance(&request).await.unwrap();

        let received = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/webp");
    }

    #[tokio::test]
    async fn suggestions_parse_the_first_json_array() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate(
                "Here you go:\n```json\n[\"add golden hour light\", \"try a wide shot\"]\n```",
            )))
            .mount(&server)
            .await;

        let suggestions = provider_for(&server)
            .suggestions(&EnrichmentRequest::new("a fox"))
            .await
            .unwrap();
        assert_eq!(suggestions, vec!["add golden hour light", "try a wide shot"]);
    }

    #[tokio::test]
    async fn rate_limit_from_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(429).set_body_string(r#"{"error":{"code":429}}"#))
            .expect(1)
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .suggestions(&EnrichmentRequest::new("a fox"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn rejected_key_is_authentication_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .enhance(&EnrichmentRequest::new("a fox"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::AuthenticationFailed(_)));
    }

    #[tokio::test]
    async fn full_scaffold_needs_no_questions() {
        let scaffold = Scaffold::from_pairs(SlotKey::ALL.map(|k| (k, "x")));
        let provider = GeminiProvider::new("key").with_base_url("http://127.0.0.1:9");
        assert!(provider.clarifying_questions(&scaffold).await.unwrap().is_empty());
    }
}
