use std::env;
use std::sync::LazyLock;

use regex::Regex;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Method, Request, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::error::GenerationError;
use crate::provider::HTTPProvider;
use crate::secret::Secret;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.0-pro";

static API_KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bapi[ _-]?key").expect("static regex"));
static SAFETY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bsafety\b").expect("static regex"));

/// Finish reasons that mean the response was withheld by the safety filter
const SAFETY_FINISH_REASONS: [&str; 4] = ["SAFETY", "BLOCKLIST", "PROHIBITED_CONTENT", "SPII"];

const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Sampling parameters sent with every request
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSettings {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 1024,
        }
    }
}

/// Configuration for the Gemini provider
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key for authentication
    pub api_key: Secret<String>,
    /// Base URL for the API
    pub base_url: String,
    /// Model id, e.g. `gemini-1.0-pro`
    pub model: String,
    /// Safety threshold applied to every harm category
    pub safety_threshold: String,
    pub generation: GenerationSettings,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: Secret::new(env::var("GEMINI_API_KEY").unwrap_or_default()),
            base_url: env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            model: env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            safety_threshold: "BLOCK_MEDIUM_AND_ABOVE".to_string(),
            generation: GenerationSettings::default(),
        }
    }
}

impl GeminiConfig {
    /// Defaults with an explicit key and base URL, ignoring the environment
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            base_url: base_url.into(),
            model: DEFAULT_MODEL.to_string(),
            safety_threshold: "BLOCK_MEDIUM_AND_ABOVE".to_string(),
            generation: GenerationSettings::default(),
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// Streams completions from the Gemini `streamGenerateContent` endpoint
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    config: GeminiConfig,
}

impl GeminiProvider {
    /// Creates a provider configured from `GEMINI_*` environment variables
    ///
    /// # Examples
    ///
    /// ```
    /// use helia_core::provider::gemini::GeminiProvider;
    ///
    /// let provider = GeminiProvider::new();
    /// ```
    #[instrument(level = "debug")]
    pub fn new() -> Self {
        Self::with_config(GeminiConfig::default())
    }

    #[instrument(skip(config), level = "debug")]
    pub fn with_config(config: GeminiConfig) -> Self {
        info!("Creating GeminiProvider for model {}", config.model);
        debug!("API key set: {}", !config.api_key.is_empty());
        debug!("Base URL: {}", config.base_url);
        Self { config }
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn payload(&self, prompt: &str) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: Some(prompt.to_string()),
                }],
            }],
            safety_settings: HARM_CATEGORIES
                .iter()
                .map(|category| GeminiSafetySetting {
                    category: category.to_string(),
                    threshold: self.config.safety_threshold.clone(),
                })
                .collect(),
            generation_config: self.config.generation,
        }
    }
}

impl Default for GeminiProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps an upstream status code and message to the generation taxonomy
fn classify(status: u16, message: &str) -> GenerationError {
    match status {
        401 | 403 => GenerationError::MissingConfiguration(format!(
            "Invalid or missing API key: {message}"
        )),
        408 | 429 | 500..=599 => GenerationError::network(format!("{status}: {message}")),
        _ if API_KEY_PATTERN.is_match(message) => GenerationError::MissingConfiguration(format!(
            "Invalid or missing API key: {message}"
        )),
        _ if SAFETY_PATTERN.is_match(message) => {
            GenerationError::ContentSafetyBlocked(message.to_string())
        }
        _ => GenerationError::Unknown(format!("{status}: {message}")),
    }
}

impl HTTPProvider for GeminiProvider {
    fn accept(&self, prompt: &str) -> Result<Request, GenerationError> {
        if self.config.api_key.is_empty() {
            error!("Gemini API key is not configured");
            return Err(GenerationError::MissingConfiguration(
                "Gemini API key is not configured. Please set GEMINI_API_KEY.".to_string(),
            ));
        }

        let url_str = format!(
            "{}/models/{}:streamGenerateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );
        let mut url = Url::parse(&url_str).map_err(|e| {
            error!("Failed to parse URL '{}': {}", url_str, e);
            GenerationError::from(e)
        })?;
        url.query_pairs_mut().append_pair("alt", "sse");

        let mut request = Request::new(Method::POST, url);
        debug!("Created request: {} {}", request.method(), request.url());

        let mut key = HeaderValue::from_str(self.config.api_key.expose()).map_err(|_| {
            GenerationError::MissingConfiguration("API key contains invalid characters".into())
        })?;
        key.set_sensitive(true);
        let headers = request.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("x-goog-api-key", key);

        let payload = self.payload(prompt);
        trace!("Prompt length: {} chars", prompt.len());
        let body = serde_json::to_vec(&payload).map_err(|e| {
            error!("Failed to serialize payload: {}", e);
            GenerationError::Unknown(e.to_string())
        })?;
        debug!("Payload serialized ({} bytes)", body.len());
        *request.body_mut() = Some(body.into());

        Ok(request)
    }

    fn parse_event(&self, data: &str) -> Result<Option<String>, GenerationError> {
        trace!("Raw event: {}", data);
        let chunk = match serde_json::from_str::<GeminiStreamChunk>(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                error!("Failed to parse Gemini event: {}", e);
                return Err(GenerationError::Unknown(format!("invalid Gemini event: {e}")));
            }
        };

        if let Some(err) = chunk.error {
            error!("Gemini API returned an error ({}): {}", err.status, err.message);
            let status = u16::try_from(err.code).unwrap_or(500);
            return Err(classify(status, &err.message));
        }

        if let Some(reason) = chunk.prompt_feedback.and_then(|f| f.block_reason) {
            warn!("Prompt blocked: {}", reason);
            return Err(GenerationError::ContentSafetyBlocked(format!(
                "prompt blocked: {reason}"
            )));
        }

        if let Some(usage) = &chunk.usage_metadata {
            trace!(
                "Usage: prompt={} candidates={} total={}",
                usage.prompt_token_count, usage.candidates_token_count, usage.total_token_count
            );
        }

        let Some(candidate) = chunk.candidates.into_iter().next() else {
            return Ok(None);
        };

        if let Some(reason) = candidate.finish_reason.as_deref() {
            if SAFETY_FINISH_REASONS.contains(&reason) {
                warn!("Response blocked: {}", reason);
                return Err(GenerationError::ContentSafetyBlocked(format!(
                    "response blocked: {reason}"
                )));
            }
            debug!("Finish reason: {}", reason);
        }

        let text: String = candidate
            .content
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        Ok((!text.is_empty()).then_some(text))
    }

    fn classify_failure(&self, status: StatusCode, body: &str) -> GenerationError {
        let message = serde_json::from_str::<GeminiErrorResponse>(body)
            .ok()
            .and_then(|response| response.error)
            .map(|err| err.message)
            .unwrap_or_else(|| body.trim().to_string());
        error!("Gemini request failed with {}: {}", status, message);
        classify(status.as_u16(), &message)
    }
}

/// Represents a content part in Gemini API format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Represents a content object in Gemini API format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct GeminiSafetySetting {
    pub category: String,
    pub threshold: String,
}

/// Represents a request to the Gemini API
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    pub safety_settings: Vec<GeminiSafetySetting>,
    pub generation_config: GenerationSettings,
}

/// One event of a `streamGenerateContent` response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiStreamChunk {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
    pub prompt_feedback: Option<GeminiPromptFeedback>,
    pub usage_metadata: Option<GeminiUsageMetadata>,
    pub error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiCandidate {
    pub content: Option<GeminiContent>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiPromptFeedback {
    pub block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiUsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
    #[serde(default)]
    pub total_token_count: u32,
}

/// Represents an error response from the Gemini API
#[derive(Debug, Deserialize)]
pub(crate) struct GeminiErrorResponse {
    pub error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeminiError {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: String,
}
