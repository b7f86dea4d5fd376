//! Generated marketing copy and product photos
//!
//! Thin client for a Gemini-style `generateContent` REST endpoint. One
//! request per call, no retries; callers fall back through
//! [`phrase_or_fallback`] and [`photo_or_none`].

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

use crate::error::{ClientError, ClientResult};

pub const DEFAULT_GENAI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Shown when no phrase could be generated
pub const FALLBACK_PHRASE: &str = "Qualidade e sabor que você merece!";

/// Image shape requested from the generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AspectRatio {
    /// Promotion card on a landscape TV
    #[default]
    Landscape,
    /// Portrait (rotated) TV
    Portrait,
    Square,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Landscape => "16:9",
            Self::Portrait => "9:16",
            Self::Square => "1:1",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generative endpoint settings
#[derive(Clone)]
pub struct GenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub text_model: String,
    pub image_model: String,
    pub timeout: Duration,
}

impl fmt::Debug for GenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenAiConfig")
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .field("text_model", &self.text_model)
            .field("image_model", &self.image_model)
            .finish()
    }
}

impl GenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_GENAI_URL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_models(mut self, text: impl Into<String>, image: impl Into<String>) -> Self {
        self.text_model = text.into();
        self.image_model = image.into();
        self
    }
}

/// Content generation boundary
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Short marketing line for a product
    async fn marketing_phrase(&self, product_name: &str) -> ClientResult<String>;

    /// Product photo as a `data:` URI
    async fn product_photo(&self, product_name: &str, aspect: AspectRatio) -> ClientResult<String>;
}

/// Phrase from the generator, or [`FALLBACK_PHRASE`] on any failure
pub async fn phrase_or_fallback(generator: &dyn ContentGenerator, product_name: &str) -> String {
    match generator.marketing_phrase(product_name).await {
        Ok(phrase) if !phrase.is_empty() => phrase,
        Ok(_) => FALLBACK_PHRASE.to_string(),
        Err(e) => {
            tracing::warn!(product = product_name, "Phrase generation failed: {e}");
            FALLBACK_PHRASE.to_string()
        }
    }
}

/// Photo from the generator, or `None` on any failure
pub async fn photo_or_none(
    generator: &dyn ContentGenerator,
    product_name: &str,
    aspect: AspectRatio,
) -> Option<String> {
    match generator.product_photo(product_name, aspect).await {
        Ok(uri) => Some(uri),
        Err(e) => {
            tracing::warn!(product = product_name, "Photo generation failed: {e}");
            None
        }
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct GenerateResponse {
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

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    status: String,
    message: String,
}

impl GenerateResponse {
    fn parts(&self) -> impl Iterator<Item = &Part> {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
    }

    /// First text part, trimmed of whitespace and wrapping quotes
    fn phrase(&self) -> Option<String> {
        self.parts()
            .filter_map(|p| p.text.as_deref())
            .map(|t| t.trim().trim_matches(|c| c == '"' || c == '“' || c == '”').trim())
            .find(|t| !t.is_empty())
            .map(str::to_string)
    }

    /// First inline image as a data URI; the payload must be valid base64
    fn image_uri(&self) -> ClientResult<String> {
        let inline = self
            .parts()
            .filter_map(|p| p.inline_data.as_ref())
            .find(|d| d.mime_type.starts_with("image/"))
            .ok_or_else(|| ClientError::Generation("response carried no image".into()))?;
        BASE64
            .decode(inline.data.as_bytes())
            .map_err(|e| ClientError::Generation(format!("invalid image payload: {e}")))?;
        Ok(format!("data:{};base64,{}", inline.mime_type, inline.data))
    }
}

fn phrase_prompt(product_name: &str) -> String {
    format!(
        "Escreva uma frase curta de marketing (no máximo 12 palavras) para o \
         produto \"{product_name}\" de um açougue. Responda apenas com a frase."
    )
}

fn photo_prompt(product_name: &str) -> String {
    format!(
        "Fotografia profissional de \"{product_name}\" fresco em um balcão de açougue, \
         iluminação de estúdio, fundo escuro, sem texto."
    )
}

// =============================================================================
// HTTP client
// =============================================================================

/// Gemini `generateContent` client
#[derive(Clone)]
pub struct GeminiClient {
    inner: Arc<GeminiClientInner>,
}

struct GeminiClientInner {
    client: reqwest::Client,
    config: GenAiConfig,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("config", &self.inner.config)
            .finish()
    }
}

impl GeminiClient {
    pub fn new(config: GenAiConfig) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            inner: Arc::new(GeminiClientInner { client, config }),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.inner.config.base_url.trim_end_matches('/'),
            model
        )
    }

    async fn generate(&self, model: &str, body: serde_json::Value) -> ClientResult<GenerateResponse> {
        let response = self
            .inner
            .client
            .post(self.endpoint(model))
            .query(&[("key", self.inner.config.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let message = match serde_json::from_str::<ApiErrorBody>(&text) {
                Ok(body) => format!("{} {}", body.error.status, body.error.message),
                Err(_) => text,
            };
            return Err(ClientError::Generation(format!(
                "{status}: {}",
                message.trim()
            )));
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl ContentGenerator for GeminiClient {
    #[instrument(skip(self), fields(model = %self.inner.config.text_model))]
    async fn marketing_phrase(&self, product_name: &str) -> ClientResult<String> {
        let body = json!({
            "contents": [{ "parts": [{ "text": phrase_prompt(product_name) }] }],
            "generationConfig": { "temperature": 0.9, "maxOutputTokens": 64 }
        });
        let response = self.generate(&self.inner.config.text_model, body).await?;
        response
            .phrase()
            .ok_or_else(|| ClientError::Generation("response carried no text".into()))
    }

    #[instrument(skip(self), fields(model = %self.inner.config.image_model))]
    async fn product_photo(&self, product_name: &str, aspect: AspectRatio) -> ClientResult<String> {
        let body = json!({
            "contents": [{ "parts": [{ "text": photo_prompt(product_name) }] }],
            "generationConfig": {
                "responseModalities": ["IMAGE"],
                "imageConfig": { "aspectRatio": aspect.as_str() }
            }
        });
        let response = self.generate(&self.inner.config.image_model, body).await?;
        response.image_uri()
    }
}
