use crate::core::config::Config;
use crate::core::story::ReferenceImage;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

pub mod gemini;

/// One piece of a provider response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    InlineData { mime_type: String, data: Vec<u8> },
}

/// Content returned by a multimodal call. An empty part list means the
/// provider produced nothing (typically a content-policy block).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderResponse {
    pub parts: Vec<ContentPart>,
    pub finish_reason: Option<String>,
}

impl ProviderResponse {
    pub fn empty(finish_reason: Option<String>) -> Self {
        Self {
            parts: Vec::new(),
            finish_reason,
        }
    }

    pub fn has_content(&self) -> bool {
        !self.parts.is_empty()
    }

    /// First inline binary part, if any.
    pub fn first_inline(&self) -> Option<(&str, &[u8])> {
        self.parts.iter().find_map(|p| match p {
            ContentPart::InlineData { mime_type, data } => {
                Some((mime_type.as_str(), data.as_slice()))
            }
            ContentPart::Text(_) => None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct StructuredTextRequest {
    pub system: String,
    pub prompt: String,
    /// Output schema the provider must honour.
    pub schema: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct ImageRequest<'a> {
    pub prompt: String,
    /// Present for the photo-conditioned attempt only.
    pub reference: Option<&'a ReferenceImage>,
}

#[derive(Debug, Clone)]
pub struct AudioRequest {
    pub prompt: String,
    pub voice: String,
}

#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Returns the raw structured (JSON) text of the response.
    async fn generate_structured_text(&self, request: &StructuredTextRequest) -> Result<String>;
    async fn generate_image(&self, request: &ImageRequest<'_>) -> Result<ProviderResponse>;
    async fn generate_audio(&self, request: &AudioRequest) -> Result<ProviderResponse>;
}

pub fn create_provider(config: &Config) -> Result<Arc<dyn ProviderClient>> {
    match config.provider.name.as_str() {
        "gemini" => {
            let cfg = config
                .provider
                .gemini
                .clone()
                .context("Gemini config missing")?;
            let api_key = cfg.resolve_api_key().with_context(|| {
                format!(
                    "No Gemini API key: set provider.gemini.api_key or {}",
                    crate::core::config::API_KEY_ENV
                )
            })?;
            Ok(Arc::new(gemini::GeminiProvider::new(api_key, cfg)))
        }
        _ => Err(anyhow!("Unknown provider: {}", config.provider.name)),
    }
}
