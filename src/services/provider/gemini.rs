use super::{
    AudioRequest, ContentPart, ImageRequest, ProviderClient, ProviderResponse,
    StructuredTextRequest,
};
use crate::core::config::GeminiConfig;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use log::{debug, warn};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Duration};

pub struct GeminiProvider {
    api_key: String,
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: String, config: GeminiConfig) -> Self {
        Self {
            api_key,
            config,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        )
    }

    async fn post(&self, model: &str, body: &GeminiRequest) -> Result<GeminiResponse> {
        let url = self.endpoint(model);
        let max_attempts = self.config.retry_count + 1;
        let mut last_error = anyhow!("Gemini request was never sent");

        for attempt in 0..max_attempts {
            if attempt > 0 {
                warn!(
                    "Gemini request to {} failed (attempt {}/{}), retrying in {}s...",
                    model, attempt, max_attempts, self.config.retry_delay_seconds
                );
                sleep(Duration::from_secs(self.config.retry_delay_seconds)).await;
            }

            match self.try_post(&url, body).await {
                Ok(resp) => return Ok(resp),
                Err(TransportError::Fatal(e)) => return Err(e),
                Err(TransportError::Retryable(e)) => {
                    warn!("Gemini transport error: {:#}", e);
                    last_error = e;
                }
            }
        }

        Err(last_error.context(format!(
            "Gemini request to {} still failing after {} attempts",
            model, max_attempts
        )))
    }

    async fn try_post(
        &self,
        url: &str,
        body: &GeminiRequest,
    ) -> std::result::Result<GeminiResponse, TransportError> {
        let resp = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                TransportError::Retryable(
                    anyhow::Error::new(e).context("Failed to send Gemini request"),
                )
            })?;

        let status = resp.status();
        let response_text = resp
            .text()
            .await
            .map_err(|e| {
                TransportError::Retryable(
                    anyhow::Error::new(e).context("Failed to read Gemini response"),
                )
            })?;

        if !status.is_success() {
            let err = anyhow!("Gemini API error ({}): {}", status, response_text);
            return Err(if is_retryable_status(status) {
                TransportError::Retryable(err)
            } else {
                TransportError::Fatal(err)
            });
        }

        debug!("Gemini response: {} bytes", response_text.len());
        let result: GeminiResponse = serde_json::from_str(&response_text).map_err(|e| {
            TransportError::Fatal(anyhow!(
                "Failed to parse Gemini response: {}. Body: {}",
                e,
                response_text
            ))
        })?;

        if let Some(err) = &result.error {
            return Err(TransportError::Fatal(anyhow!(
                "Gemini API returned error: {}",
                err.message
            )));
        }

        Ok(result)
    }
}

enum TransportError {
    Retryable(anyhow::Error),
    Fatal(anyhow::Error),
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

// --- Wire format ---

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<GeminiInlineData>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    /// Base64 encoded.
    data: String,
}

#[derive(Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speech_config: Option<serde_json::Value>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    prompt_feedback: Option<PromptFeedback>,
    error: Option<GeminiError>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct GeminiError {
    message: String,
}

fn text_part(text: &str) -> GeminiPart {
    GeminiPart {
        text: Some(text.to_string()),
        inline_data: None,
    }
}

fn user_content(parts: Vec<GeminiPart>) -> Vec<GeminiContent> {
    vec![GeminiContent {
        role: Some("user".to_string()),
        parts,
    }]
}

fn build_text_request(request: &StructuredTextRequest) -> GeminiRequest {
    GeminiRequest {
        contents: user_content(vec![text_part(&request.prompt)]),
        system_instruction: Some(GeminiContent {
            role: None,
            parts: vec![text_part(&request.system)],
        }),
        generation_config: Some(GenerationConfig {
            response_mime_type: Some("application/json".to_string()),
            response_schema: Some(request.schema.clone()),
            ..Default::default()
        }),
    }
}

fn build_image_request(request: &ImageRequest<'_>) -> GeminiRequest {
    let mut parts = Vec::with_capacity(2);
    if let Some(reference) = request.reference {
        parts.push(GeminiPart {
            text: None,
            inline_data: Some(GeminiInlineData {
                mime_type: reference.mime_type.clone(),
                data: BASE64.encode(&reference.data),
            }),
        });
    }
    parts.push(text_part(&request.prompt));

    GeminiRequest {
        contents: user_content(parts),
        system_instruction: None,
        generation_config: Some(GenerationConfig {
            response_modalities: Some(vec!["IMAGE".to_string(), "TEXT".to_string()]),
            ..Default::default()
        }),
    }
}

fn build_audio_request(request: &AudioRequest) -> GeminiRequest {
    GeminiRequest {
        contents: user_content(vec![text_part(&request.prompt)]),
        system_instruction: None,
        generation_config: Some(GenerationConfig {
            response_modalities: Some(vec!["AUDIO".to_string()]),
            speech_config: Some(serde_json::json!({
                "voiceConfig": {
                    "prebuiltVoiceConfig": { "voiceName": request.voice }
                }
            })),
            ..Default::default()
        }),
    }
}

/// Flattens the first candidate into our content model. A missing
/// candidate or a candidate without parts becomes an empty response.
fn into_provider_response(resp: GeminiResponse) -> Result<ProviderResponse> {
    let Some(first) = resp.candidates.and_then(|c| c.into_iter().next()) else {
        let reason = resp.prompt_feedback.and_then(|f| f.block_reason);
        return Ok(ProviderResponse::empty(reason));
    };

    let mut parts = Vec::new();
    for part in first.content.map(|c| c.parts).unwrap_or_default() {
        if let Some(inline) = part.inline_data {
            let data = BASE64
                .decode(inline.data.as_bytes())
                .context("Gemini inline data base64 decode failed")?;
            parts.push(ContentPart::InlineData {
                mime_type: inline.mime_type,
                data,
            });
        } else if let Some(text) = part.text {
            parts.push(ContentPart::Text(text));
        }
    }

    Ok(ProviderResponse {
        parts,
        finish_reason: first.finish_reason,
    })
}

#[async_trait]
impl ProviderClient for GeminiProvider {
    async fn generate_structured_text(&self, request: &StructuredTextRequest) -> Result<String> {
        let body = build_text_request(request);
        let resp = self.post(&self.config.text_model, &body).await?;
        let content = into_provider_response(resp)?;

        let text: String = content
            .parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text(t) => Some(t.as_str()),
                ContentPart::InlineData { .. } => None,
            })
            .collect();

        // A blocked story is content, not a transport fault. The caller rejects it.
        if text.trim().is_empty() {
            let reason = content.finish_reason.as_deref().unwrap_or("UNKNOWN");
            warn!("Gemini returned no story text. Finish reason: {}", reason);
        }
        Ok(text)
    }

    async fn generate_image(&self, request: &ImageRequest<'_>) -> Result<ProviderResponse> {
        let body = build_image_request(request);
        let resp = self.post(&self.config.image_model, &body).await?;
        into_provider_response(resp)
    }

    async fn generate_audio(&self, request: &AudioRequest) -> Result<ProviderResponse> {
        let body = build_audio_request(request);
        let resp = self.post(&self.config.audio_model, &body).await?;
        into_provider_response(resp)
    }
}
