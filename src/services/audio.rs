use crate::core::error::{Result, Stage, StoryError};
use crate::core::story::AudioClip;
use crate::services::provider::{AudioRequest, ProviderClient};
use log::{info, warn};
use std::sync::Arc;

pub struct AudioStageClient {
    provider: Arc<dyn ProviderClient>,
    voice: String,
}

impl AudioStageClient {
    pub fn new(provider: Arc<dyn ProviderClient>, voice: impl Into<String>) -> Self {
        Self {
            provider,
            voice: voice.into(),
        }
    }

    pub fn build_prompt(full_text: &str) -> String {
        format!(
            "Read the following bedtime story aloud in a calm, warm and soothing voice, \
             at a gentle pace suitable for a child falling asleep:\n\n{}",
            full_text
        )
    }

    /// Narrates the whole story. `None` when the provider sent no audio.
    pub async fn narrate(&self, full_text: &str) -> Result<Option<AudioClip>> {
        info!("Requesting narration with voice {}", self.voice);
        let request = AudioRequest {
            prompt: Self::build_prompt(full_text),
            voice: self.voice.clone(),
        };
        let response = self
            .provider
            .generate_audio(&request)
            .await
            .map_err(|e| StoryError::provider(Stage::Audio, e))?;

        match response.first_inline() {
            Some((mime_type, data)) => Ok(Some(AudioClip {
                mime_type: mime_type.to_string(),
                data: data.to_vec(),
            })),
            None => {
                warn!(
                    "No narration audio returned (reason: {}); continuing without it",
                    response.finish_reason.as_deref().unwrap_or("unknown")
                );
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::provider::{
        ContentPart, ImageRequest, ProviderResponse, StructuredTextRequest,
    };
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedAudio {
        reply: ProviderResponse,
        voices: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ProviderClient for FixedAudio {
        async fn generate_structured_text(
            &self,
            _: &StructuredTextRequest,
        ) -> anyhow::Result<String> {
            unreachable!()
        }
        async fn generate_image(&self, _: &ImageRequest<'_>) -> anyhow::Result<ProviderResponse> {
            unreachable!()
        }
        async fn generate_audio(&self, request: &AudioRequest) -> anyhow::Result<ProviderResponse> {
            assert!(request.prompt.contains("The fox slept."));
            self.voices.lock().unwrap().push(request.voice.clone());
            Ok(self.reply.clone())
        }
    }

    #[tokio::test]
    async fn test_extracts_first_audio_part() {
        let provider = Arc::new(FixedAudio {
            reply: ProviderResponse {
                parts: vec![ContentPart::InlineData {
                    mime_type: "audio/L16;codec=pcm;rate=24000".to_string(),
                    data: vec![0, 1, 0, 1],
                }],
                finish_reason: None,
            },
            voices: Mutex::new(Vec::new()),
        });
        let client = AudioStageClient::new(provider.clone(), "Kore");

        let clip = client.narrate("The fox slept.").await.unwrap().unwrap();
        assert_eq!(clip.data, vec![0, 1, 0, 1]);
        assert!(clip.mime_type.starts_with("audio/L16"));
        assert_eq!(*provider.voices.lock().unwrap(), vec!["Kore".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_audio_is_not_an_error() {
        let provider = Arc::new(FixedAudio {
            reply: ProviderResponse::empty(Some("OTHER".to_string())),
            voices: Mutex::new(Vec::new()),
        });
        let client = AudioStageClient::new(provider, "Kore");
        assert!(client.narrate("The fox slept.").await.unwrap().is_none());
    }
}
