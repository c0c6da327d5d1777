use crate::core::error::{Result, Stage, StoryError};
use crate::core::story::{ReferenceImage, Scene, SceneImage};
use crate::services::provider::{ImageRequest, ProviderClient, ProviderResponse};
use log::{debug, info, warn};
use std::sync::Arc;

const STYLE_GUIDE: &str = "Style: a soft, colourful children's storybook illustration with \
    gentle lighting, kept consistent from scene to scene. \
    Do not include any text, letters, words or captions in the image.";

pub struct ImageStageClient {
    provider: Arc<dyn ProviderClient>,
}

impl ImageStageClient {
    pub fn new(provider: Arc<dyn ProviderClient>) -> Self {
        Self { provider }
    }

    pub fn conditioned_prompt(scene: &Scene, character: &str) -> String {
        format!(
            "Illustrate this scene from a children's story:\n\"{}\"\n\
             The main character is a {}. Use the attached photo only as inspiration for the \
             main character's look (face, hair, skin tone); do not reproduce the photo itself.\n{}",
            scene.text, character, STYLE_GUIDE
        )
    }

    pub fn unconditioned_prompt(scene: &Scene, character: &str) -> String {
        format!(
            "Illustrate this scene from a children's story:\n\"{}\"\n\
             The main character is a friendly child dressed as a {}.\n{}",
            scene.text, character, STYLE_GUIDE
        )
    }

    /// Illustrates one scene. Tries with the photo first; if the provider
    /// returns no content, tries once more without it.
    pub async fn generate_one(
        &self,
        scene: &Scene,
        reference: &ReferenceImage,
        character: &str,
    ) -> Result<SceneImage> {
        info!("Illustrating scene {}", scene.index);
        let conditioned = ImageRequest {
            prompt: Self::conditioned_prompt(scene, character),
            reference: Some(reference),
        };
        let response = self.request(&conditioned).await?;
        if response.has_content() {
            return extract_image(scene, &response);
        }

        warn!(
            "Scene {}: no image returned with the photo (reason: {}), retrying without it",
            scene.index,
            response.finish_reason.as_deref().unwrap_or("unknown")
        );
        let unconditioned = ImageRequest {
            prompt: Self::unconditioned_prompt(scene, character),
            reference: None,
        };
        let response = self.request(&unconditioned).await?;
        if response.has_content() {
            return extract_image(scene, &response);
        }

        Err(StoryError::ImageGeneration { scene: scene.index })
    }

    async fn request(&self, request: &ImageRequest<'_>) -> Result<ProviderResponse> {
        self.provider
            .generate_image(request)
            .await
            .map_err(|e| StoryError::provider(Stage::Image, e))
    }
}

fn extract_image(scene: &Scene, response: &ProviderResponse) -> Result<SceneImage> {
    match response.first_inline() {
        Some((mime_type, data)) => {
            debug!("Scene {}: {} bytes of {}", scene.index, data.len(), mime_type);
            Ok(SceneImage::png(data.to_vec()))
        }
        None => Err(StoryError::ImagePayloadMissing { scene: scene.index }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::provider::{AudioRequest, ContentPart, StructuredTextRequest};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted image responses and records whether each call
    /// carried the photo.
    struct ScriptedImages {
        replies: Mutex<VecDeque<ProviderResponse>>,
        with_photo: Mutex<Vec<bool>>,
    }

    impl ScriptedImages {
        fn new(replies: Vec<ProviderResponse>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                with_photo: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ProviderClient for ScriptedImages {
        async fn generate_structured_text(
            &self,
            _: &StructuredTextRequest,
        ) -> anyhow::Result<String> {
            unreachable!()
        }
        async fn generate_image(
            &self,
            request: &ImageRequest<'_>,
        ) -> anyhow::Result<ProviderResponse> {
            self.with_photo.lock().unwrap().push(request.reference.is_some());
            Ok(self.replies.lock().unwrap().pop_front().unwrap_or_default())
        }
        async fn generate_audio(&self, _: &AudioRequest) -> anyhow::Result<ProviderResponse> {
            unreachable!()
        }
    }

    fn png(bytes: &[u8]) -> ProviderResponse {
        ProviderResponse {
            parts: vec![ContentPart::InlineData {
                mime_type: "image/png".to_string(),
                data: bytes.to_vec(),
            }],
            finish_reason: Some("STOP".to_string()),
        }
    }

    fn scene() -> Scene {
        Scene { index: 3, text: "The owl found the lantern.".to_string() }
    }

    fn photo() -> ReferenceImage {
        ReferenceImage::new("image/jpeg", vec![9, 9, 9]).unwrap()
    }

    #[tokio::test]
    async fn test_conditioned_attempt_succeeds() {
        let provider = ScriptedImages::new(vec![png(&[1, 2, 3])]);
        let client = ImageStageClient::new(provider.clone());

        let image = client.generate_one(&scene(), &photo(), "owl").await.unwrap();
        assert_eq!(image.data, vec![1, 2, 3]);
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(*provider.with_photo.lock().unwrap(), vec![true]);
    }

    #[tokio::test]
    async fn test_falls_back_once_without_photo() {
        let provider = ScriptedImages::new(vec![
            ProviderResponse::empty(Some("IMAGE_SAFETY".to_string())),
            png(&[7]),
        ]);
        let client = ImageStageClient::new(provider.clone());

        let image = client.generate_one(&scene(), &photo(), "owl").await.unwrap();
        assert_eq!(image.data, vec![7]);
        assert_eq!(*provider.with_photo.lock().unwrap(), vec![true, false]);
    }

    #[tokio::test]
    async fn test_both_attempts_empty_is_terminal() {
        let provider = ScriptedImages::new(vec![
            ProviderResponse::empty(None),
            ProviderResponse::empty(None),
        ]);
        let client = ImageStageClient::new(provider.clone());

        let err = client.generate_one(&scene(), &photo(), "owl").await.unwrap_err();
        assert!(matches!(err, StoryError::ImageGeneration { scene: 3 }));
        assert_eq!(provider.with_photo.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_text_only_content_is_payload_missing() {
        let provider = ScriptedImages::new(vec![ProviderResponse {
            parts: vec![ContentPart::Text("Here is a description instead.".to_string())],
            finish_reason: Some("STOP".to_string()),
        }]);
        let client = ImageStageClient::new(provider.clone());

        let err = client.generate_one(&scene(), &photo(), "owl").await.unwrap_err();
        assert!(matches!(err, StoryError::ImagePayloadMissing { scene: 3 }));
        // Content was present, so no fallback.
        assert_eq!(provider.with_photo.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_prompts() {
        let conditioned = ImageStageClient::conditioned_prompt(&scene(), "wizard");
        assert!(conditioned.contains("The owl found the lantern."));
        assert!(conditioned.contains("attached photo"));
        assert!(conditioned.contains("Do not include any text"));

        let unconditioned = ImageStageClient::unconditioned_prompt(&scene(), "wizard");
        assert!(unconditioned.contains("wizard"));
        assert!(!unconditioned.contains("photo"));
    }
}
