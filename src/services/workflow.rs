use crate::core::config::Config;
use crate::core::error::{Result, StoryError};
use crate::core::story::{ProgressEvent, ReferenceImage, SceneImage, StoryRequest, StoryResult};
use crate::services::audio::AudioStageClient;
use crate::services::image::ImageStageClient;
use crate::services::plan;
use crate::services::progress::ProgressReporter;
use crate::services::provider::ProviderClient;
use crate::services::text::TextStageClient;
use log::{error, info};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Planning,
    TextGenerating,
    /// 1-based scene being illustrated.
    ImageGenerating { scene: usize },
    AudioGenerating,
    Done,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Planning => f.write_str("planning"),
            PipelineState::TextGenerating => f.write_str("writing the story"),
            PipelineState::ImageGenerating { scene } => write!(f, "illustrating scene {}", scene),
            PipelineState::AudioGenerating => f.write_str("recording the narration"),
            PipelineState::Done => f.write_str("done"),
            PipelineState::Failed => f.write_str("failed"),
        }
    }
}

/// Runs the plan, text, image and audio stages strictly in order.
/// Every call to `run` is a fresh run; nothing carries over between runs.
pub struct StoryPipeline {
    text: TextStageClient,
    images: ImageStageClient,
    audio: AudioStageClient,
}

impl StoryPipeline {
    pub fn new(
        provider: Arc<dyn ProviderClient>,
        language: impl Into<String>,
        voice: impl Into<String>,
    ) -> Self {
        Self {
            text: TextStageClient::new(provider.clone(), language),
            images: ImageStageClient::new(provider.clone()),
            audio: AudioStageClient::new(provider, voice),
        }
    }

    pub fn from_config(config: &Config, provider: Arc<dyn ProviderClient>) -> Self {
        Self::new(provider, config.language.clone(), config.narration.voice.clone())
    }

    /// Produces the complete story or the error of the first stage that
    /// failed. No partial result is ever returned.
    pub async fn run<F>(
        &self,
        request: &StoryRequest,
        reference: &ReferenceImage,
        on_progress: F,
    ) -> Result<StoryResult>
    where
        F: FnMut(&ProgressEvent) + Send,
    {
        let mut state = PipelineState::Planning;
        match self.execute(&mut state, request, reference, on_progress).await {
            Ok(result) => {
                transition(&mut state, PipelineState::Done);
                Ok(result)
            }
            Err(e) => {
                error!("Story generation failed while {}: {}", state, e);
                transition(&mut state, PipelineState::Failed);
                Err(e)
            }
        }
    }

    async fn execute<F>(
        &self,
        state: &mut PipelineState,
        request: &StoryRequest,
        reference: &ReferenceImage,
        on_progress: F,
    ) -> Result<StoryResult>
    where
        F: FnMut(&ProgressEvent) + Send,
    {
        request.validate()?;

        let plan = plan::resolve(&request.length);
        info!(
            "Planned {} scenes, ~{} words for {}",
            plan.scene_count, plan.target_word_count, request.subject_name
        );
        let mut progress = ProgressReporter::new(plan.total_steps(), on_progress);
        progress.report("Preparing your story...");

        transition(state, PipelineState::TextGenerating);
        progress.report("Writing the story...");
        let scenes = self.text.generate(request, &plan).await?;
        progress.advance("The story is written");

        let mut images: Vec<SceneImage> = Vec::with_capacity(scenes.len());
        for scene in &scenes {
            transition(state, PipelineState::ImageGenerating { scene: scene.index });
            progress.report(format!(
                "Illustrating scene {} of {}...",
                scene.index, plan.scene_count
            ));
            let image = self
                .images
                .generate_one(scene, reference, &request.character)
                .await?;
            images.push(image);
            progress.advance(format!("Scene {} illustrated", scene.index));
        }

        if images.len() != plan.scene_count || scenes.len() != plan.scene_count {
            return Err(StoryError::SceneImageCountMismatch {
                scenes: plan.scene_count,
                images: images.len(),
            });
        }

        transition(state, PipelineState::AudioGenerating);
        progress.report("Recording the narration...");
        let full_text = StoryResult::join_scenes(&scenes);
        let audio = self.audio.narrate(&full_text).await?;
        progress.advance(if audio.is_some() {
            "Your story is ready!"
        } else {
            "Your story is ready (without narration)"
        });

        Ok(StoryResult {
            full_text,
            scenes,
            images,
            audio,
        })
    }
}

fn transition(state: &mut PipelineState, next: PipelineState) {
    info!("Pipeline: {} -> {}", state, next);
    *state = next;
}
