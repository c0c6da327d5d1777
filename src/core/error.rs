//! Errors that end a story generation run.

use std::fmt;
use thiserror::Error;

/// The pipeline stage a provider call belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Text,
    Image,
    Audio,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Text => f.write_str("story text"),
            Stage::Image => f.write_str("illustration"),
            Stage::Audio => f.write_str("narration"),
        }
    }
}

#[derive(Error, Debug)]
pub enum StoryError {
    #[error("Invalid story request: {0}")]
    InvalidRequest(String),

    #[error("Story text generation failed: {0}")]
    TextGeneration(String),

    #[error("Could not create an illustration for scene {scene}: the request was rejected with and without the photo")]
    ImageGeneration { scene: usize },

    #[error("The illustration response for scene {scene} contained no image data")]
    ImagePayloadMissing { scene: usize },

    #[error("Expected {scenes} illustrations but {images} were produced")]
    SceneImageCountMismatch { scenes: usize, images: usize },

    #[error("The {stage} request failed: {cause:#}")]
    Provider { stage: Stage, cause: anyhow::Error },
}

impl StoryError {
    pub fn provider(stage: Stage, cause: anyhow::Error) -> Self {
        StoryError::Provider { stage, cause }
    }
}

pub type Result<T> = std::result::Result<T, StoryError>;
