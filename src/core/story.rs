use crate::core::error::{Result, StoryError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Coarse story length picked by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LengthTier {
    Short,
    Medium,
    Long,
    ExtraLong,
}

impl LengthTier {
    pub const ALL: [LengthTier; 4] = [
        LengthTier::Short,
        LengthTier::Medium,
        LengthTier::Long,
        LengthTier::ExtraLong,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LengthTier::Short => "short",
            LengthTier::Medium => "medium",
            LengthTier::Long => "long",
            LengthTier::ExtraLong => "extra-long",
        }
    }
}

impl fmt::Display for LengthTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LengthTier {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "short" => Ok(LengthTier::Short),
            "medium" => Ok(LengthTier::Medium),
            "long" => Ok(LengthTier::Long),
            "extra-long" | "extralong" => Ok(LengthTier::ExtraLong),
            other => Err(format!("Unknown length tier: {}", other)),
        }
    }
}

/// What the user asked for. `length` is kept as submitted so that an
/// unrecognised selection can still be planned (it falls back to short).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryRequest {
    pub subject_name: String,
    pub character: String,
    pub setting: String,
    pub special_object: String,
    pub length: String,
}

impl StoryRequest {
    pub fn validate(&self) -> Result<()> {
        if self.subject_name.trim().is_empty() {
            return Err(StoryError::InvalidRequest(
                "the subject name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationPlan {
    pub scene_count: usize,
    pub target_word_count: usize,
}

impl GenerationPlan {
    /// Text stage + one unit per scene image + audio stage.
    pub fn total_steps(&self) -> usize {
        self.scene_count + 2
    }
}

/// The user's photo. Read-only for the whole run.
#[derive(Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl ReferenceImage {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Result<Self> {
        if data.is_empty() {
            return Err(StoryError::InvalidRequest(
                "the reference photo is empty".to_string(),
            ));
        }
        Ok(Self {
            mime_type: mime_type.into(),
            data,
        })
    }
}

impl fmt::Debug for ReferenceImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceImage")
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    /// 1-based position in the story.
    pub index: usize,
    pub text: String,
}

/// A generated illustration. Always declared as PNG.
#[derive(Clone, PartialEq, Eq)]
pub struct SceneImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl SceneImage {
    pub const MIME_TYPE: &'static str = "image/png";

    pub fn png(data: Vec<u8>) -> Self {
        Self {
            mime_type: Self::MIME_TYPE.to_string(),
            data,
        }
    }
}

impl fmt::Debug for SceneImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneImage")
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Narration as returned by the provider, usually raw PCM.
#[derive(Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl fmt::Debug for AudioClip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioClip")
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct StoryResult {
    pub full_text: String,
    pub scenes: Vec<Scene>,
    pub images: Vec<SceneImage>,
    pub audio: Option<AudioClip>,
}

impl StoryResult {
    pub fn join_scenes(scenes: &[Scene]) -> String {
        scenes
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Scene `i` paired with image `i`.
    pub fn illustrated_scenes(&self) -> impl Iterator<Item = (&Scene, &SceneImage)> {
        self.scenes.iter().zip(self.images.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub completed_steps: usize,
    pub total_steps: usize,
    pub message: String,
}
