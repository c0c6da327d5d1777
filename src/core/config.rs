use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const CONFIG_FILE: &str = "config.yml";
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_output")]
    pub output_folder: String,

    /// Language the story is written and narrated in.
    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default)]
    pub unattended: bool,

    pub provider: ProviderConfig,

    #[serde(default)]
    pub narration: NarrationConfig,

    #[serde(default)]
    pub story: StoryPreset,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_name")]
    pub name: String, // only "gemini" for now
    pub gemini: Option<GeminiConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
    #[serde(default = "default_text_model")]
    pub text_model: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    #[serde(default = "default_audio_model")]
    pub audio_model: String,
    #[serde(default = "default_retry_count")]
    pub retry_count: usize,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_gemini_base_url(),
            text_model: default_text_model(),
            image_model: default_image_model(),
            audio_model: default_audio_model(),
            retry_count: default_retry_count(),
            retry_delay_seconds: default_retry_delay(),
        }
    }
}

impl GeminiConfig {
    /// The configured key, or `GEMINI_API_KEY` when the config leaves it blank.
    pub fn resolve_api_key(&self) -> Option<String> {
        if !self.api_key.trim().is_empty() {
            return Some(self.api_key.trim().to_string());
        }
        std::env::var(API_KEY_ENV)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NarrationConfig {
    #[serde(default = "default_voice")]
    pub voice: String,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            voice: default_voice(),
        }
    }
}

/// Story fields that can be pre-filled instead of prompted for.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StoryPreset {
    pub subject_name: Option<String>,
    pub character: Option<String>,
    pub setting: Option<String>,
    pub special_object: Option<String>,
    pub length: Option<String>,
    pub photo: Option<String>,
}

fn default_output() -> String {
    "output".to_string()
}
fn default_language() -> String {
    "English".to_string()
}
fn default_provider_name() -> String {
    "gemini".to_string()
}
fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_text_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_image_model() -> String {
    "gemini-2.5-flash-image".to_string()
}
fn default_audio_model() -> String {
    "gemini-2.5-flash-preview-tts".to_string()
}
fn default_retry_count() -> usize {
    3
}
fn default_retry_delay() -> u64 {
    10
}
fn default_voice() -> String {
    "Kore".to_string()
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("{} not found. Please create one.", path.display());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml_ng::from_str(content)?)
    }

    pub fn save(&self) -> Result<()> {
        let content = serde_yaml_ng::to_string(self)?;
        fs::write(CONFIG_FILE, content).context("Failed to write config.yml")?;
        Ok(())
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.output_folder)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let cfg = Config::from_yaml("provider:\n  gemini:\n    api_key: abc\n").unwrap();
        assert_eq!(cfg.output_folder, "output");
        assert_eq!(cfg.language, "English");
        assert!(!cfg.unattended);
        assert_eq!(cfg.provider.name, "gemini");
        assert_eq!(cfg.narration.voice, "Kore");

        let gemini = cfg.provider.gemini.unwrap();
        assert_eq!(gemini.api_key, "abc");
        assert_eq!(gemini.retry_count, 3);
        assert_eq!(gemini.retry_delay_seconds, 10);
        assert!(gemini.base_url.starts_with("https://generativelanguage"));
        assert!(cfg.story.subject_name.is_none());
    }

    #[test]
    fn test_story_preset_and_overrides() {
        let yaml = r#"
output_folder: books
language: Deutsch
unattended: true
provider:
  name: gemini
  gemini:
    api_key: key
    retry_count: 0
narration:
  voice: Puck
story:
  subject_name: Mia
  character: astronaut
  setting: the moon
  special_object: a red balloon
  length: long
  photo: mia.jpg
"#;
        let cfg = Config::from_yaml(yaml).unwrap();
        assert_eq!(cfg.output_folder, "books");
        assert!(cfg.unattended);
        assert_eq!(cfg.narration.voice, "Puck");
        assert_eq!(cfg.provider.gemini.unwrap().retry_count, 0);
        assert_eq!(cfg.story.subject_name.as_deref(), Some("Mia"));
        assert_eq!(cfg.story.photo.as_deref(), Some("mia.jpg"));
    }

    #[test]
    fn test_missing_provider_section_fails() {
        assert!(Config::from_yaml("output_folder: out\n").is_err());
    }

    #[test]
    fn test_load_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from(&dir.path().join("config.yml")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_configured_api_key_wins() {
        let cfg = GeminiConfig {
            api_key: "  from-config ".to_string(),
            ..Default::default()
        };
        assert_eq!(cfg.resolve_api_key().as_deref(), Some("from-config"));
    }
}
