use crate::core::error::{Result, Stage, StoryError};
use crate::core::story::{GenerationPlan, Scene, StoryRequest};
use crate::services::provider::{ProviderClient, StructuredTextRequest};
use log::{debug, info};
use serde::Deserialize;
use std::sync::Arc;

const SYSTEM_PROMPT: &str =
    "You are a children's book author. Write warm, age-appropriate stories and return only valid JSON.";

#[derive(Deserialize)]
struct StoryScript {
    scenes: Vec<String>,
}

pub struct TextStageClient {
    provider: Arc<dyn ProviderClient>,
    language: String,
}

impl TextStageClient {
    pub fn new(provider: Arc<dyn ProviderClient>, language: impl Into<String>) -> Self {
        Self {
            provider,
            language: language.into(),
        }
    }

    pub fn output_schema() -> serde_json::Value {
        serde_json::json!({
            "type": "OBJECT",
            "properties": {
                "scenes": {
                    "type": "ARRAY",
                    "items": { "type": "STRING" }
                }
            },
            "required": ["scenes"]
        })
    }

    pub fn build_prompt(&self, request: &StoryRequest, plan: &GenerationPlan) -> String {
        format!(
            "Write a bedtime story for a child named {name}.\n\
             - {name} is the hero of the story and appears as a {character}.\n\
             - The story takes place in {setting}.\n\
             - A special object plays an important part: {object}.\n\
             - Split the story into exactly {scenes} scenes, one paragraph each.\n\
             - The whole story should be about {words} words long.\n\
             - Write the story in {language}.\n\
             Return a JSON object: {{ \"scenes\": [\"...\", \"...\"] }} with exactly {scenes} strings.",
            name = request.subject_name.trim(),
            character = request.character.trim(),
            setting = request.setting.trim(),
            object = request.special_object.trim(),
            scenes = plan.scene_count,
            words = plan.target_word_count,
            language = self.language,
        )
    }

    /// Writes the story. The scene count must match the plan exactly.
    pub async fn generate(
        &self,
        request: &StoryRequest,
        plan: &GenerationPlan,
    ) -> Result<Vec<Scene>> {
        let provider_request = StructuredTextRequest {
            system: SYSTEM_PROMPT.to_string(),
            prompt: self.build_prompt(request, plan),
            schema: Self::output_schema(),
        };

        info!(
            "Requesting story text ({} scenes, ~{} words)",
            plan.scene_count, plan.target_word_count
        );
        let raw = self
            .provider
            .generate_structured_text(&provider_request)
            .await
            .map_err(|e| StoryError::provider(Stage::Text, e))?;
        debug!("Story text response: {} chars", raw.len());

        parse_scenes(&raw, plan.scene_count)
    }
}

pub fn parse_scenes(raw: &str, expected: usize) -> Result<Vec<Scene>> {
    if raw.trim().is_empty() {
        return Err(StoryError::TextGeneration(
            "the provider returned no story text".to_string(),
        ));
    }
    let clean_json = strip_code_blocks(raw);
    let script: StoryScript = serde_json::from_str(&clean_json).map_err(|e| {
        StoryError::TextGeneration(format!("the story response was not valid JSON ({})", e))
    })?;

    if script.scenes.len() != expected {
        return Err(StoryError::TextGeneration(format!(
            "expected {} scenes but the story has {}",
            expected,
            script.scenes.len()
        )));
    }

    Ok(script
        .scenes
        .into_iter()
        .enumerate()
        .map(|(i, text)| Scene {
            index: i + 1,
            text: text.trim().to_string(),
        })
        .collect())
}

pub fn strip_code_blocks(s: &str) -> String {
    let s = s.trim();
    if s.starts_with("```json") {
        s.trim_start_matches("```json").trim_end_matches("```").trim().to_string()
    } else if s.starts_with("```") {
        s.trim_start_matches("```").trim_end_matches("```").trim().to_string()
    } else {
        s.to_string()
    }
}
