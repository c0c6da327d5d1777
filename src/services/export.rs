use crate::core::io::Storage;
use crate::core::story::StoryResult;
use crate::utils::audio::to_playable;
use anyhow::Result;
use log::info;
use std::path::Path;

/// Folder-safe version of the subject's name.
pub fn slug(name: &str) -> String {
    let mut out = String::new();
    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if !out.ends_with('_') && !out.is_empty() {
            out.push('_');
        }
    }
    let out = out.trim_end_matches('_').to_string();
    if out.is_empty() {
        "story".to_string()
    } else {
        out
    }
}

/// Writes the story text, one PNG per scene and the narration (if any)
/// under `{output_folder}/{slug}/`. Returns the written paths in order.
pub async fn save_story(
    story: &StoryResult,
    subject_name: &str,
    output_folder: &str,
    storage: &dyn Storage,
) -> Result<Vec<String>> {
    let story_dir = Path::new(output_folder).join(slug(subject_name));
    let mut written = Vec::new();

    let text_path = path_str(&story_dir, "story.txt");
    storage.write(&text_path, story.full_text.as_bytes()).await?;
    written.push(text_path);

    let scenes_path = path_str(&story_dir, "scenes.json");
    storage
        .write(&scenes_path, serde_json::to_string_pretty(&story.scenes)?.as_bytes())
        .await?;
    written.push(scenes_path);

    for (scene, image) in story.illustrated_scenes() {
        let image_path = path_str(&story_dir, &format!("scene_{:02}.png", scene.index));
        storage.write(&image_path, &image.data).await?;
        written.push(image_path);
    }

    if let Some(audio) = &story.audio {
        let (bytes, ext) = to_playable(&audio.mime_type, &audio.data)?;
        let audio_path = path_str(&story_dir, &format!("narration.{}", ext));
        storage.write(&audio_path, &bytes).await?;
        written.push(audio_path);
    }

    info!("Saved {} files to {}", written.len(), story_dir.display());
    Ok(written)
}

fn path_str(dir: &Path, file: &str) -> String {
    dir.join(file).to_string_lossy().to_string()
}
