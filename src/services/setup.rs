use crate::core::config::Config;
use crate::core::io::Storage;
use crate::core::story::{LengthTier, ReferenceImage, StoryRequest};
use anyhow::{anyhow, Context, Result};
use inquire::{Confirm, Select, Text};
use std::path::Path;

pub fn media_type_for(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "image/jpeg",
    }
}

/// Builds the story request and loads the photo, taking values from the
/// `story` section of the config and asking for anything missing.
pub async fn collect_request(
    config: &mut Config,
    storage: &dyn Storage,
) -> Result<(StoryRequest, ReferenceImage)> {
    let unattended = config.unattended;
    let preset = &mut config.story;
    let mut needs_save = false;

    let subject_name = ask(&mut preset.subject_name, "Child's name:", unattended, &mut needs_save)?;
    let character = ask(
        &mut preset.character,
        "Who should they be in the story? (e.g. a brave knight)",
        unattended,
        &mut needs_save,
    )?;
    let setting = ask(
        &mut preset.setting,
        "Where does the story take place?",
        unattended,
        &mut needs_save,
    )?;
    let special_object = ask(
        &mut preset.special_object,
        "A special object in the story:",
        unattended,
        &mut needs_save,
    )?;
    let length = match preset.length.clone() {
        Some(length) => length,
        None if unattended => return Err(missing("length")),
        None => {
            let tier = select_length()?;
            preset.length = Some(tier.as_str().to_string());
            needs_save = true;
            tier.as_str().to_string()
        }
    };
    let photo = ask(
        &mut preset.photo,
        "Path to a photo of the child:",
        unattended,
        &mut needs_save,
    )?;
    if !storage.exists(&photo).await? {
        return Err(anyhow!("Photo not found: {}", photo));
    }

    if needs_save
        && Confirm::new("Save these answers to config.yml?")
            .with_default(false)
            .prompt()?
    {
        config.save()?;
        println!("Configuration saved.");
    }

    let data = storage
        .read(&photo)
        .await
        .with_context(|| format!("Could not load the photo {}", photo))?;
    let reference = ReferenceImage::new(media_type_for(&photo), data)?;

    let request = StoryRequest {
        subject_name,
        character,
        setting,
        special_object,
        length,
    };
    request.validate()?;
    Ok((request, reference))
}

fn ask(
    slot: &mut Option<String>,
    prompt: &str,
    unattended: bool,
    needs_save: &mut bool,
) -> Result<String> {
    if let Some(value) = slot.as_ref().filter(|v| !v.trim().is_empty()) {
        return Ok(value.trim().to_string());
    }
    if unattended {
        return Err(missing(prompt));
    }
    let value = Text::new(prompt).prompt()?.trim().to_string();
    *slot = Some(value.clone());
    *needs_save = true;
    Ok(value)
}

fn select_length() -> Result<LengthTier> {
    let options: Vec<String> = LengthTier::ALL
        .iter()
        .map(|t| {
            let plan = t.plan();
            format!("{} ({} scenes, ~{} words)", t, plan.scene_count, plan.target_word_count)
        })
        .collect();
    let selection = Select::new("How long should the story be?", options).prompt()?;
    let name = selection.split_whitespace().next().unwrap_or_default();
    name.parse::<LengthTier>().map_err(|e| anyhow!(e))
}

fn missing(field: &str) -> anyhow::Error {
    anyhow!("Unattended mode: story field missing from config.yml ({})", field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::NativeStorage;

    fn config_with_photo(photo: &str) -> Config {
        let mut cfg =
            Config::from_yaml("unattended: true\nprovider:\n  gemini:\n    api_key: k\n")
                .unwrap();
        cfg.story.subject_name = Some(" Sam ".to_string());
        cfg.story.character = Some("astronaut".to_string());
        cfg.story.setting = Some("Mars".to_string());
        cfg.story.special_object = Some("a kite".to_string());
        cfg.story.length = Some("medium".to_string());
        cfg.story.photo = Some(photo.to_string());
        cfg
    }

    #[test]
    fn test_media_type_for() {
        assert_eq!(media_type_for("kid.PNG"), "image/png");
        assert_eq!(media_type_for("kid.webp"), "image/webp");
        assert_eq!(media_type_for("kid.jpeg"), "image/jpeg");
        assert_eq!(media_type_for("kid"), "image/jpeg");
    }

    #[tokio::test]
    async fn test_collect_from_preset() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let photo = temp_dir.path().join("sam.png");
        std::fs::write(&photo, [0x89, b'P', b'N', b'G'])?;

        let mut cfg = config_with_photo(photo.to_str().unwrap());
        let (request, reference) = collect_request(&mut cfg, &NativeStorage::new()).await?;

        assert_eq!(request.subject_name, "Sam");
        assert_eq!(request.length, "medium");
        assert_eq!(reference.mime_type, "image/png");
        assert_eq!(reference.data.len(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_unattended_missing_field_fails() {
        let mut cfg = config_with_photo("unused.jpg");
        cfg.story.setting = None;
        let err = collect_request(&mut cfg, &NativeStorage::new()).await.unwrap_err();
        assert!(err.to_string().contains("Unattended mode"));
    }

    #[tokio::test]
    async fn test_missing_photo_file_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        let photo = temp_dir.path().join("missing.jpg");
        let mut cfg = config_with_photo(photo.to_str().unwrap());
        let err = collect_request(&mut cfg, &NativeStorage::new()).await.unwrap_err();
        assert_eq!(err.to_string(), format!("Photo not found: {}", photo.display()));
    }
}
