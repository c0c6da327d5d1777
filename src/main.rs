use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use photo2storybook::core::config::Config;
use photo2storybook::core::io::NativeStorage;
use photo2storybook::core::story::ProgressEvent;
use photo2storybook::services::{export, provider, setup, workflow::StoryPipeline};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    // 1. Load Config
    let mut config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {:#}", e);
            eprintln!("Please ensure 'config.yml' exists with a provider section.");
            return Err(e);
        }
    };
    config.ensure_directories()?;

    let storage = NativeStorage::new();

    // 2. Story details + photo
    let (request, reference) = setup::collect_request(&mut config, &storage).await?;

    // 3. Provider
    let provider = provider::create_provider(&config)?;
    let pipeline = StoryPipeline::from_config(&config, provider);

    // 4. Generate
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
            .progress_chars("#>-"),
    );

    let bar = pb.clone();
    let result = pipeline
        .run(&request, &reference, move |event: &ProgressEvent| {
            bar.set_length(event.total_steps as u64);
            bar.set_position(event.completed_steps as u64);
            bar.set_message(event.message.clone());
        })
        .await;

    let story = match result {
        Ok(story) => {
            pb.finish_with_message("Story complete");
            story
        }
        Err(e) => {
            pb.abandon();
            eprintln!("{}", e);
            eprintln!("Nothing was saved. Run again to start a new story.");
            return Err(e.into());
        }
    };

    // 5. Export
    let written =
        export::save_story(&story, &request.subject_name, &config.output_folder, &storage).await?;
    for path in &written {
        println!("  {}", path);
    }
    if story.audio.is_none() {
        println!("Narration was not available for this story.");
    }
    println!("Done! {} scenes written.", story.scenes.len());
    Ok(())
}
