pub mod audio;
pub mod export;
pub mod image;
pub mod plan;
pub mod progress;
pub mod provider;
pub mod setup;
pub mod text;
pub mod workflow;
