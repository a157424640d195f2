//! List command implementation.

use crate::catalog::{SqliteCatalog, VideoCatalog};
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;

/// Run the list command.
pub async fn run_list(settings: Settings) -> Result<()> {
    let catalog = SqliteCatalog::new(&settings.database_path())?;

    match catalog.list_videos().await {
        Ok(videos) => {
            if videos.is_empty() {
                Output::info("No videos yet. Use 'spor add <transcript_file> --id <id> --teacher <id>' to add one.");
            } else {
                Output::header(&format!("Videos ({})", videos.len()));
                println!();

                for video in &videos {
                    Output::video_info(video);
                }

                let total_words: usize = videos.iter().map(|v| v.word_count()).sum();
                println!();
                Output::kv("Total videos", &videos.len().to_string());
                Output::kv("Total words", &total_words.to_string());
            }
        }
        Err(e) => {
            Output::error(&format!("Failed to list videos: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
