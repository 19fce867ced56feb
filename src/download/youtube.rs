use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use super::AudioDownloader;
use crate::{EnrichError, Result};

/// YouTube audio downloader using yt-dlp
pub struct YtDlpDownloader {
    yt_dlp_path: String,
}

impl YtDlpDownloader {
    pub fn new() -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
        }
    }

    /// Watch URL for a YouTube embed link, other URLs unchanged
    pub fn watch_url(url: &str) -> String {
        match url.split_once("/embed/") {
            Some((_, rest)) => {
                let id = rest.split(['?', '/', '#']).next().unwrap_or(rest);
                format!("https://youtube.com/watch?v={}", id)
            }
            None => url.to_string(),
        }
    }
}

impl Default for YtDlpDownloader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioDownloader for YtDlpDownloader {
    async fn download(&self, url: &str, output_path: &Path) -> Result<()> {
        let url = Self::watch_url(url);
        tracing::debug!("Downloading audio for: {}", url);

        // yt-dlp appends the extension itself after conversion
        let template = output_path.with_extension("%(ext)s");
        let output = Command::new(&self.yt_dlp_path)
            .arg("--output")
            .arg(&template)
            .args([
                "--extract-audio",
                "--audio-format",
                "mp3",
                "--audio-quality",
                "9",
                "--format",
                "worstaudio[acodec^=mp4a]/worstaudio[ext=m4a]/worstaudio[ext=mp3]/worstaudio",
                "--no-playlist",
                "--concurrent-fragments",
                "4",
                "--newline",
            ])
            .arg(&url)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(EnrichError::ExternalService(format!(
                "yt-dlp failed to download {}: {}",
                url, error
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_url_from_embed() {
        assert_eq!(
            YtDlpDownloader::watch_url("https://www.youtube.com/embed/dQw4w9WgXcQ?rel=0"),
            "https://youtube.com/watch?v=dQw4w9WgXcQ"
        );
        assert_eq!(
            YtDlpDownloader::watch_url("https://youtu.be/dQw4w9WgXcQ"),
            "https://youtu.be/dQw4w9WgXcQ"
        );
    }
}
