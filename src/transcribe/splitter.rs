use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

use super::{AudioSplitter, SegmentPlan};
use crate::{EnrichError, Result};

/// Audio probing and cutting through the `ffprobe`/`ffmpeg` binaries
pub struct FfmpegSplitter {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl FfmpegSplitter {
    pub fn new() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
        }
    }
}

impl Default for FfmpegSplitter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioSplitter for FfmpegSplitter {
    async fn duration(&self, path: &Path) -> Result<Duration> {
        let output = Command::new(&self.ffprobe_path)
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(path)
            .output()
            .await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(EnrichError::ExternalService(format!(
                "ffprobe failed on {}: {}",
                path.display(),
                error
            )));
        }

        let info: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| EnrichError::ExternalService(format!("Unreadable ffprobe output: {}", e)))?;

        info["format"]["duration"]
            .as_str()
            .and_then(|d| d.parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(Duration::from_secs_f64)
            .ok_or_else(|| {
                EnrichError::ExternalService(format!("No duration reported for {}", path.display()))
            })
    }

    async fn split(&self, path: &Path, plan: &SegmentPlan, out_dir: &Path) -> Result<Vec<PathBuf>> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("mp3");
        let mut segments = Vec::with_capacity(plan.count);

        for index in 0..plan.count {
            let (start, length) = plan.bounds(index);
            let target = out_dir.join(format!("chunk_{:03}.{}", index, extension));
            tracing::debug!(
                "Cutting segment {}/{} at {:.3}s for {:.3}s",
                index + 1,
                plan.count,
                start.as_secs_f64(),
                length.as_secs_f64()
            );

            let output = Command::new(&self.ffmpeg_path)
                .args(["-v", "error", "-ss"])
                .arg(format!("{:.3}", start.as_secs_f64()))
                .arg("-t")
                .arg(format!("{:.3}", length.as_secs_f64()))
                .arg("-i")
                .arg(path)
                .args(["-vn", "-acodec", "copy", "-y"])
                .arg(&target)
                .output()
                .await?;

            if !output.status.success() {
                let error = String::from_utf8_lossy(&output.stderr);
                return Err(EnrichError::ExternalService(format!(
                    "ffmpeg failed to cut segment {}: {}",
                    index, error
                )));
            }
            segments.push(target);
        }

        Ok(segments)
    }
}
