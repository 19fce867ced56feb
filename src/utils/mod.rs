use anyhow::Result;
use std::time::Duration;
use url::Url;

/// Parse a service endpoint, accepting only http(s)
pub fn validate_endpoint(endpoint: &str) -> Result<Url> {
    let url = Url::parse(endpoint).map_err(|e| anyhow::anyhow!("Invalid URL {}: {}", endpoint, e))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => anyhow::bail!("Unsupported scheme `{}` in {}, expected http or https", other, endpoint),
    }
}

/// Human-readable byte count ("512 B", "24.0 MB")
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    match unit {
        0 => format!("{} B", bytes),
        _ => format!("{:.1} {}", size, UNITS[unit]),
    }
}

/// Elapsed time as "1h 2m 3s", dropping leading zero units
pub fn format_duration(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, secs % 3600 / 60, secs % 60);

    match (hours, minutes) {
        (0, 0) => format!("{}s", seconds),
        (0, _) => format!("{}m {}s", minutes, seconds),
        _ => format!("{}h {}m {}s", hours, minutes, seconds),
    }
}

/// File stem derived from a video title: unsafe characters and spaces become `_`
pub fn audio_file_stem(title: &str) -> String {
    title
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect()
}

/// First `max_chars` characters of `text`
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((offset, _)) => &text[..offset],
        None => text,
    }
}

/// External tools a command shells out to
pub fn required_tools(command: &str) -> &'static [&'static str] {
    match command {
        "transcribe" => &["ffmpeg", "ffprobe"],
        "download" => &["yt-dlp"],
        _ => &[],
    }
}

/// Names of the given tools that are not runnable from PATH
pub async fn check_dependencies(tools: &[&str]) -> Vec<String> {
    let mut missing = Vec::new();
    for tool in tools {
        if !is_runnable(tool).await {
            missing.push(tool.to_string());
        }
    }
    missing
}

async fn is_runnable(tool: &str) -> bool {
    // ffmpeg and ffprobe only understand the single-dash form
    let flag = if tool.starts_with("ff") { "-version" } else { "--version" };
    tokio::process::Command::new(tool)
        .arg(flag)
        .output()
        .await
        .is_ok_and(|output| output.status.success())
}
