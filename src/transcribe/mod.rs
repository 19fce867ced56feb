use async_trait::async_trait;
use futures_util::future::join_all;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::pipeline::{CallGate, Enricher};
use crate::store::{self, Record};
use crate::utils::format_file_size;
use crate::{EnrichError, Result};

pub mod deepgram;
pub mod splitter;

pub use deepgram::DeepgramClient;
pub use splitter::FfmpegSplitter;

/// Record field naming the downloaded audio file
pub const AUDIO_FIELD: &str = "mp3_file";

/// Record field receiving the transcript
pub const TRANSCRIPT_FIELD: &str = "mp3_content";

/// Record field used as the video's label
pub const VIDEO_LABEL_FIELD: &str = "name_video";

/// Largest upload accepted in one request
pub const DEFAULT_SIZE_THRESHOLD: u64 = 24 * 1024 * 1024;

/// Result returned by a speech-to-text backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transcript {
    /// Undiarized text
    Plain(String),
    /// Per-speaker utterances in spoken order
    Diarized(Vec<Utterance>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub speaker: u32,
    pub text: String,
}

impl Transcript {
    /// Text stored in the record; diarized output gets one `Speaker N: ...` line per utterance
    pub fn render(&self) -> String {
        match self {
            Transcript::Plain(text) => text.clone(),
            Transcript::Diarized(utterances) => utterances
                .iter()
                .map(|u| format!("Speaker {}: {}\n", u.speaker, u.text))
                .collect(),
        }
    }
}

/// Supported audio formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    M4a,
    Wav,
    Flac,
    Ogg,
    Webm,
}

impl AudioFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_lowercase().as_str() {
            "mp3" => Some(AudioFormat::Mp3),
            "m4a" | "aac" => Some(AudioFormat::M4a),
            "wav" => Some(AudioFormat::Wav),
            "flac" => Some(AudioFormat::Flac),
            "ogg" => Some(AudioFormat::Ogg),
            "webm" => Some(AudioFormat::Webm),
            _ => None,
        }
    }

    /// Get MIME type for the format
    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::M4a => "audio/mp4",
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Flac => "audio/flac",
            AudioFormat::Ogg => "audio/ogg",
            AudioFormat::Webm => "audio/webm",
        }
    }
}

/// Near-equal-duration cut of an oversized audio file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentPlan {
    pub total: Duration,
    pub segment: Duration,
    pub count: usize,
}

impl SegmentPlan {
    /// Segments sized so each stays under `threshold_bytes` at the file's average bitrate.
    ///
    /// `segment = floor(total_ms * threshold / total_bytes)` ms and
    /// `count = ceil(total_ms / segment)`.
    pub fn for_file(total: Duration, total_bytes: u64, threshold_bytes: u64) -> Self {
        let total_ms = total.as_millis() as u64;
        let segment_ms = match total_bytes {
            0 => total_ms,
            bytes => (total_ms as u128 * threshold_bytes as u128 / bytes as u128) as u64,
        };
        let segment_ms = segment_ms.max(1);
        let count = total_ms.div_ceil(segment_ms).max(1) as usize;

        Self {
            total: Duration::from_millis(total_ms),
            segment: Duration::from_millis(segment_ms),
            count,
        }
    }

    /// Start offset and length of segment `index`; the last one takes the remainder
    pub fn bounds(&self, index: usize) -> (Duration, Duration) {
        let start = self.segment * index as u32;
        let length = self.total.saturating_sub(start).min(self.segment);
        (start, length)
    }
}

/// Speech-to-text service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<Transcript>;
}

/// Local audio inspection and cutting
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioSplitter: Send + Sync {
    /// Playing time of the file
    async fn duration(&self, path: &Path) -> Result<Duration>;

    /// Write the planned segments into `out_dir`, returned in chronological order
    async fn split(&self, path: &Path, plan: &SegmentPlan, out_dir: &Path) -> Result<Vec<PathBuf>>;
}

/// Fills `mp3_content` from the audio file named by `mp3_file`
pub struct TranscriptionEnricher {
    backend: Arc<dyn SpeechBackend>,
    splitter: Arc<dyn AudioSplitter>,
    gate: Arc<CallGate>,
    audio_dir: PathBuf,
    temp_dir: Option<PathBuf>,
    size_threshold: u64,
}

impl TranscriptionEnricher {
    pub fn new(
        backend: Arc<dyn SpeechBackend>,
        splitter: Arc<dyn AudioSplitter>,
        gate: Arc<CallGate>,
        audio_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            backend,
            splitter,
            gate,
            audio_dir: audio_dir.into(),
            temp_dir: None,
            size_threshold: DEFAULT_SIZE_THRESHOLD,
        }
    }

    pub fn with_size_threshold(mut self, bytes: u64) -> Self {
        self.size_threshold = bytes.max(1);
        self
    }

    /// Parent directory for segment scratch space (system temp dir otherwise)
    pub fn with_temp_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.temp_dir = dir;
        self
    }

    /// Local path of a record's audio: the file name of `mp3_file` inside the audio directory
    pub fn resolve_audio_path(&self, mp3_file: &str) -> PathBuf {
        let path = Path::new(mp3_file);
        match path.file_name() {
            Some(name) => self.audio_dir.join(name),
            None => self.audio_dir.join(path),
        }
    }

    /// Transcribe one audio file, splitting it when it exceeds the upload limit
    pub async fn transcribe_file(&self, path: &Path) -> Result<String> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => return Err(EnrichError::NotFound(path.to_path_buf())),
        };
        let mime_type = AudioFormat::from_path(path)
            .unwrap_or(AudioFormat::Mp3)
            .mime_type();

        tracing::debug!("Starting transcription of {}", path.display());
        let text = if metadata.len() <= self.size_threshold {
            let audio = tokio::fs::read(path).await?;
            self.transcribe_buffer(&path.display().to_string(), &audio, mime_type)
                .await?
        } else {
            self.transcribe_segments(path, metadata.len(), mime_type)
                .await?
        };

        if text.trim().is_empty() {
            return Err(EnrichError::EmptyResult(format!(
                "Transcription of {}",
                path.display()
            )));
        }
        Ok(text)
    }

    async fn transcribe_buffer(&self, label: &str, audio: &[u8], mime_type: &str) -> Result<String> {
        let backend = &self.backend;
        let transcript = self
            .gate
            .call(label, || backend.transcribe(audio, mime_type))
            .await?;
        Ok(transcript.render())
    }

    async fn transcribe_segments(&self, path: &Path, total_bytes: u64, mime_type: &str) -> Result<String> {
        let total = self.splitter.duration(path).await?;
        let plan = SegmentPlan::for_file(total, total_bytes, self.size_threshold);
        tracing::info!(
            "{} is {}, splitting into {} segments of {:.1}s",
            path.display(),
            format_file_size(total_bytes),
            plan.count,
            plan.segment.as_secs_f64()
        );

        // Removed on drop, including every early return below
        let mut builder = tempfile::Builder::new();
        builder.prefix("chunks-");
        let workspace = match &self.temp_dir {
            Some(root) => {
                fs_err::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };

        let segments = self.splitter.split(path, &plan, workspace.path()).await?;
        let count = segments.len();
        let calls = segments.iter().enumerate().map(|(index, segment)| async move {
            let audio = tokio::fs::read(segment).await?;
            let label = format!("{} [chunk {}/{}]", path.display(), index + 1, count);
            self.transcribe_buffer(&label, &audio, mime_type).await
        });

        let texts = join_all(calls)
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()?;
        Ok(texts.join(" "))
    }
}

#[async_trait]
impl Enricher for TranscriptionEnricher {
    fn name(&self) -> &'static str {
        "transcribe"
    }

    fn label_field(&self) -> &'static str {
        VIDEO_LABEL_FIELD
    }

    fn has_input(&self, record: &Record) -> bool {
        store::text_field(record, AUDIO_FIELD).is_some()
    }

    fn is_complete(&self, record: &Record) -> bool {
        store::text_field(record, TRANSCRIPT_FIELD).is_some()
    }

    async fn enrich(&self, record: &mut Record) -> Result<()> {
        let mp3_file = store::text_field(record, AUDIO_FIELD)
            .ok_or_else(|| EnrichError::MissingInput(AUDIO_FIELD.to_string()))?;
        let path = self.resolve_audio_path(&mp3_file);

        let transcript = self.transcribe_file(&path).await?;
        record.insert(TRANSCRIPT_FIELD.to_string(), Value::String(transcript));
        Ok(())
    }
}
