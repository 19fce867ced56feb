use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::pipeline::{CallGate, Enricher};
use crate::store::{self, Record};
use crate::utils::audio_file_stem;
use crate::{EnrichError, Result};

pub mod youtube;

pub use youtube::YtDlpDownloader;

/// Record field with the video's watch URL
pub const SOURCE_FIELD: &str = "youtube_url";

/// Record field receiving the local audio path
pub const AUDIO_FIELD: &str = "mp3_file";

const NAME_FIELD: &str = "name_video";
const FALLBACK_PREFIX: &str = "untitled_video";

/// Fetches the audio track of a video into a local file
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioDownloader: Send + Sync {
    async fn download(&self, url: &str, output_path: &Path) -> Result<()>;
}

/// Fills `mp3_file` by downloading the audio of `youtube_url` into the audio directory
pub struct DownloadEnricher {
    downloader: Arc<dyn AudioDownloader>,
    gate: Arc<CallGate>,
    audio_dir: PathBuf,
    /// Targets handed out during this run
    claimed: Mutex<HashSet<PathBuf>>,
}

impl DownloadEnricher {
    pub fn new(downloader: Arc<dyn AudioDownloader>, gate: Arc<CallGate>, audio_dir: impl Into<PathBuf>) -> Self {
        Self {
            downloader,
            gate,
            audio_dir: audio_dir.into(),
            claimed: Mutex::new(HashSet::new()),
        }
    }

    /// Preferred file for a record: its sanitized video name with spaces as underscores.
    /// Unnamed records get a unique name.
    pub fn target_path(&self, record: &Record) -> PathBuf {
        let name = store::text_field(record, NAME_FIELD)
            .map(|name| audio_file_stem(&name))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| format!("{}_{}", FALLBACK_PREFIX, uuid::Uuid::new_v4().simple()));
        self.audio_dir.join(format!("{}.mp3", name))
    }

    /// Reserve a target no other record of this run uses and no file occupies yet.
    ///
    /// Records sharing a title get `_2`, `_3`, ... suffixes.
    pub fn claim_target(&self, record: &Record) -> PathBuf {
        let preferred = self.target_path(record);
        let stem = preferred
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut claimed = self.claimed.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut candidate = preferred;
        let mut suffix = 1;
        while claimed.contains(&candidate) || candidate.exists() {
            suffix += 1;
            candidate = self.audio_dir.join(format!("{}_{}.mp3", stem, suffix));
        }
        claimed.insert(candidate.clone());
        candidate
    }
}

#[async_trait]
impl Enricher for DownloadEnricher {
    fn name(&self) -> &'static str {
        "download"
    }

    fn label_field(&self) -> &'static str {
        NAME_FIELD
    }

    fn has_input(&self, record: &Record) -> bool {
        store::text_field(record, SOURCE_FIELD).is_some()
    }

    fn is_complete(&self, record: &Record) -> bool {
        store::text_field(record, AUDIO_FIELD).is_some()
    }

    async fn enrich(&self, record: &mut Record) -> Result<()> {
        let url = store::text_field(record, SOURCE_FIELD)
            .ok_or_else(|| EnrichError::MissingInput(SOURCE_FIELD.to_string()))?;
        fs_err::create_dir_all(&self.audio_dir)?;
        let target = self.claim_target(record);

        let downloader = &self.downloader;
        self.gate
            .call(&url, || downloader.download(&url, &target))
            .await?;

        if !target.exists() {
            return Err(EnrichError::NotFound(target));
        }
        tracing::debug!("Downloaded {} to {}", url, target.display());
        record.insert(
            AUDIO_FIELD.to_string(),
            Value::String(target.to_string_lossy().into_owned()),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::RetryPolicy;
    use serde_json::json;
    use std::time::Duration;

    fn gate() -> Arc<CallGate> {
        Arc::new(CallGate::new(2, RetryPolicy::new(2, Duration::from_millis(1), None)))
    }

    #[test]
    fn test_target_path() {
        let enricher = DownloadEnricher::new(Arc::new(MockAudioDownloader::new()), gate(), "downloaded");
        let named = json!({"name_video": "How to Start a Startup?"}).as_object().cloned().unwrap();
        let unnamed = json!({"youtube_url": "x"}).as_object().cloned().unwrap();

        assert_eq!(
            enricher.target_path(&named),
            PathBuf::from("downloaded/How_to_Start_a_Startup_.mp3")
        );
        let first = enricher.target_path(&unnamed);
        let second = enricher.target_path(&unnamed);
        assert!(first.starts_with("downloaded"));
        assert!(first.file_name().unwrap().to_string_lossy().starts_with("untitled_video_"));
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_download_sets_audio_field() {
        let dir = tempfile::tempdir().unwrap();
        let mut downloader = MockAudioDownloader::new();
        downloader
            .expect_download()
            .times(1)
            .withf(|url, _| url == "https://youtube.com/watch?v=abc")
            .returning(|_, path| {
                fs_err::write(path, b"mp3")?;
                Ok(())
            });

        let enricher = DownloadEnricher::new(Arc::new(downloader), gate(), dir.path().join("downloaded"));
        let mut record = json!({"name_video": "Demo", "youtube_url": "https://youtube.com/watch?v=abc"})
            .as_object()
            .cloned()
            .unwrap();
        enricher.enrich(&mut record).await.unwrap();

        let expected = dir.path().join("downloaded").join("Demo.mp3");
        assert_eq!(record["mp3_file"], json!(expected.to_string_lossy()));
        assert!(enricher.is_complete(&record));
    }

    #[tokio::test]
    async fn test_same_title_gets_distinct_files() {
        use crate::pipeline::checkpoint::MockCheckpointSink;
        use crate::pipeline::BatchScheduler;

        let dir = tempfile::tempdir().unwrap();
        let mut downloader = MockAudioDownloader::new();
        downloader.expect_download().times(2).returning(|url, path| {
            fs_err::write(path, url)?;
            Ok(())
        });
        let mut sink = MockCheckpointSink::new();
        sink.expect_write().times(1).returning(|_| Ok(()));

        let enricher = DownloadEnricher::new(Arc::new(downloader), gate(), dir.path().join("downloaded"));
        let mut records: Vec<Record> = ["AAA", "BBB"]
            .iter()
            .map(|id| {
                json!({"name_video": "Office Hours", "youtube_url": format!("https://youtube.com/watch?v={}", id)})
                    .as_object()
                    .cloned()
                    .unwrap()
            })
            .collect();

        let summary = BatchScheduler::new(10).run(&mut records, &enricher, &sink).await;
        assert_eq!(summary.succeeded, 2);

        let first = PathBuf::from(records[0]["mp3_file"].as_str().unwrap());
        let second = PathBuf::from(records[1]["mp3_file"].as_str().unwrap());
        assert_ne!(first, second);
        assert_eq!(fs_err::read_to_string(&first).unwrap(), "https://youtube.com/watch?v=AAA");
        assert_eq!(fs_err::read_to_string(&second).unwrap(), "https://youtube.com/watch?v=BBB");
    }

    #[test]
    fn test_claim_skips_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let audio_dir = dir.path().join("downloaded");
        fs_err::create_dir_all(&audio_dir).unwrap();
        fs_err::write(audio_dir.join("Demo.mp3"), b"older video").unwrap();

        let enricher = DownloadEnricher::new(Arc::new(MockAudioDownloader::new()), gate(), &audio_dir);
        let record = json!({"name_video": "Demo"}).as_object().cloned().unwrap();

        assert_eq!(enricher.claim_target(&record), audio_dir.join("Demo_2.mp3"));
        assert_eq!(enricher.claim_target(&record), audio_dir.join("Demo_3.mp3"));
    }
}
