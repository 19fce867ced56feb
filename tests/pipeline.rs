use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dataset_enricher::pipeline::{BatchScheduler, CallGate, JsonCheckpoint, RetryPolicy};
use dataset_enricher::transcribe::{AudioSplitter, SegmentPlan, SpeechBackend, Transcript, TranscriptionEnricher};
use dataset_enricher::{store, EnrichError, Record, Result};

/// Echoes the audio bytes back as text and fails on audio containing "broken"
struct EchoBackend {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl SpeechBackend for EchoBackend {
    async fn transcribe(&self, audio: &[u8], _mime_type: &str) -> Result<Transcript> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let text = String::from_utf8_lossy(audio).into_owned();
        if text.contains("broken") {
            return Err(EnrichError::ExternalService("HTTP 500: upstream failure".to_string()));
        }
        Ok(Transcript::Plain(text))
    }
}

/// Never used: every fixture file is below the size threshold
struct NoSplit;

#[async_trait]
impl AudioSplitter for NoSplit {
    async fn duration(&self, path: &Path) -> Result<Duration> {
        Err(EnrichError::ExternalService(format!("unexpected probe of {}", path.display())))
    }

    async fn split(&self, path: &Path, _plan: &SegmentPlan, _out_dir: &Path) -> Result<Vec<PathBuf>> {
        Err(EnrichError::ExternalService(format!("unexpected split of {}", path.display())))
    }
}

fn dataset(audio_dir: &Path) -> Vec<Record> {
    (0..12)
        .map(|i| {
            let value = match i {
                3 | 7 => json!({"name_video": format!("Video {}", i)}),
                _ => {
                    let file = format!("video_{}.mp3", i);
                    let content = if i == 10 { "broken".to_string() } else { format!("talk {}", i) };
                    fs_err::write(audio_dir.join(&file), content).unwrap();
                    json!({"name_video": format!("Video {}", i), "mp3_file": format!("downloaded/{}", file)})
                }
            };
            value.as_object().cloned().unwrap()
        })
        .collect()
}

#[tokio::test]
async fn test_transcription_run_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let audio_dir = dir.path().join("downloaded");
    fs_err::create_dir_all(&audio_dir).unwrap();
    let output = dir.path().join("video-data.json");
    let mut records = dataset(&audio_dir);

    let backend = Arc::new(EchoBackend {
        in_flight: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });
    let gate = Arc::new(CallGate::new(8, RetryPolicy::new(3, Duration::from_millis(1), None)));
    let enricher = TranscriptionEnricher::new(backend.clone(), Arc::new(NoSplit), gate, &audio_dir);
    let scheduler = BatchScheduler::new(10).with_progress(false);

    let summary = scheduler
        .run(&mut records, &enricher, &JsonCheckpoint::new(&output))
        .await;

    assert_eq!(summary.batches, 2);
    assert_eq!(summary.succeeded, 9);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped_missing_input, 2);
    assert_eq!(summary.checkpoints_written, 2);
    assert!(!summary.cancelled);
    assert!(backend.peak.load(Ordering::SeqCst) <= 8);

    let saved = tokio_test::assert_ok!(store::load(&output));
    assert_eq!(saved.len(), 12);
    let transcribed = saved.iter().filter(|r| r.contains_key("mp3_content")).count();
    assert_eq!(transcribed, 9);
    assert_eq!(saved[0]["mp3_content"], Value::String("talk 0".to_string()));
    assert!(!saved[10].contains_key("mp3_content"));
    assert!(!saved[3].contains_key("mp3_content"));

    // Original field order survives the rewrite
    let keys: Vec<&str> = saved[0].keys().map(String::as_str).collect();
    assert_eq!(keys, ["name_video", "mp3_file", "mp3_content"]);
}

#[tokio::test]
async fn test_resumed_run_only_touches_remaining_records() {
    let dir = tempfile::tempdir().unwrap();
    let audio_dir = dir.path().join("downloaded");
    fs_err::create_dir_all(&audio_dir).unwrap();
    let output = dir.path().join("video-data.json");
    let mut records = dataset(&audio_dir);
    records[0].insert("mp3_content".to_string(), json!("kept from an earlier run"));

    let backend = Arc::new(EchoBackend {
        in_flight: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });
    let gate = Arc::new(CallGate::new(2, RetryPolicy::new(1, Duration::from_millis(1), None)));
    let enricher = TranscriptionEnricher::new(backend, Arc::new(NoSplit), gate, &audio_dir);
    let scheduler = BatchScheduler::new(5).start_at(5).with_progress(false);

    let summary = scheduler
        .run(&mut records, &enricher, &JsonCheckpoint::new(&output))
        .await;

    // Records 5..12: 7 and its missing audio skipped, 10 fails
    assert_eq!(summary.batches, 2);
    assert_eq!(summary.succeeded, 5);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped_missing_input, 1);

    let saved = store::load(&output).unwrap();
    assert_eq!(saved[0]["mp3_content"], json!("kept from an earlier run"));
    assert!(!saved[1].contains_key("mp3_content"));
    assert_eq!(saved[11]["mp3_content"], json!("talk 11"));
}
