use anyhow::{Context, Result};
use console::style;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::pipeline::RetryPolicy;
use crate::transcribe::DEFAULT_SIZE_THRESHOLD;
use crate::translate::DEFAULT_CHUNK_SIZE;
use crate::utils::validate_endpoint;
use crate::EnrichError;

const MAX_BACKOFF_MS: u64 = 60 * 60 * 1000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Speech-to-text service
    pub deepgram: DeepgramConfig,

    /// Translation service
    pub openai: OpenAiConfig,

    /// Batching, concurrency and retry settings
    pub pipeline: PipelineConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeepgramConfig {
    /// Prerecorded transcription endpoint
    pub endpoint: String,

    /// Model name
    pub model: String,

    /// Request per-speaker utterances
    pub diarize: bool,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// Files above this size are split before upload
    pub size_threshold_mb: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// API base URL (`/chat/completions` is appended)
    pub base_url: String,

    /// Chat model used for translation
    pub model: String,

    pub temperature: f32,

    pub max_tokens: u32,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// Longest text sent in one request, in characters
    pub chunk_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Records per batch; a checkpoint is written after each
    pub batch_size: usize,

    /// Simultaneous external calls across the whole run
    pub max_concurrent: usize,

    /// Attempts per external call
    pub max_attempts: u32,

    /// Backoff unit; retry `n` waits `2 * n` units
    pub backoff_ms: u64,

    /// Limit for a single external call, 0 disables it
    pub call_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding downloaded audio
    pub audio_dir: PathBuf,

    /// Parent directory for audio chunk scratch space
    pub temp_dir: Option<PathBuf>,

    /// Root of the per-language translation outputs
    pub translation_dir: PathBuf,
}

impl Default for DeepgramConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.deepgram.com/v1/listen".to_string(),
            model: "nova-3".to_string(),
            diarize: true,
            api_key_env: "DEEPGRAM_API_KEY".to_string(),
            size_threshold_mb: DEFAULT_SIZE_THRESHOLD / (1024 * 1024),
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.3,
            max_tokens: 4096,
            api_key_env: "OPENAI_API_KEY".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_concurrent: 8,
            max_attempts: 3,
            backoff_ms: 1000,
            call_timeout_secs: 300,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            audio_dir: PathBuf::from("downloaded"),
            temp_dir: None,
            translation_dir: PathBuf::from("translation"),
        }
    }
}

impl Config {
    /// Load configuration from `path`, the default locations, or create a default file
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::read(path);
        }

        let config_path = Self::default_path()?;
        if config_path.exists() {
            Self::read(&config_path)
        } else {
            let config = Self::default();
            config.save().await?;
            Ok(config)
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path)
            .context("Failed to read config file")?;

        let config: Config = serde_yaml::from_str(&content)
            .context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::default_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Configuration file used when no `--config` is given
    pub fn default_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("dataset-enricher").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.batch_size == 0 {
            anyhow::bail!("pipeline.batch_size must be at least 1");
        }
        if self.pipeline.max_concurrent == 0 {
            anyhow::bail!("pipeline.max_concurrent must be at least 1");
        }
        if self.pipeline.max_attempts == 0 {
            anyhow::bail!("pipeline.max_attempts must be at least 1");
        }
        if self.pipeline.backoff_ms > MAX_BACKOFF_MS {
            anyhow::bail!("pipeline.backoff_ms must be at most {} (one hour)", MAX_BACKOFF_MS);
        }
        if self.openai.chunk_size == 0 {
            anyhow::bail!("openai.chunk_size must be at least 1");
        }
        if self.deepgram.size_threshold_mb == 0 {
            anyhow::bail!("deepgram.size_threshold_mb must be at least 1");
        }

        validate_endpoint(&self.deepgram.endpoint)
            .context("Invalid deepgram.endpoint")?;
        validate_endpoint(&self.openai.base_url)
            .context("Invalid openai.base_url")?;

        Ok(())
    }

    /// Read an API key from the environment variable named by `env_var`
    pub fn api_key(env_var: &str) -> crate::Result<String> {
        match std::env::var(env_var) {
            Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
            _ => Err(EnrichError::Configuration(format!(
                "{} not found. Please set it first.",
                env_var
            ))),
        }
    }

    /// Retry policy shared by every external call
    pub fn retry_policy(&self) -> RetryPolicy {
        let call_timeout = match self.pipeline.call_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        RetryPolicy::new(
            self.pipeline.max_attempts,
            Duration::from_millis(self.pipeline.backoff_ms),
            call_timeout,
        )
    }

    /// HTTP client timeout; the per-attempt limit when set, otherwise one hour
    pub fn http_timeout(&self) -> Duration {
        match self.pipeline.call_timeout_secs {
            0 => Duration::from_secs(3600),
            secs => Duration::from_secs(secs),
        }
    }

    pub fn size_threshold_bytes(&self) -> u64 {
        self.deepgram.size_threshold_mb * 1024 * 1024
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("{}", style("Current Configuration:").bold());
        println!("  Deepgram Endpoint: {}", self.deepgram.endpoint);
        println!("  Deepgram Model: {}", self.deepgram.model);
        println!("  Diarization: {}", self.deepgram.diarize);
        println!("  Upload Limit: {} MB", self.deepgram.size_threshold_mb);
        println!("  OpenAI Base URL: {}", self.openai.base_url);
        println!("  OpenAI Model: {}", self.openai.model);
        println!("  Translation Chunk Size: {} chars", self.openai.chunk_size);
        println!("  Batch Size: {}", self.pipeline.batch_size);
        println!("  Max Concurrent Calls: {}", self.pipeline.max_concurrent);
        println!("  Max Attempts: {}", self.pipeline.max_attempts);
        println!("  Audio Directory: {}", self.app.audio_dir.display());
        println!("  Translation Directory: {}", self.app.translation_dir.display());
        for env_var in [&self.deepgram.api_key_env, &self.openai.api_key_env] {
            let state = if Self::api_key(env_var).is_ok() {
                style("set").green()
            } else {
                style("missing").red()
            };
            println!("  {}: {}", env_var, state);
        }
    }
}
