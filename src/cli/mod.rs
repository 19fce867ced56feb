use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "enrich",
    about = "Dataset Enricher - transcribe, translate and download audio for accelerator video and blog datasets",
    version,
    long_about = "Reads a JSON array of records, adds fields obtained from external services (Deepgram speech-to-text, OpenAI translation, yt-dlp downloads) and checkpoints the dataset after every batch so interrupted runs can be resumed."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./config.yaml or the user config directory)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,
}

/// Overrides for the batch scheduler settings in the configuration file
#[derive(Args, Debug, Clone, Default)]
pub struct BatchArgs {
    /// Records per batch (a checkpoint is written after each batch)
    #[arg(long, value_name = "N")]
    pub batch_size: Option<usize>,

    /// Maximum simultaneous calls to the external service
    #[arg(long, value_name = "N")]
    pub max_concurrent: Option<usize>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Transcribe the audio files of a video dataset into `mp3_content`
    Transcribe {
        /// Input dataset (JSON array of video records)
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Where checkpoints and the final dataset are written (defaults to the input file)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Index of the first record to process
        #[arg(long, default_value = "0", value_name = "N")]
        start_index: usize,

        /// Continue from the output file when it already exists
        #[arg(long)]
        resume: bool,

        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Translate video and blog datasets into another language
    Translate {
        /// Target language
        #[arg(short, long, default_value = "turkish", value_name = "LANG")]
        language: String,

        /// List all supported languages and exit
        #[arg(long)]
        list_languages: bool,

        /// Video dataset to translate (video-data-updated.json when neither dataset is given)
        #[arg(long, value_name = "FILE")]
        videos: Option<PathBuf>,

        /// Blog dataset to translate (blog-data.json when neither dataset is given)
        #[arg(long, value_name = "FILE")]
        blogs: Option<PathBuf>,

        /// Root directory for translated datasets (defaults to the configured translation_dir)
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Download the audio of each record's `youtube_url` into the audio directory
    Download {
        /// Input dataset with `youtube_url` fields
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Where checkpoints and the final dataset are written (defaults to the input file)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Report records that are still missing a field
    Audit {
        /// Dataset to inspect
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Field that must be present and non-empty
        #[arg(long, default_value = "mp3_content")]
        field: String,

        /// Field used to name records in the listing
        #[arg(long, default_value = "name_video")]
        label: String,
    },

    /// Show the active configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}
