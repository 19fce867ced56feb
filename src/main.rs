use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dataset_enricher::cli::{BatchArgs, Cli, Commands};
use dataset_enricher::config::Config;
use dataset_enricher::download::{self, DownloadEnricher, YtDlpDownloader};
use dataset_enricher::pipeline::{
    BatchScheduler, CallGate, CancelFlag, Enricher, JsonCheckpoint, RunSummary,
};
use dataset_enricher::report::{self, MissingReport};
use dataset_enricher::store;
use dataset_enricher::transcribe::{self, DeepgramClient, FfmpegSplitter, TranscriptionEnricher};
use dataset_enricher::translate::{
    BlogTranslation, Language, OpenAiTranslator, Translator, VideoTranslation,
};
use dataset_enricher::utils;

const DEFAULT_VIDEOS: &str = "video-data-updated.json";
const DEFAULT_BLOGS: &str = "blog-data.json";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    let quiet = cli.quiet;
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Transcribe {
            input,
            output,
            start_index,
            resume,
            batch,
        } => {
            warn_missing_tools("transcribe").await;
            let config = Config::load(config_path).await?;
            let api_key = Config::api_key(&config.deepgram.api_key_env)?;
            let backend = DeepgramClient::new(&config.deepgram, api_key, config.http_timeout())?;

            let enricher = TranscriptionEnricher::new(
                Arc::new(backend),
                Arc::new(FfmpegSplitter::new()),
                call_gate(&config, &batch),
                config.app.audio_dir.clone(),
            )
            .with_size_threshold(config.size_threshold_bytes())
            .with_temp_dir(config.app.temp_dir.clone());

            let output = output.unwrap_or_else(|| input.clone());
            let source = if resume && output.exists() { &output } else { &input };
            let scheduler = scheduler(&config, &batch, quiet).start_at(start_index);
            let coverage = (transcribe::TRANSCRIPT_FIELD, transcribe::VIDEO_LABEL_FIELD);
            run_dataset(source, &output, &enricher, &scheduler, Some(coverage)).await?;
        }
        Commands::Translate {
            list_languages: true,
            ..
        } => {
            print_languages();
        }
        Commands::Translate {
            language,
            videos,
            blogs,
            output_dir,
            batch,
            ..
        } => {
            // Validated before any configuration or credential is touched
            let language: Language = language.parse()?;

            let config = Config::load(config_path).await?;
            let api_key = Config::api_key(&config.openai.api_key_env)?;
            let backend = OpenAiTranslator::new(&config.openai, &api_key, config.http_timeout())?;
            let translator = Arc::new(
                Translator::new(Arc::new(backend), call_gate(&config, &batch), language)
                    .with_chunk_size(config.openai.chunk_size),
            );

            let dir = output_dir
                .unwrap_or_else(|| config.app.translation_dir.clone())
                .join(language.code());
            let (videos, blogs) = match (videos, blogs) {
                (None, None) => (Some(PathBuf::from(DEFAULT_VIDEOS)), Some(PathBuf::from(DEFAULT_BLOGS))),
                given => given,
            };

            tracing::info!("Starting translation process to {}", language);
            let scheduler = scheduler(&config, &batch, quiet);
            if let Some(videos) = videos {
                let enricher = VideoTranslation::new(Arc::clone(&translator));
                run_dataset(&videos, &dir.join("video-data.json"), &enricher, &scheduler, None).await?;
            }
            if let Some(blogs) = blogs {
                let enricher = BlogTranslation::new(translator);
                run_dataset(&blogs, &dir.join("blog-data.json"), &enricher, &scheduler, None).await?;
            }
            println!(
                "{}",
                style(format!("All data has been translated to {}", language)).green()
            );
            println!("Results saved to {}", dir.display());
        }
        Commands::Download {
            input,
            output,
            batch,
        } => {
            warn_missing_tools("download").await;
            let config = Config::load(config_path).await?;
            let enricher = DownloadEnricher::new(
                Arc::new(YtDlpDownloader::new()),
                call_gate(&config, &batch),
                config.app.audio_dir.clone(),
            );

            let output = output.unwrap_or_else(|| input.clone());
            let scheduler = scheduler(&config, &batch, quiet);
            let coverage = (download::AUDIO_FIELD, transcribe::VIDEO_LABEL_FIELD);
            run_dataset(&input, &output, &enricher, &scheduler, Some(coverage)).await?;
        }
        Commands::Audit {
            input,
            field,
            label,
        } => {
            let records = store::load(&input)
                .with_context(|| format!("Failed to load data from {}", input.display()))?;
            let report = MissingReport::build(&records, &field, &label);
            report::print_to_console(&report);
        }
        Commands::Config { show } => {
            let config = Config::load(config_path).await?;
            if show {
                config.display();
            } else {
                match config_path {
                    Some(path) => println!("Configuration file: {}", path.display()),
                    None => println!("Configuration file: {}", Config::default_path()?.display()),
                }
                println!("Use `enrich config --show` to print the active settings.");
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool, json: bool) {
    let default_filter = if verbose {
        "dataset_enricher=debug,enrich=debug"
    } else {
        "dataset_enricher=info,enrich=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_languages() {
    println!("{}", style("Supported languages:").cyan());
    for language in Language::ALL {
        println!("  - {} ({})", language.code(), language.display_name());
    }
}

/// External tools are only warned about; the failing record reports the real error
async fn warn_missing_tools(command: &str) {
    let missing = utils::check_dependencies(utils::required_tools(command)).await;
    if !missing.is_empty() {
        eprintln!("⚠️  Dependency check warnings:");
        for tool in missing {
            eprintln!("   • {} not found in PATH", tool);
        }
        eprintln!("   (Continuing anyway - tools may be available)");
    }
}

fn call_gate(config: &Config, batch: &BatchArgs) -> Arc<CallGate> {
    let max_concurrent = batch.max_concurrent.unwrap_or(config.pipeline.max_concurrent);
    Arc::new(CallGate::new(max_concurrent, config.retry_policy()))
}

fn scheduler(config: &Config, batch: &BatchArgs, quiet: bool) -> BatchScheduler {
    let batch_size = batch.batch_size.unwrap_or(config.pipeline.batch_size);
    BatchScheduler::new(batch_size)
        .with_cancel(cancel_on_ctrl_c())
        .with_progress(!quiet)
}

fn cancel_on_ctrl_c() -> CancelFlag {
    let cancel = CancelFlag::new();
    let flag = cancel.clone();
    tokio::spawn(async move {
        flag.watch(
            || async { tokio::signal::ctrl_c().await.is_ok() },
            || std::process::exit(130),
        )
        .await;
    });
    cancel
}

/// Output field and label field whose coverage is reported after a run
type Coverage = (&'static str, &'static str);

/// Load `input`, enrich it batch by batch with checkpoints to `output`, and report
async fn run_dataset<E: Enricher>(
    input: &Path,
    output: &Path,
    enricher: &E,
    scheduler: &BatchScheduler,
    coverage: Option<Coverage>,
) -> Result<RunSummary> {
    let mut records = store::load(input)
        .with_context(|| format!("Failed to load data from {}", input.display()))?;
    tracing::info!("Loaded {} with {} items", input.display(), records.len());

    let started = Instant::now();
    let checkpoint = JsonCheckpoint::new(output);
    let summary = scheduler.run(&mut records, enricher, &checkpoint).await;

    print_summary(enricher.name(), &summary, output, started);
    if let Some((field, label)) = coverage {
        println!("{}", MissingReport::build(&records, field, label).coverage_line());
    }
    Ok(summary)
}

fn print_summary(name: &str, summary: &RunSummary, output: &Path, started: Instant) {
    let heading = if summary.cancelled {
        style(format!("=== {} CANCELLED ===", name.to_uppercase())).yellow()
    } else {
        style(format!("=== {} FINALIZED ===", name.to_uppercase())).green()
    };
    println!("\n{}", heading);
    println!(
        "Succeeded: {}  Failed: {}  Without input: {}  Already done: {}",
        summary.succeeded, summary.failed, summary.skipped_missing_input, summary.skipped_complete
    );
    if summary.checkpoint_failures > 0 {
        println!(
            "{}",
            style(format!("{} checkpoint writes failed", summary.checkpoint_failures)).red()
        );
    }
    println!(
        "Results saved to {} in {}",
        output.display(),
        utils::format_duration(started.elapsed())
    );
}
