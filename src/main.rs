//! CLI entry point for vidstitch.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::Parser;
use tracing::{debug, info, warn};
use vidstitch_core::config::{self, PipelineConfig};
use vidstitch_core::{
    AcquisitionMode, AcquisitionRequest, Pipeline, Subclipper, Transcoder, YtDlpCatalog,
    validate_range,
};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = resolve_config(&args)?;
    debug!(?config, "effective configuration");

    let start = args.start.unwrap_or(0);
    // A bad range must fail before any catalog lookup or download.
    if let Some(end) = args.end {
        validate_range(start, end)?;
    }

    let source = Path::new(&args.source);
    if source.is_file() {
        let Some(end) = args.end else {
            bail!("cutting a subclip from a local file requires --end");
        };
        let subclipper = Subclipper::new(Transcoder::new(&config.ffmpeg, &config.ffprobe));
        let output = subclipper.clip(source, start, end).await?;
        println!("{}", output.display());
        return Ok(());
    }

    let mode = if args.audio_only {
        AcquisitionMode::AudioOnly
    } else if args.video_only {
        AcquisitionMode::VideoOnly
    } else {
        AcquisitionMode::Full
    };
    let request = AcquisitionRequest::new(args.source.clone())
        .with_mode(mode)
        .with_overwrite(args.overwrite)
        .with_range(start, args.end.unwrap_or(0));

    let catalog = Arc::new(YtDlpCatalog::new(&config.yt_dlp));
    let pipeline = Pipeline::new(catalog, config.clone());
    let outcome = pipeline.run(&request).await?;
    println!("{}", outcome.artifact.path.display());

    if let Some(end) = args.end {
        if mode == AcquisitionMode::AudioOnly {
            warn!("subclip range ignored for audio-only output");
            return Ok(());
        }
        let subclipper = Subclipper::new(Transcoder::new(&config.ffmpeg, &config.ffprobe));
        let clip = subclipper
            .clip(&outcome.artifact.path, start, end)
            .await?;
        info!(path = %clip.display(), "subclip complete");
        println!("{}", clip.display());
    }

    Ok(())
}

/// Defaults, then the config file, then command-line overrides.
fn resolve_config(args: &Args) -> Result<PipelineConfig> {
    let file_config = match &args.config {
        Some(path) => Some(config::load_file_config(path)?),
        None => config::load_default_file_config()?,
    };

    let mut config = PipelineConfig::default();
    if let Some(file_config) = &file_config {
        file_config.apply(&mut config);
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir.clone_from(dir);
    }
    if let Some(root) = &args.staging_root {
        config.staging_root.clone_from(root);
    }
    Ok(config)
}
