//! Stickerize CLI
//!
//! `stickerize serve` runs the HTTP API; `stickerize convert` turns local
//! images into stickers.

use crate::{
    backends::load_segmenter,
    config::{BackendType, ResampleFilter, SegmenterConfig, StickerConfig, DEFAULT_FEATHER_SIGMA},
    pipeline::StickerPipeline,
    server::{self, ServerConfig, ServiceMode},
    tracing_config::{spans, TracingConfig, TracingFormat},
    types::ProcessingTimings,
    utils::PathValidator,
};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn, Instrument};

/// Turn photos into transparent-background stickers
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "stickerize")]
pub struct Cli {
    /// Verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log output format (console, compact, json)
    #[arg(long, default_value = "console", global = true, env = "STICKERIZE_LOG_FORMAT")]
    pub log_format: TracingFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP API
    Serve(ServeArgs),
    /// Convert image files or directories to stickers
    Convert(ConvertArgs),
}

/// Overrides on top of the environment configuration
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    #[arg(long, env = "STICKERIZE_HOST")]
    pub host: Option<String>,

    #[arg(long, env = "STICKERIZE_PORT")]
    pub port: Option<u16>,

    /// Processing mode (sync, async)
    #[arg(long, env = "STICKERIZE_MODE")]
    pub mode: Option<ServiceMode>,

    /// Inference backend (tract, onnx)
    #[arg(long, env = "STICKERIZE_BACKEND")]
    pub backend: Option<BackendType>,

    /// Path to the segmentation model (.onnx)
    #[arg(long, env = "STICKERIZE_MODEL", value_name = "PATH")]
    pub model: Option<PathBuf>,

    /// Feather sigma in mask pixels
    #[arg(long, env = "STICKERIZE_FEATHER_SIGMA")]
    pub sigma: Option<f32>,

    /// Worker tasks in async mode
    #[arg(long, env = "STICKERIZE_WORKERS")]
    pub workers: Option<usize>,

    /// Jobs allowed to wait for a worker in async mode
    #[arg(long, env = "STICKERIZE_QUEUE_CAPACITY")]
    pub queue_capacity: Option<usize>,

    /// Maximum number of async results held
    #[arg(long, env = "STICKERIZE_MAX_RESULTS")]
    pub max_results: Option<usize>,

    /// Retention of async results in seconds
    #[arg(long, env = "STICKERIZE_RESULT_TTL_SECS")]
    pub result_ttl: Option<u64>,

    /// Directory for sync-mode output files
    #[arg(long, env = "STICKERIZE_OUTPUT_DIR", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    #[arg(long, env = "STICKERIZE_MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: Option<usize>,
}

impl ServeArgs {
    /// Apply the flags that were given on top of `config`
    #[must_use]
    pub fn apply(self, mut config: ServerConfig) -> ServerConfig {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(model) = self.model {
            config.model_path = model;
        }
        if let Some(sigma) = self.sigma {
            config.feather_sigma = sigma;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(capacity) = self.queue_capacity {
            config.queue_capacity = capacity;
        }
        if let Some(max_results) = self.max_results {
            config.max_results = max_results;
        }
        if let Some(ttl) = self.result_ttl {
            config.result_ttl_secs = ttl;
        }
        if self.output_dir.is_some() {
            config.output_dir = self.output_dir;
        }
        if let Some(bytes) = self.max_upload_bytes {
            config.max_upload_bytes = bytes;
        }
        config
    }
}

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Input image files or directories
    #[arg(value_name = "INPUT", required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output directory [default: next to each input]
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Walk directories recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Path to the segmentation model (.onnx)
    #[arg(long, env = "STICKERIZE_MODEL", value_name = "PATH")]
    pub model: Option<PathBuf>,

    /// Inference backend (tract, onnx)
    #[arg(long, env = "STICKERIZE_BACKEND", default_value = "tract")]
    pub backend: BackendType,

    /// Feather sigma in mask pixels
    #[arg(long, default_value_t = DEFAULT_FEATHER_SIGMA)]
    pub sigma: f32,

    /// Mask resampling filter (bicubic, bilinear, lanczos)
    #[arg(long, default_value = "bicubic")]
    pub resample: ResampleFilter,

    /// Files converted concurrently
    #[arg(short, long, default_value_t = 1)]
    pub jobs: usize,
}

pub async fn main() -> Result<()> {
    // Load .env before parsing so clap's env fallbacks see it
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    TracingConfig::new()
        .with_verbosity(cli.verbose)
        .with_format(cli.log_format)
        .init()
        .context("Failed to initialize tracing")?;

    match cli.command {
        Command::Serve(args) => run_serve(args).await,
        Command::Convert(args) => run_convert(args).await,
    }
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    // Flags override the environment before anything is validated
    let config = args.apply(ServerConfig::from_env().context("Invalid environment configuration")?);
    config.validate().context("Invalid server configuration")?;

    info!(
        mode = %config.mode,
        backend = %config.backend,
        model = %config.model_path.display(),
        "Starting stickerize server"
    );
    server::serve(config).await?;
    Ok(())
}

async fn run_convert(args: ConvertArgs) -> Result<()> {
    if args.jobs == 0 {
        anyhow::bail!("--jobs must be at least 1");
    }

    let files = collect_inputs(&args.inputs, args.recursive)?;
    if files.is_empty() {
        warn!("No PNG or JPEG files found in the provided inputs");
        return Ok(());
    }

    if let Some(ref dir) = args.output {
        if dir.is_file() {
            anyhow::bail!("Output path is a file, not a directory: {}", dir.display());
        }
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    }

    let sticker_config = StickerConfig::builder()
        .feather_sigma(args.sigma)
        .resample(args.resample)
        .build()
        .context("Invalid sticker settings")?;
    let segmenter_config = args
        .model
        .as_ref()
        .map_or_else(SegmenterConfig::default, SegmenterConfig::with_model_path);

    let backend = args.backend;
    let load_start = Instant::now();
    let segmenter = tokio::task::spawn_blocking(move || load_segmenter(backend, &segmenter_config))
        .await
        .context("Model loading task failed")??;
    let info = segmenter.info();
    info!(
        backend = %info.backend,
        model = %info.model,
        load_ms = load_start.elapsed().as_millis() as u64,
        "Segmentation model loaded"
    );

    let pipeline = StickerPipeline::new(segmenter, sticker_config)?;
    let total = files.len();
    let progress = progress_bar(total)?;
    let batch_span = spans::batch_conversion(total, args.output.as_deref().unwrap_or(Path::new(".")));
    let batch_start = Instant::now();

    let outcomes: Vec<(PathBuf, Result<PathBuf>)> = stream::iter(files)
        .map(|input| {
            let pipeline = pipeline.clone();
            let output_dir = args.output.clone();
            let progress = progress.clone();
            async move {
                let span = spans::file_conversion(&input);
                let outcome = convert_file(&pipeline, &input, output_dir.as_deref())
                    .instrument(span)
                    .await;
                progress.inc(1);
                (input, outcome)
            }
        })
        .buffer_unordered(args.jobs)
        .collect::<Vec<_>>()
        .instrument(batch_span)
        .await;
    progress.finish_and_clear();

    let mut failed = 0usize;
    for (input, outcome) in &outcomes {
        match outcome {
            Ok(output) => debug!(input = %input.display(), output = %output.display(), "Converted"),
            Err(e) => {
                failed += 1;
                error!(input = %input.display(), error = %format!("{e:#}"), "Conversion failed");
            },
        }
    }

    info!(
        converted = total - failed,
        failed,
        elapsed_ms = batch_start.elapsed().as_millis() as u64,
        "Conversion finished"
    );

    if failed > 0 {
        anyhow::bail!("{failed} of {total} file(s) failed to convert");
    }
    Ok(())
}

async fn convert_file(
    pipeline: &StickerPipeline,
    input: &Path,
    output_dir: Option<&Path>,
) -> Result<PathBuf> {
    let output = output_path(input, output_dir)?;
    let mut result = pipeline.process_file(input).await?;
    let png = pipeline.encode(&mut result)?;
    tokio::fs::write(&output, &png)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;
    log_timings(input, &result.timings);
    Ok(output)
}

fn log_timings(input: &Path, timings: &ProcessingTimings) {
    debug!(input = %input.display(), timings = %timings.summary(), "Sticker timings");
}

/// `<dir>/<stem>_sticker.png`, where `dir` defaults to the input's directory
fn output_path(input: &Path, output_dir: Option<&Path>) -> Result<PathBuf> {
    let name = PathValidator::sticker_file_name(input)?;
    let dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => input.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    Ok(dir.join(name))
}

/// Expand files and directories into a sorted, de-duplicated list of images
fn collect_inputs(inputs: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_file() {
            if PathValidator::is_supported_image(input) {
                files.push(input.clone());
            } else {
                warn!("Skipping unsupported file: {}", input.display());
            }
        } else if input.is_dir() {
            let depth = if recursive { usize::MAX } else { 1 };
            for entry in walkdir::WalkDir::new(input).max_depth(depth) {
                let entry = entry?;
                if entry.file_type().is_file() && PathValidator::is_supported_image(entry.path()) {
                    files.push(entry.into_path());
                }
            }
        } else {
            anyhow::bail!(
                "Input path does not exist or is not accessible: {}",
                input.display()
            );
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

fn progress_bar(total: usize) -> Result<ProgressBar> {
    if total < 2 {
        return Ok(ProgressBar::hidden());
    }
    let bar = ProgressBar::new(total as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    Ok(bar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_convert() {
        let cli = Cli::try_parse_from([
            "stickerize", "-vv", "convert", "a.png", "photos", "-o", "out", "--sigma", "2.5",
            "--jobs", "4",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Convert(args) => {
                assert_eq!(args.inputs.len(), 2);
                assert_eq!(args.output, Some(PathBuf::from("out")));
                assert!((args.sigma - 2.5).abs() < f32::EPSILON);
                assert_eq!(args.jobs, 4);
                assert_eq!(args.resample, ResampleFilter::CatmullRom);
            },
            Command::Serve(_) => panic!("expected convert"),
        }
    }

    #[test]
    fn test_convert_requires_input() {
        assert!(Cli::try_parse_from(["stickerize", "convert"]).is_err());
    }

    #[test]
    fn test_serve_args_override_config() {
        let args = ServeArgs {
            port: Some(9000),
            mode: Some(ServiceMode::Async),
            sigma: Some(2.0),
            ..ServeArgs::default()
        };
        let config = args.apply(ServerConfig::default());
        assert_eq!(config.port, 9000);
        assert_eq!(config.mode, ServiceMode::Async);
        assert!((config.feather_sigma - 2.0).abs() < f32::EPSILON);
        assert_eq!(config.host, ServerConfig::default().host);
    }

    #[test]
    fn test_serve_flag_corrects_invalid_setting() {
        let from_env = ServerConfig {
            workers: 0,
            ..ServerConfig::default()
        };
        assert!(from_env.validate().is_err());

        let args = ServeArgs {
            workers: Some(4),
            ..ServeArgs::default()
        };
        let config = args.apply(from_env);
        assert_eq!(config.workers, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_output_path() {
        let path = output_path(Path::new("photos/cat.jpg"), None).unwrap();
        assert_eq!(path, PathBuf::from("photos/cat_sticker.png"));

        let path = output_path(Path::new("photos/cat.jpg"), Some(Path::new("out"))).unwrap();
        assert_eq!(path, PathBuf::from("out/cat_sticker.png"));
    }

    #[test]
    fn test_collect_inputs_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.PNG"), b"x").unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("c.jpeg"), b"x").unwrap();

        let flat = collect_inputs(&[dir.path().to_path_buf()], false).unwrap();
        assert_eq!(flat.len(), 2);
        assert!(flat[0].ends_with("a.jpg"));

        let deep = collect_inputs(&[dir.path().to_path_buf()], true).unwrap();
        assert_eq!(deep.len(), 3);

        assert!(collect_inputs(&[dir.path().join("missing")], false).is_err());
    }
}
