use crate::{
    executable_for, filename_for_url, format_bytes, format_duration, validate_url, Capture,
    CaptureOptions, Config, Platform, Screenshotter,
};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "screenshotter")]
#[command(about = "Web page screenshots through a bundled headless renderer")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, help = "Configuration file path (JSON)")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Output directory for screenshots")]
    pub output: Option<PathBuf>,

    #[arg(long, help = "Cache directory for render scripts")]
    pub cache: Option<PathBuf>,

    #[arg(long, help = "Renderer timeout in seconds")]
    pub timeout: Option<u64>,

    #[arg(long, help = "Renderer executable path (skips platform lookup)")]
    pub executable: Option<PathBuf>,

    #[arg(long, help = "Directory holding the bundled renderer binaries")]
    pub bin_dir: Option<PathBuf>,

    #[arg(long, help = "Render script template file")]
    pub template: Option<PathBuf>,

    #[arg(long, help = "TLS protocol (sslv2, sslv3, tlsv1, any)")]
    pub ssl_protocol: Option<String>,

    #[arg(long, help = "Ignore TLS certificate errors (true/false)")]
    pub ignore_ssl_errors: Option<bool>,

    #[arg(long, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, help = "Print Prometheus metrics on exit")]
    pub metrics: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Take a single screenshot
    Capture {
        #[arg(short, long, help = "URL to screenshot")]
        url: String,

        #[arg(short, long, help = "Filename inside the output directory")]
        filename: String,

        #[arg(long, help = "Viewport width")]
        width: Option<u32>,

        #[arg(long, help = "Viewport height")]
        height: Option<u32>,

        #[arg(long, help = "Clip rectangle width (needs --clip-height)")]
        clip_width: Option<u32>,

        #[arg(long, help = "Clip rectangle height (needs --clip-width)")]
        clip_height: Option<u32>,

        #[arg(long, help = "Wait time in milliseconds before taking screenshot")]
        wait: Option<u64>,

        #[arg(long, help = "Print a JSON report instead of a summary")]
        json: bool,
    },

    /// Take screenshots of URLs from a file
    Batch {
        #[arg(short, long, help = "Input file containing URLs (one per line)")]
        input: PathBuf,

        #[arg(short, long, help = "Concurrent captures (default: CPU count)")]
        concurrency: Option<usize>,

        #[arg(long, help = "Viewport width")]
        width: Option<u32>,

        #[arg(long, help = "Viewport height")]
        height: Option<u32>,

        #[arg(long, help = "Wait time in milliseconds before taking screenshot")]
        wait: Option<u64>,
    },

    /// Validate configuration
    Validate {
        #[arg(short, long, help = "Configuration file to validate")]
        config: PathBuf,
    },

    /// Show the detected platform and renderer executable
    Platform,
}

#[derive(Debug, Serialize)]
pub struct CaptureReport {
    pub url: String,
    pub destination: PathBuf,
    pub artifact: PathBuf,
    pub cache_key: String,
    pub cache_hit: bool,
    pub duration_ms: u128,
    pub size_bytes: Option<u64>,
    pub dimensions: Option<(u32, u32)>,
    pub captured_at: DateTime<Utc>,
}

impl CaptureReport {
    pub async fn from_capture(capture: &Capture) -> Self {
        let size_bytes = fs::metadata(&capture.destination).await.ok().map(|m| m.len());
        let dimensions = image::image_dimensions(&capture.destination).ok();

        Self {
            url: capture.url.clone(),
            destination: capture.destination.clone(),
            artifact: capture.artifact.clone(),
            cache_key: capture.cache_key.to_string(),
            cache_hit: capture.cache_hit,
            duration_ms: capture.elapsed.as_millis(),
            size_bytes,
            dimensions,
            captured_at: Utc::now(),
        }
    }
}

/// Applies command-line overrides on top of a file or default configuration.
pub fn apply_overrides(mut config: Config, args: &Cli) -> Result<Config> {
    if let Some(output) = &args.output {
        config.set_output_path(output);
    }
    if let Some(cache) = &args.cache {
        config.set_cache_path(cache);
    }
    if let Some(timeout) = args.timeout {
        config.set_timeout(timeout);
    }
    if let Some(executable) = &args.executable {
        config.set_executable(executable);
    }
    if let Some(bin_dir) = &args.bin_dir {
        config.set_bin_dir(bin_dir);
    }
    if let Some(template) = &args.template {
        config.set_template_path(template);
    }
    if let Some(protocol) = &args.ssl_protocol {
        config.set_ssl_protocol(protocol)?;
    }
    if let Some(ignore) = args.ignore_ssl_errors {
        config.ignore_ssl_errors(ignore);
    }

    Ok(config)
}

pub async fn load_config(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Cannot read configuration {}", path.display()))?;
    let config: Config = serde_json::from_str(&content)
        .with_context(|| format!("Invalid configuration {}", path.display()))?;
    Ok(config.normalized())
}

pub struct CliRunner {
    pub config: Config,
    pub screenshotter: Arc<Screenshotter>,
}

impl CliRunner {
    pub async fn new(config: Config) -> Result<Self> {
        let screenshotter = Arc::new(Screenshotter::new(config.clone()).await?);
        Ok(Self {
            config: screenshotter.config().clone(),
            screenshotter,
        })
    }

    pub async fn run(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Capture {
                url,
                filename,
                width,
                height,
                clip_width,
                clip_height,
                wait,
                json,
            } => {
                let options = CaptureOptions {
                    width,
                    height,
                    clip_width,
                    clip_height,
                    wait,
                };
                self.run_capture(&url, &filename, &options, json).await
            }
            Commands::Batch {
                input,
                concurrency,
                width,
                height,
                wait,
            } => {
                let options = CaptureOptions {
                    width,
                    height,
                    wait,
                    ..Default::default()
                };
                let concurrency = concurrency.unwrap_or_else(num_cpus::get).max(1);
                self.run_batch(&input, &options, concurrency).await
            }
            Commands::Validate { config } => self.validate_config(&config).await,
            Commands::Platform => self.show_platform(),
        }
    }

    pub async fn run_capture(
        &self,
        url: &str,
        filename: &str,
        options: &CaptureOptions,
        json: bool,
    ) -> Result<()> {
        validate_url(url)?;
        if options.clip_width.is_some() != options.clip_height.is_some() {
            warn!("Clip needs both --clip-width and --clip-height; capturing without clip");
        }

        self.prepare_directories().await?;
        info!("Taking screenshot of: {}", url);

        let capture = self
            .screenshotter
            .capture_detailed(url, filename, options)
            .await?;
        let report = CaptureReport::from_capture(&capture).await;

        if json {
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }

        println!("Screenshot captured successfully:");
        println!("  URL: {}", report.url);
        println!("  Output: {}", report.destination.display());
        println!(
            "  Render script: {} ({})",
            report.artifact.display(),
            if report.cache_hit { "cached" } else { "created" }
        );
        println!("  Duration: {}", format_duration(capture.elapsed));
        match report.size_bytes {
            Some(size) => println!("  Size: {}", format_bytes(size)),
            None => warn!("Renderer reported success but {} is missing", report.destination.display()),
        }
        if let Some((width, height)) = report.dimensions {
            println!("  Dimensions: {width}x{height}");
        }

        Ok(())
    }

    pub async fn run_batch(
        &self,
        input: &Path,
        options: &CaptureOptions,
        concurrency: usize,
    ) -> Result<()> {
        info!("Starting batch screenshot processing");

        let urls = self.read_urls_from_file(input).await?;
        info!("Loaded {} URLs from {}", urls.len(), input.display());
        self.prepare_directories().await?;

        let results: Vec<(String, Result<Capture>)> = stream::iter(urls)
            .map(|url| {
                let screenshotter = self.screenshotter.clone();
                let options = options.clone();
                async move {
                    let result = match validate_url(&url) {
                        Ok(_) => {
                            let filename = filename_for_url(&url, "png");
                            screenshotter
                                .capture_detailed(&url, &filename, &options)
                                .await
                                .map_err(anyhow::Error::from)
                        }
                        Err(e) => Err(e.into()),
                    };
                    (url, result)
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let total = results.len();
        let mut error_count = 0;
        for (url, result) in results {
            match result {
                Ok(capture) => info!("Saved screenshot: {}", capture.destination.display()),
                Err(e) => {
                    error_count += 1;
                    warn!("Failed to screenshot {}: {:#}", url, e);
                }
            }
        }

        info!(
            "Batch processing completed. Success: {}, Errors: {}",
            total - error_count,
            error_count
        );

        if error_count > 0 {
            bail!("{error_count} of {total} captures failed");
        }
        Ok(())
    }

    pub async fn validate_config(&self, config_path: &Path) -> Result<()> {
        println!("Validating configuration: {}", config_path.display());

        let config = load_config(config_path).await?;
        config.validate()?;

        println!("Configuration is valid:");
        println!("  Output path: {}", config.output_path.display());
        println!("  Cache path: {}", config.cache_path.display());
        println!("  Viewport: {}x{}", config.width, config.height);
        println!("  Timeout: {}s", config.timeout_secs);
        println!("  Wait: {}ms", config.wait_ms);
        if let Some(protocol) = config.ssl_protocol {
            println!("  SSL protocol: {protocol}");
        }
        println!("  Ignore SSL errors: {}", config.ignore_ssl_errors);

        Ok(())
    }

    pub fn show_platform(&self) -> Result<()> {
        match Platform::detect() {
            Ok(platform) => println!("Platform: {platform}"),
            Err(e) => error!("{}", e),
        }

        let executable = executable_for(&self.config)?;
        println!("Renderer: {}", executable.display());
        if !executable.exists() {
            warn!("Renderer executable not found at {}", executable.display());
        }

        Ok(())
    }

    pub async fn read_urls_from_file(&self, path: &Path) -> Result<Vec<String>> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Cannot read URL list {}", path.display()))?;
        let urls: Vec<String> = content
            .lines()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| line.to_string())
            .collect();

        Ok(urls)
    }

    async fn prepare_directories(&self) -> Result<()> {
        for dir in [&self.config.output_path, &self.config.cache_path] {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Cannot create directory {}", dir.display()))?;
        }
        Ok(())
    }
}

pub fn setup_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
