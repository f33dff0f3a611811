//! Capture orchestration
//!
//! [`Screenshotter`] ties the pieces together: options are merged over the
//! configured defaults, the render script is looked up (or written) in the
//! job cache, and the renderer is run against it.

use crate::cache::{CacheKey, JobCache};
use crate::config::{CaptureOptions, Config, RenderParams};
use crate::error::{Result, ScreenshotError};
use crate::metrics::Metrics;
use crate::platform::executable_for;
use crate::process::{CommandRunner, Invocation, ProcessRunner};
use crate::template::TemplateRenderer;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Outcome of a successful capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub url: String,
    pub destination: PathBuf,
    pub artifact: PathBuf,
    pub cache_key: CacheKey,
    pub cache_hit: bool,
    pub elapsed: Duration,
}

/// Takes screenshots of web pages through an external renderer
///
/// The configuration is fixed at construction. `Screenshotter` is
/// `Send + Sync`; callers that want captures to overlap can share it behind an
/// `Arc` and drive several [`capture`](Self::capture) calls at once.
///
/// # Examples
///
/// ```rust,no_run
/// use screenshotter::{CaptureOptions, Config, Screenshotter};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut config = Config::new("/var/screenshots", "/var/cache/screenshotter");
///     config.set_width(800).set_height(600).set_timeout(5);
///
///     let screenshotter = Screenshotter::new(config).await?;
///     let path = screenshotter
///         .capture("https://example.com", "example.png", &CaptureOptions::default())
///         .await?;
///     println!("Screenshot written to {}", path.display());
///     Ok(())
/// }
/// ```
pub struct Screenshotter {
    config: Config,
    cache: JobCache,
    runner: Arc<dyn CommandRunner>,
    metrics: Metrics,
}

impl Screenshotter {
    pub async fn new(config: Config) -> Result<Self> {
        Self::with_runner(config, Arc::new(ProcessRunner::new())).await
    }

    /// Builds a screenshotter that hands invocations to `runner` instead of
    /// spawning the renderer directly.
    pub async fn with_runner(config: Config, runner: Arc<dyn CommandRunner>) -> Result<Self> {
        let config = config.normalized();
        config.validate()?;

        let renderer = TemplateRenderer::load(config.template_path.as_deref()).await?;
        let cache = JobCache::new(config.cache_path.clone(), renderer);

        debug!(
            "Screenshotter ready: output={}, cache={}",
            config.output_path.display(),
            config.cache_path.display()
        );

        Ok(Self {
            config,
            cache,
            runner,
            metrics: Metrics::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Where a capture named `filename` ends up.
    ///
    /// `filename` must stay inside the output directory: absolute paths and
    /// `..` components are rejected.
    pub fn destination(&self, filename: &str) -> Result<PathBuf> {
        let relative = Path::new(filename);
        let mut has_name = false;
        for component in relative.components() {
            match component {
                Component::Normal(_) => has_name = true,
                Component::CurDir => {}
                _ => {
                    return Err(ScreenshotError::InvalidFilename(format!(
                        "{filename} must be relative to the output directory"
                    )))
                }
            }
        }
        if !has_name {
            return Err(ScreenshotError::InvalidFilename(format!(
                "'{filename}' does not name a file"
            )));
        }

        Ok(self.config.output_path.join(relative))
    }

    /// Captures `url` into `<output_path>/<filename>` and returns that path.
    pub async fn capture(
        &self,
        url: &str,
        filename: &str,
        options: &CaptureOptions,
    ) -> Result<PathBuf> {
        self.capture_detailed(url, filename, options)
            .await
            .map(|capture| capture.destination)
    }

    /// Like [`capture`](Self::capture), also reporting the render script used
    /// and whether it came from the cache.
    pub async fn capture_detailed(
        &self,
        url: &str,
        filename: &str,
        options: &CaptureOptions,
    ) -> Result<Capture> {
        let start = Instant::now();
        let params = RenderParams::merge(url, filename, options, &self.config);

        let result = self.run_capture(&params, start).await;

        match &result {
            Ok(capture) => {
                self.metrics.record_capture(capture.elapsed, true);
                info!(
                    "Captured {} -> {} in {:?}",
                    url,
                    capture.destination.display(),
                    capture.elapsed
                );
            }
            Err(e) => {
                self.metrics.record_capture(start.elapsed(), false);
                if matches!(e, ScreenshotError::ProcessTimeout(_)) {
                    self.metrics.record_timeout();
                }
                warn!("Capture of {} failed: {}", url, e);
            }
        }

        result
    }

    async fn run_capture(&self, params: &RenderParams, start: Instant) -> Result<Capture> {
        let destination = self.destination(&params.filename)?;
        let artifact = self.cache.get_or_create(params).await?;
        self.metrics.record_cache_lookup(artifact.cache_hit);

        let program = executable_for(&self.config)?;
        let invocation = Invocation::new(
            program,
            &self.config.tls_options(),
            &artifact.path,
            &destination,
            self.config.timeout(),
        );

        let previous = OutputStamp::read(&destination).await;
        if let Err(e) = self.runner.run(&invocation).await {
            if matches!(e, ScreenshotError::ProcessTimeout(_)) {
                remove_partial_output(&destination, previous).await;
            }
            return Err(e);
        }

        Ok(Capture {
            url: params.url.clone(),
            destination,
            artifact: artifact.path,
            cache_key: artifact.key,
            cache_hit: artifact.cache_hit,
            elapsed: start.elapsed(),
        })
    }
}

/// Size and modification time of an existing output file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OutputStamp {
    len: u64,
    modified: Option<SystemTime>,
}

impl OutputStamp {
    async fn read(path: &Path) -> Option<Self> {
        let metadata = tokio::fs::metadata(path).await.ok()?;
        Some(Self {
            len: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }
}

/// A killed renderer may leave a truncated image behind. A file the renderer
/// never touched (same stamp as before the run) is kept.
async fn remove_partial_output(destination: &Path, previous: Option<OutputStamp>) {
    let current = OutputStamp::read(destination).await;
    if current.is_none() {
        return;
    }
    if previous.is_some() && current == previous {
        debug!(
            "Keeping {}, the renderer did not write to it",
            destination.display()
        );
        return;
    }

    match tokio::fs::remove_file(destination).await {
        Ok(()) => debug!("Removed partial output {}", destination.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(
            "Could not remove partial output {}: {}",
            destination.display(),
            e
        ),
    }
}
