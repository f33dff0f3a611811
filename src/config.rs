//! Configuration management with serde serialization/deserialization
//!
//! This module holds the settings the [`Screenshotter`](crate::Screenshotter) is
//! built from, the per-call [`CaptureOptions`] overrides, and the
//! [`RenderParams`] value that results from merging the two.

use crate::error::{Result, ScreenshotError};
use crate::platform::normalize_dir;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_WIDTH: u32 = 1024;
pub const DEFAULT_HEIGHT: u32 = 768;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_WAIT_MS: u64 = 1000;

/// Main configuration structure for the screenshotter
///
/// Set everything up front, then hand the value to
/// [`Screenshotter::new`](crate::Screenshotter::new). The orchestrator never
/// mutates it afterwards.
///
/// # Examples
///
/// ```rust
/// use screenshotter::Config;
///
/// let mut config = Config::new("/var/screenshots", "/var/cache/screenshotter");
/// config.set_width(800).set_height(600).set_timeout(5);
/// config.set_ssl_protocol("tlsv1").unwrap();
///
/// assert!(config.set_ssl_protocol("garbage").is_err());
/// assert_eq!(config.ssl_protocol.unwrap().as_str(), "tlsv1");
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Directory the rendered images are written to (always ends with a separator)
    pub output_path: PathBuf,

    /// Directory holding generated render scripts (always ends with a separator)
    pub cache_path: PathBuf,

    /// Default viewport width in pixels (default: 1024)
    pub width: u32,

    /// Default viewport height in pixels (default: 768)
    pub height: u32,

    /// Renderer process timeout in seconds (default: 10)
    pub timeout_secs: u64,

    /// How long the render script waits after the page loads, in milliseconds (default: 1000)
    pub wait_ms: u64,

    /// TLS protocol handed to the renderer (default: renderer's choice)
    pub ssl_protocol: Option<SslProtocol>,

    /// Ignore certificate errors such as expired or self-signed certificates (default: true)
    pub ignore_ssl_errors: bool,

    /// Root of the bundled renderer binaries, one sub-directory per platform (default: `bin/`)
    pub bin_dir: PathBuf,

    /// Explicit renderer executable; skips the platform lookup when set
    pub executable: Option<PathBuf>,

    /// Template file replacing the built-in render script
    pub template_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_path: normalize_dir("screenshots"),
            cache_path: normalize_dir(std::env::temp_dir().join("screenshotter")),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            wait_ms: DEFAULT_WAIT_MS,
            ssl_protocol: None,
            ignore_ssl_errors: true,
            bin_dir: normalize_dir("bin"),
            executable: None,
            template_path: None,
        }
    }
}

impl Config {
    /// Both directories should exist and be writeable before the first capture.
    pub fn new(output_path: impl AsRef<Path>, cache_path: impl AsRef<Path>) -> Self {
        let mut config = Self::default();
        config.set_output_path(output_path).set_cache_path(cache_path);
        config
    }

    pub fn set_output_path(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.output_path = normalize_dir(path);
        self
    }

    pub fn set_cache_path(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.cache_path = normalize_dir(path);
        self
    }

    pub fn set_width(&mut self, width: u32) -> &mut Self {
        self.width = width;
        self
    }

    pub fn set_height(&mut self, height: u32) -> &mut Self {
        self.height = height;
        self
    }

    /// Timeout in seconds.
    pub fn set_timeout(&mut self, timeout_secs: u64) -> &mut Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// How long the page gets to settle before the screenshot, in milliseconds.
    pub fn set_wait(&mut self, wait_ms: u64) -> &mut Self {
        self.wait_ms = wait_ms;
        self
    }

    /// Accepts `sslv2`, `sslv3`, `tlsv1` or `any`. Anything else is rejected
    /// and the current setting is kept.
    pub fn set_ssl_protocol(&mut self, protocol: &str) -> Result<&mut Self> {
        let protocol = protocol.parse::<SslProtocol>()?;
        self.ssl_protocol = Some(protocol);
        Ok(self)
    }

    pub fn ignore_ssl_errors(&mut self, ignore: bool) -> &mut Self {
        self.ignore_ssl_errors = ignore;
        self
    }

    pub fn set_bin_dir(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.bin_dir = normalize_dir(path);
        self
    }

    pub fn set_executable(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.executable = Some(path.into());
        self
    }

    pub fn set_template_path(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.template_path = Some(path.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn tls_options(&self) -> TlsOptions {
        TlsOptions {
            protocol: self.ssl_protocol,
            ignore_errors: self.ignore_ssl_errors,
        }
    }

    /// Re-applies directory normalization, for configs that came from a file.
    pub fn normalized(mut self) -> Self {
        self.output_path = normalize_dir(&self.output_path);
        self.cache_path = normalize_dir(&self.cache_path);
        self.bin_dir = normalize_dir(&self.bin_dir);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ScreenshotError::InvalidConfig(
                "Viewport dimensions must be greater than 0".to_string(),
            ));
        }

        if self.timeout_secs == 0 {
            return Err(ScreenshotError::InvalidConfig(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// TLS protocols the renderer understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SslProtocol {
    Sslv2,
    Sslv3,
    Tlsv1,
    Any,
}

impl SslProtocol {
    pub const ALL: [SslProtocol; 4] = [
        SslProtocol::Sslv3,
        SslProtocol::Sslv2,
        SslProtocol::Tlsv1,
        SslProtocol::Any,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SslProtocol::Sslv2 => "sslv2",
            SslProtocol::Sslv3 => "sslv3",
            SslProtocol::Tlsv1 => "tlsv1",
            SslProtocol::Any => "any",
        }
    }
}

impl fmt::Display for SslProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SslProtocol {
    type Err = ScreenshotError;

    fn from_str(s: &str) -> Result<Self> {
        SslProtocol::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = SslProtocol::ALL.iter().map(|p| p.as_str()).collect();
                ScreenshotError::InvalidConfig(format!(
                    "Protocol must be one of {}, got '{s}'",
                    valid.join(", ")
                ))
            })
    }
}

/// TLS flags forwarded to the renderer process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TlsOptions {
    pub protocol: Option<SslProtocol>,
    pub ignore_errors: bool,
}

/// Per-call overrides for [`Screenshotter::capture`](crate::Screenshotter::capture)
///
/// Unset fields fall back to the [`Config`] defaults. The clip rectangle is
/// only applied when both `clip_width` and `clip_height` are set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CaptureOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub clip_width: Option<u32>,
    pub clip_height: Option<u32>,
    pub wait: Option<u64>,
}

/// Clip rectangle anchored at the top-left corner of the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ClipRect {
    pub width: u32,
    pub height: u32,
}

/// Effective parameters for one capture, after defaulting
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderParams {
    pub url: String,
    pub filename: String,
    pub width: u32,
    pub height: u32,
    pub clip: Option<ClipRect>,
    pub wait_ms: u64,
}

impl RenderParams {
    pub fn merge(
        url: impl Into<String>,
        filename: impl Into<String>,
        options: &CaptureOptions,
        config: &Config,
    ) -> Self {
        let clip = match (options.clip_width, options.clip_height) {
            (Some(width), Some(height)) => Some(ClipRect { width, height }),
            _ => None,
        };

        Self {
            url: url.into(),
            filename: filename.into(),
            width: options.width.unwrap_or(config.width),
            height: options.height.unwrap_or(config.height),
            clip,
            wait_ms: options.wait.unwrap_or(config.wait_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.width, 1024);
        assert_eq!(config.height, 768);
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.wait_ms, 1000);
        assert!(config.ssl_protocol.is_none());
        assert!(config.ignore_ssl_errors);
    }

    #[test]
    fn test_ssl_protocol_validation() {
        let mut config = Config::default();
        assert!(config.set_ssl_protocol("sslv3").is_ok());
        assert_eq!(config.ssl_protocol, Some(SslProtocol::Sslv3));

        let err = config.set_ssl_protocol("garbage").unwrap_err();
        assert!(matches!(err, ScreenshotError::InvalidConfig(_)));
        assert_eq!(config.ssl_protocol, Some(SslProtocol::Sslv3));
    }

    #[test]
    fn test_ssl_protocol_parse_is_exact() {
        for name in ["sslv2", "sslv3", "tlsv1", "any"] {
            assert_eq!(name.parse::<SslProtocol>().unwrap().as_str(), name);
        }
        assert!("TLSv1".parse::<SslProtocol>().is_err());
        assert!("".parse::<SslProtocol>().is_err());
    }

    #[test]
    fn test_paths_are_normalized_on_set() {
        let config = Config::new("out", "cache/");
        assert!(config.output_path.to_string_lossy().ends_with(std::path::MAIN_SEPARATOR));
        assert_eq!(config.cache_path, normalize_dir("cache"));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = Config::default();
        config.set_width(0);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.set_timeout(0);
        assert!(config.validate().is_err());

        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_from_json_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"width": 800, "ssl_protocol": "tlsv1"}"#).unwrap();
        assert_eq!(config.width, 800);
        assert_eq!(config.height, DEFAULT_HEIGHT);
        assert_eq!(config.ssl_protocol, Some(SslProtocol::Tlsv1));
        assert!(serde_json::from_str::<Config>(r#"{"ssl_protocol": "tls13"}"#).is_err());
    }

    #[test]
    fn test_merge_overrides_and_clip() {
        let config = Config::default();
        let options = CaptureOptions {
            width: Some(320),
            clip_width: Some(100),
            ..Default::default()
        };

        let params = RenderParams::merge("https://example.com", "a.png", &options, &config);
        assert_eq!(params.width, 320);
        assert_eq!(params.height, DEFAULT_HEIGHT);
        assert_eq!(params.wait_ms, DEFAULT_WAIT_MS);
        assert!(params.clip.is_none());

        let options = CaptureOptions {
            clip_width: Some(100),
            clip_height: Some(50),
            wait: Some(0),
            ..Default::default()
        };
        let params = RenderParams::merge("https://example.com", "a.png", &options, &config);
        assert_eq!(params.clip, Some(ClipRect { width: 100, height: 50 }));
        assert_eq!(params.wait_ms, 0);
    }
}
