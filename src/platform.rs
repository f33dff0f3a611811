//! Path normalization and renderer executable lookup
//!
//! The renderer ships as one pre-built binary per platform, laid out as
//! `<bin_dir>/<platform tag>/phantomjs[.exe]`.

use crate::config::Config;
use crate::error::{Result, ScreenshotError};
use std::fmt;
use std::path::{Path, PathBuf, MAIN_SEPARATOR, MAIN_SEPARATOR_STR};
use tracing::debug;

const EXECUTABLE_STEM: &str = "phantomjs";

/// Returns `path` with exactly one trailing separator.
///
/// ```rust
/// use screenshotter::normalize_dir;
///
/// assert_eq!(normalize_dir("a/b"), normalize_dir("a/b/"));
/// assert_eq!(normalize_dir("a/b"), normalize_dir(normalize_dir("a/b")));
/// ```
pub fn normalize_dir(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();

    match path.to_str() {
        Some("") => PathBuf::from(format!(".{MAIN_SEPARATOR}")),
        Some(raw) => {
            let trimmed = raw.trim_end_matches(|c: char| c == '/' || c == MAIN_SEPARATOR);
            PathBuf::from(format!("{trimmed}{MAIN_SEPARATOR}"))
        }
        None => {
            // Non UTF-8 paths are left as-is apart from the separator.
            let mut os = path.as_os_str().to_owned();
            os.push(MAIN_SEPARATOR_STR);
            PathBuf::from(os)
        }
    }
}

/// Platforms a bundled renderer binary exists for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOsX,
    Windows,
    LinuxI686,
    LinuxX86_64,
}

impl Platform {
    /// The platform this process is running on.
    pub fn detect() -> Result<Self> {
        Self::from_parts(std::env::consts::OS, usize::BITS)
    }

    /// Maps an OS name (as in `std::env::consts::OS`) and pointer width to a platform.
    pub fn from_parts(os: &str, pointer_width: u32) -> Result<Self> {
        match (os, pointer_width) {
            ("macos" | "darwin", _) => Ok(Platform::MacOsX),
            ("windows", _) => Ok(Platform::Windows),
            ("linux", 32) => Ok(Platform::LinuxI686),
            ("linux", 64) => Ok(Platform::LinuxX86_64),
            _ => Err(ScreenshotError::UnsupportedPlatform {
                os: os.to_string(),
                pointer_width,
            }),
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Platform::MacOsX => "macosx",
            Platform::Windows => "windows",
            Platform::LinuxI686 => "linux-i686",
            Platform::LinuxX86_64 => "linux-x86_64",
        }
    }

    pub fn executable_extension(&self) -> &'static str {
        match self {
            Platform::Windows => ".exe",
            _ => "",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

pub fn resolve_executable(bin_dir: &Path, platform: Platform) -> PathBuf {
    bin_dir.join(platform.tag()).join(format!(
        "{EXECUTABLE_STEM}{}",
        platform.executable_extension()
    ))
}

/// The executable a capture should launch: the configured override, or the
/// bundled binary for the host platform.
pub fn executable_for(config: &Config) -> Result<PathBuf> {
    if let Some(executable) = &config.executable {
        return Ok(executable.clone());
    }

    let platform = Platform::detect()?;
    let path = resolve_executable(&config.bin_dir, platform);
    debug!("Resolved renderer for {}: {}", platform, path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_normalize_dir_trailing_slash() {
        assert_eq!(normalize_dir("a/b"), PathBuf::from("a/b/"));
        assert_eq!(normalize_dir("a/b/"), PathBuf::from("a/b/"));
        assert_eq!(normalize_dir("a/b///"), PathBuf::from("a/b/"));
        assert_eq!(normalize_dir("/"), PathBuf::from("/"));
        assert_eq!(normalize_dir(""), PathBuf::from("./"));
    }

    #[test]
    fn test_normalize_dir_is_idempotent() {
        let once = normalize_dir("some/dir");
        assert_eq!(normalize_dir(&once), once);
    }

    #[test]
    fn test_platform_lookup() {
        assert_eq!(Platform::from_parts("macos", 64).unwrap(), Platform::MacOsX);
        assert_eq!(Platform::from_parts("darwin", 64).unwrap(), Platform::MacOsX);
        assert_eq!(Platform::from_parts("windows", 64).unwrap(), Platform::Windows);
        assert_eq!(Platform::from_parts("linux", 32).unwrap(), Platform::LinuxI686);
        assert_eq!(Platform::from_parts("linux", 64).unwrap(), Platform::LinuxX86_64);
    }

    #[test]
    fn test_unsupported_platform() {
        let err = Platform::from_parts("freebsd", 64).unwrap_err();
        assert!(matches!(
            err,
            ScreenshotError::UnsupportedPlatform { ref os, pointer_width: 64 } if os == "freebsd"
        ));
        assert!(Platform::from_parts("linux", 16).is_err());
    }

    #[test]
    fn test_resolve_executable() {
        let bin = Path::new("bin");
        assert_eq!(
            resolve_executable(bin, Platform::Windows),
            bin.join("windows").join("phantomjs.exe")
        );
        assert_eq!(
            resolve_executable(bin, Platform::LinuxX86_64),
            bin.join("linux-x86_64").join("phantomjs")
        );
        assert_eq!(
            resolve_executable(bin, Platform::MacOsX),
            bin.join("macosx").join("phantomjs")
        );
    }

    #[test]
    fn test_executable_override_skips_lookup() {
        let mut config = Config::default();
        config.set_executable("/opt/renderer/phantomjs");
        assert_eq!(
            executable_for(&config).unwrap(),
            PathBuf::from("/opt/renderer/phantomjs")
        );
    }
}
