use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type Result<T, E = ScreenshotError> = std::result::Result<T, E>;

#[derive(Debug, Clone, Error)]
pub enum ScreenshotError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("Unsupported platform: {os} ({pointer_width}-bit)")]
    UnsupportedPlatform { os: String, pointer_width: u32 },

    #[error(
        "Cache path {} is invalid. Check that the provided cache path is correct, exists and is writeable",
        .0.display()
    )]
    CacheDirInvalid(PathBuf),

    #[error("Couldn't write the job file {}: {message}", .path.display())]
    CacheWrite { path: PathBuf, message: String },

    #[error("Template error: {0}")]
    Template(String),

    #[error("Renderer timed out after {0:?}")]
    ProcessTimeout(Duration),

    #[error("Renderer failed (exit code {}): {stderr}", display_exit_code(.exit_code))]
    ProcessFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl ScreenshotError {
    /// Errors worth retrying as-is, or with a larger timeout.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScreenshotError::ProcessTimeout(_) | ScreenshotError::ProcessFailed { .. }
        )
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ScreenshotError::InvalidUrl(_) | ScreenshotError::InvalidFilename(_) => ErrorSeverity::Low,
            ScreenshotError::InvalidConfig(_) => ErrorSeverity::High,
            ScreenshotError::UnsupportedPlatform { .. } => ErrorSeverity::Critical,
            ScreenshotError::CacheDirInvalid(_) => ErrorSeverity::High,
            ScreenshotError::Template(_) => ErrorSeverity::High,
            ScreenshotError::ProcessTimeout(_) => ErrorSeverity::Low,
            _ => ErrorSeverity::Medium,
        }
    }
}

fn display_exit_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "none".to_string(), |c| c.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl From<std::io::Error> for ScreenshotError {
    fn from(err: std::io::Error) -> Self {
        ScreenshotError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for ScreenshotError {
    fn from(err: serde_json::Error) -> Self {
        ScreenshotError::SerializationError(err.to_string())
    }
}

impl From<tera::Error> for ScreenshotError {
    fn from(err: tera::Error) -> Self {
        // Tera keeps the useful detail (line, missing variable) in the source chain.
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(inner) = source {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            source = inner.source();
        }
        ScreenshotError::Template(message)
    }
}
