//! # Screenshotter
//!
//! Web page screenshots through an external headless renderer (a bundled
//! PhantomJS binary per platform).
//!
//! A capture goes through three steps:
//!
//! 1. The URL and rendering parameters (viewport, optional clip rectangle,
//!    wait time) are merged over the configured defaults and hashed into a
//!    cache key.
//! 2. A render script named after that key is written to the cache directory,
//!    unless it is already there.
//! 3. The renderer runs the script with the destination path as its argument,
//!    bounded by the configured timeout.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use screenshotter::{CaptureOptions, Config, Screenshotter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::new("screenshots", "/tmp/screenshotter");
//!     let screenshotter = Screenshotter::new(config).await?;
//!
//!     let options = CaptureOptions {
//!         clip_width: Some(400),
//!         clip_height: Some(300),
//!         ..Default::default()
//!     };
//!     let path = screenshotter
//!         .capture("https://example.com", "example.png", &options)
//!         .await?;
//!     println!("Screenshot captured: {}", path.display());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! screenshotter --output shots/ capture --url https://example.com --filename example.png
//! screenshotter --output shots/ batch --input urls.txt --concurrency 4
//! ```

/// Configuration, per-call options and render parameters
pub mod config;

/// Error types and error handling utilities
pub mod error;

/// Path normalization and renderer executable lookup
pub mod platform;

/// Render script template expansion
pub mod template;

/// Content-addressed render script cache
pub mod cache;

/// Renderer process invocation
pub mod process;

/// Capture orchestration
pub mod screenshotter;

/// Command-line interface implementation
pub mod cli;

/// Capture metrics
pub mod metrics;

/// Utility functions and helpers
pub mod utils;


pub use crate::cache::*;
pub use crate::cli::*;
pub use crate::config::*;
pub use crate::error::*;
pub use crate::metrics::*;
pub use crate::platform::*;
pub use crate::process::*;
pub use crate::screenshotter::*;
pub use crate::template::*;
pub use crate::utils::*;
