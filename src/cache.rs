//! Content-addressed render script cache
//!
//! Every distinct set of [`RenderParams`] maps to one script file named after
//! its [`CacheKey`]. A script that already exists is trusted as-is: the key is
//! the only thing that decides whether a script can be reused.

use crate::config::RenderParams;
use crate::error::{Result, ScreenshotError};
use crate::template::TemplateRenderer;
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const ARTIFACT_EXTENSION: &str = "js";
const FIELD_DELIMITER: &str = "|";

/// Deterministic digest over a full parameter set
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// SHA-256 over the URL followed by every parameter as `name=value`,
    /// ordered by name descending and joined with `|`.
    pub fn derive(params: &RenderParams) -> Self {
        let mut fields: Vec<(&str, String)> = vec![
            ("url", params.url.clone()),
            ("filename", params.filename.clone()),
            ("width", params.width.to_string()),
            ("height", params.height.to_string()),
            ("wait", params.wait_ms.to_string()),
        ];
        if let Some(clip) = params.clip {
            fields.push(("clip_width", clip.width.to_string()));
            fields.push(("clip_height", clip.height.to_string()));
        }
        fields.sort_by(|a, b| b.0.cmp(a.0));

        let joined = fields
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join(FIELD_DELIMITER);

        let mut hasher = Sha256::new();
        hasher.update(params.url.as_bytes());
        hasher.update(joined.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A render script on disk, and whether it was already there
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedArtifact {
    pub key: CacheKey,
    pub path: PathBuf,
    pub cache_hit: bool,
}

pub struct JobCache {
    cache_dir: PathBuf,
    renderer: TemplateRenderer,
}

impl JobCache {
    pub fn new(cache_dir: impl Into<PathBuf>, renderer: TemplateRenderer) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            renderer,
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn artifact_path(&self, key: &CacheKey) -> PathBuf {
        self.cache_dir
            .join(format!("{}.{}", key.as_str(), ARTIFACT_EXTENSION))
    }

    /// Returns the script for `params`, writing it first if it does not exist.
    pub async fn get_or_create(&self, params: &RenderParams) -> Result<CachedArtifact> {
        let key = CacheKey::derive(params);
        let path = self.artifact_path(&key);

        let exists = match tokio::fs::try_exists(&path).await {
            Ok(exists) => exists,
            Err(e) => {
                debug!("Cannot stat render script {}: {}", path.display(), e);
                false
            }
        };
        if exists {
            debug!("Render script cache hit: {}", path.display());
            return Ok(CachedArtifact {
                key,
                path,
                cache_hit: true,
            });
        }

        let script = self.renderer.render(params)?;
        self.write_atomic(&path, script.as_bytes()).await?;
        info!("Created render script {} for {}", path.display(), params.url);

        Ok(CachedArtifact {
            key,
            path,
            cache_hit: false,
        })
    }

    /// Writes to a unique sibling temp file and renames it into place, so a
    /// concurrent reader never sees a half-written script.
    async fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()> {
        match tokio::fs::metadata(&self.cache_dir).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(ScreenshotError::CacheDirInvalid(self.cache_dir.clone())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ScreenshotError::CacheDirInvalid(self.cache_dir.clone()))
            }
            Err(e) => return Err(cache_write_error(path, e)),
        }

        let tmp_path = path.with_extension(format!(
            "{ARTIFACT_EXTENSION}.{}.tmp",
            uuid::Uuid::new_v4().simple()
        ));

        if let Err(e) = tokio::fs::write(&tmp_path, contents).await {
            return Err(cache_write_error(path, e));
        }

        if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(cache_write_error(path, e));
        }

        Ok(())
    }
}

fn cache_write_error(path: &Path, err: std::io::Error) -> ScreenshotError {
    ScreenshotError::CacheWrite {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}
