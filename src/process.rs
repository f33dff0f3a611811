//! Renderer process invocation
//!
//! Arguments are assembled as a list and passed straight to the child, so
//! URLs and paths containing spaces or shell metacharacters are never
//! reinterpreted by a shell.

use crate::config::TlsOptions;
use crate::error::{Result, ScreenshotError};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

/// A fully resolved renderer command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub timeout: Duration,
}

impl Invocation {
    /// `program [--ssl-protocol=<p>] [--ignore-ssl-errors=true] <artifact> <destination>`
    pub fn new(
        program: impl Into<PathBuf>,
        tls: &TlsOptions,
        artifact: &Path,
        destination: &Path,
        timeout: Duration,
    ) -> Self {
        let mut args = tls_args(tls);
        args.push(artifact.as_os_str().to_owned());
        args.push(destination.as_os_str().to_owned());

        Self {
            program: program.into(),
            args,
            timeout,
        }
    }
}

pub fn tls_args(tls: &TlsOptions) -> Vec<OsString> {
    let mut args = Vec::new();

    if let Some(protocol) = tls.protocol {
        args.push(OsString::from(format!("--ssl-protocol={protocol}")));
    }

    if tls.ignore_errors {
        args.push(OsString::from("--ignore-ssl-errors=true"));
    }

    args
}

/// Runs a renderer [`Invocation`] to completion
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<()>;
}

/// Launches the renderer as a child process and waits for it, killing it
/// once the invocation's timeout elapses.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, invocation: &Invocation) -> Result<()> {
        let start = Instant::now();
        debug!(
            "Launching {} {:?}",
            invocation.program.display(),
            invocation.args
        );

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ScreenshotError::ProcessFailed {
                exit_code: None,
                stderr: format!("failed to launch {}: {e}", invocation.program.display()),
            })?;

        let mut stdout = child.stdout.take().map(drain);
        let mut stderr = child.stderr.take().map(drain);

        // The deadline covers draining too: a descendant that inherited the
        // pipes keeps them open after the renderer itself exits.
        let waited = timeout(invocation.timeout, async {
            let status = child.wait().await;
            let out = collect(stdout.as_mut()).await;
            let err = collect(stderr.as_mut()).await;
            (status, out, err)
        })
        .await;

        let (status, stdout, stderr) = match waited {
            Ok((Ok(status), out, err)) => (status, out, err),
            Ok((Err(e), _, _)) => {
                return Err(ScreenshotError::ProcessFailed {
                    exit_code: None,
                    stderr: e.to_string(),
                })
            }
            Err(_) => {
                warn!(
                    "Renderer exceeded {:?}, killing pid {:?}",
                    invocation.timeout,
                    child.id()
                );
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill renderer: {}", e);
                }
                abort(stdout);
                abort(stderr);
                return Err(ScreenshotError::ProcessTimeout(invocation.timeout));
            }
        };

        if !stdout.is_empty() {
            debug!("Renderer output: {}", stdout.trim_end());
        }

        if !status.success() {
            return Err(ScreenshotError::ProcessFailed {
                exit_code: status.code(),
                stderr: stderr.trim_end().to_string(),
            });
        }

        debug!("Renderer finished in {:?}", start.elapsed());
        Ok(())
    }
}

fn drain<R>(mut reader: R) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf).await;
        String::from_utf8_lossy(&buf).into_owned()
    })
}

async fn collect(handle: Option<&mut JoinHandle<String>>) -> String {
    match handle {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    }
}

fn abort(handle: Option<JoinHandle<String>>) {
    if let Some(handle) = handle {
        handle.abort();
    }
}
