//! Abstract filesystem/process collaborator (§1 Non-goals: the concrete
//! backend is out of scope). The runtime only ever calls through this trait,
//! never a concrete filesystem type, so a real sandboxed backend can be
//! swapped in without touching the agent loop.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SandboxError {
    #[error("path escapes sandbox root: {0}")]
    PathEscape(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("watching is not supported by this sandbox")]
    WatchUnsupported,
}

/// A filesystem change observed by a sandbox watcher (§4.12).
#[derive(Debug, Clone)]
pub struct FileChange {
    pub path: PathBuf,
    pub mtime_unix_ms: i64,
}

#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Resolves `path` relative to the sandbox root, rejecting escapes.
    fn canonicalize(&self, path: &Path) -> Result<PathBuf, SandboxError>;

    async fn read(&self, path: &Path) -> Result<Vec<u8>, SandboxError>;

    async fn write(&self, path: &Path, contents: &[u8]) -> Result<(), SandboxError>;

    /// Current mtime of `path`, in milliseconds since the epoch.
    async fn mtime_unix_ms(&self, path: &Path) -> Result<i64, SandboxError>;

    /// Registers a watcher invoking `on_change` whenever `path` changes on
    /// disk. Returns `WatchUnsupported` if the backend cannot watch.
    async fn watch(
        &self,
        path: &Path,
        on_change: Box<dyn Fn(FileChange) + Send + Sync>,
    ) -> Result<(), SandboxError>;
}

/// A `Sandbox` with no backing filesystem, for unit tests that only need the
/// trait's shape satisfied.
pub struct NullSandbox;

#[async_trait]
impl Sandbox for NullSandbox {
    fn canonicalize(&self, path: &Path) -> Result<PathBuf, SandboxError> {
        Ok(path.to_path_buf())
    }

    async fn read(&self, _path: &Path) -> Result<Vec<u8>, SandboxError> {
        Ok(Vec::new())
    }

    async fn write(&self, _path: &Path, _contents: &[u8]) -> Result<(), SandboxError> {
        Ok(())
    }

    async fn mtime_unix_ms(&self, _path: &Path) -> Result<i64, SandboxError> {
        Ok(0)
    }

    async fn watch(
        &self,
        _path: &Path,
        _on_change: Box<dyn Fn(FileChange) + Send + Sync>,
    ) -> Result<(), SandboxError> {
        Err(SandboxError::WatchUnsupported)
    }
}
