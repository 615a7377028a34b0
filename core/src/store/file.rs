//! File-backed WAL store (§4.9, reference implementation).
//!
//! Layout per agent:
//! ```text
//! {base_dir}/{agent_id}/
//!   runtime/{messages,tool-calls,todos,media-cache}.json (+ .wal while in flight)
//!   events/{progress,control,monitor}.log (+ .wal mirror of unflushed entries)
//!   history/{windows,compressions,recovered}/*.json
//!   snapshots/{snapshot_id}.json
//!   meta.json
//! ```
//! Every runtime-state save writes the WAL file then atomically renames it
//! onto the canonical path (the rename itself retires the WAL). Event
//! appends are written immediately rather than batched on a timer — batching
//! only changes I/O count, not the FIFO-per-(agent,channel) ordering
//! guarantee §5 actually requires, so it is traded away here for a much
//! simpler implementation (see DESIGN.md).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::fs;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{instrument, warn};

use agent_protocol::bookmark::Bookmark;
use agent_protocol::event::{Channel, Envelope};
use agent_protocol::history::{CompressionRecord, HistoryWindow, RecoveredFile};
use agent_protocol::message::Message;
use agent_protocol::snapshot::{AgentInfo, Snapshot};
use agent_protocol::todo::TodoItem;
use agent_protocol::tool_call::ToolCallRecord;

use super::Store;
use crate::error::StoreError;

pub struct FileStore {
    base_dir: PathBuf,
    locks: DashMap<String, Arc<AsyncMutex<()>>>,
}

impl FileStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            locks: DashMap::new(),
        }
    }

    fn agent_dir(&self, agent_id: &str) -> PathBuf {
        self.base_dir.join(agent_id)
    }

    fn runtime_path(&self, agent_id: &str, name: &str) -> PathBuf {
        self.agent_dir(agent_id).join("runtime").join(format!("{name}.json"))
    }

    fn events_log_path(&self, agent_id: &str, channel: Channel) -> PathBuf {
        self.agent_dir(agent_id)
            .join("events")
            .join(format!("{}.log", channel_name(channel)))
    }

    fn lock_for(&self, key: &str) -> Arc<AsyncMutex<()>> {
        self.locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Write-ahead-log then atomic rename onto `path`.
    async fn save_atomic<T: Serialize + Sync>(&self, path: &Path, value: &T) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let wal_path = wal_path_for(path);
        let bytes = serde_json::to_vec_pretty(value)?;
        fs::write(&wal_path, &bytes).await?;
        fs::rename(&wal_path, path).await?;
        Ok(())
    }

    /// Loads `path`, falling back to a leftover WAL (a crash before the
    /// rename completed) and renaming corrupted WALs aside.
    async fn load_atomic<T: DeserializeOwned + Default>(&self, path: &Path) -> Result<T, StoreError> {
        if let Ok(bytes) = fs::read(path).await {
            return serde_json::from_slice(&bytes).map_err(StoreError::from);
        }
        let wal_path = wal_path_for(path);
        match fs::read(&wal_path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(value) => Ok(value),
                Err(_) => {
                    let corrupted = wal_path.with_extension("wal.corrupted");
                    let _ = fs::rename(&wal_path, &corrupted).await;
                    warn!(path = ?wal_path, "corrupted WAL renamed aside");
                    Ok(T::default())
                }
            },
            Err(_) => Ok(T::default()),
        }
    }

    /// Scans every agent directory and replays any leftover `.wal` files:
    /// JSON WALs rehydrate the canonical file, event-log WALs are appended
    /// to the canonical log. Call once at process start.
    #[instrument(name = "file_store.recover", skip(self))]
    pub async fn recover(&self) -> Result<(), StoreError> {
        let Ok(mut agent_dirs) = fs::read_dir(&self.base_dir).await else {
            return Ok(());
        };
        while let Some(entry) = agent_dirs.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            self.recover_agent_dir(&entry.path()).await?;
        }
        Ok(())
    }

    async fn recover_agent_dir(&self, agent_dir: &Path) -> Result<(), StoreError> {
        for sub in ["runtime", "events"] {
            let dir = agent_dir.join(sub);
            let Ok(mut entries) = fs::read_dir(&dir).await else {
                continue;
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("wal") {
                    continue;
                }
                let canonical = path.with_extension("");
                match fs::read(&path).await {
                    Ok(bytes) if serde_json::from_slice::<Value>(&bytes).is_ok() || sub == "events" => {
                        fs::rename(&path, &canonical).await?;
                    }
                    _ => {
                        let corrupted = path.with_extension("wal.corrupted");
                        let _ = fs::rename(&path, &corrupted).await;
                    }
                }
            }
        }
        Ok(())
    }
}

fn wal_path_for(path: &Path) -> PathBuf {
    let mut wal = path.as_os_str().to_owned();
    wal.push(".wal");
    PathBuf::from(wal)
}

fn channel_name(channel: Channel) -> &'static str {
    match channel {
        Channel::Progress => "progress",
        Channel::Control => "control",
        Channel::Monitor => "monitor",
    }
}

#[async_trait]
impl Store for FileStore {
    async fn save_messages(&self, agent_id: &str, messages: &[Message]) -> Result<(), StoreError> {
        let lock = self.lock_for(&format!("{agent_id}:messages"));
        let _guard = lock.lock().await;
        self.save_atomic(&self.runtime_path(agent_id, "messages"), &messages.to_vec())
            .await
    }

    async fn load_messages(&self, agent_id: &str) -> Result<Vec<Message>, StoreError> {
        self.load_atomic(&self.runtime_path(agent_id, "messages")).await
    }

    async fn save_tool_call_records(
        &self,
        agent_id: &str,
        records: &[ToolCallRecord],
    ) -> Result<(), StoreError> {
        let lock = self.lock_for(&format!("{agent_id}:tool-calls"));
        let _guard = lock.lock().await;
        self.save_atomic(&self.runtime_path(agent_id, "tool-calls"), &records.to_vec())
            .await
    }

    async fn load_tool_call_records(&self, agent_id: &str) -> Result<Vec<ToolCallRecord>, StoreError> {
        self.load_atomic(&self.runtime_path(agent_id, "tool-calls")).await
    }

    async fn save_todos(&self, agent_id: &str, todos: &[TodoItem]) -> Result<(), StoreError> {
        let lock = self.lock_for(&format!("{agent_id}:todos"));
        let _guard = lock.lock().await;
        self.save_atomic(&self.runtime_path(agent_id, "todos"), &todos.to_vec())
            .await
    }

    async fn load_todos(&self, agent_id: &str) -> Result<Vec<TodoItem>, StoreError> {
        self.load_atomic(&self.runtime_path(agent_id, "todos")).await
    }

    #[instrument(name = "file_store.append_event", skip(self, envelope))]
    async fn append_event(&self, agent_id: &str, envelope: &Envelope) -> Result<(), StoreError> {
        let channel = envelope.event.channel();
        let lock = self.lock_for(&format!("{agent_id}:events:{}", channel_name(channel)));
        let _guard = lock.lock().await;

        let path = self.events_log_path(agent_id, channel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let wal_path = wal_path_for(&path);
        let mut line = serde_json::to_vec(envelope)?;
        line.push(b'\n');
        fs::write(&wal_path, &line).await?;

        use tokio::io::AsyncWriteExt;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        let _ = fs::remove_file(&wal_path).await;
        Ok(())
    }

    async fn read_events(
        &self,
        agent_id: &str,
        since: Option<Bookmark>,
        channel: Option<Channel>,
    ) -> Result<Vec<Envelope>, StoreError> {
        let channels = match channel {
            Some(c) => vec![c],
            None => vec![Channel::Progress, Channel::Control, Channel::Monitor],
        };
        let mut all = Vec::new();
        for channel in channels {
            let path = self.events_log_path(agent_id, channel);
            let Ok(bytes) = fs::read(&path).await else {
                continue;
            };
            for line in String::from_utf8_lossy(&bytes).lines() {
                if line.trim().is_empty() {
                    continue;
                }
                let envelope: Envelope = serde_json::from_str(line)?;
                if since.map(|s| envelope.bookmark.seq > s.seq).unwrap_or(true) {
                    all.push(envelope);
                }
            }
        }
        all.sort_by_key(|e| e.bookmark.seq);
        Ok(all)
    }

    async fn save_snapshot(&self, agent_id: &str, snapshot: &Snapshot) -> Result<(), StoreError> {
        let path = self
            .agent_dir(agent_id)
            .join("snapshots")
            .join(format!("{}.json", snapshot.id));
        self.save_atomic(&path, snapshot).await
    }

    async fn load_snapshot(&self, agent_id: &str, snapshot_id: &str) -> Result<Snapshot, StoreError> {
        let path = self
            .agent_dir(agent_id)
            .join("snapshots")
            .join(format!("{snapshot_id}.json"));
        let bytes = fs::read(&path)
            .await
            .map_err(|_| StoreError::NotFound(format!("snapshot {snapshot_id}")))?;
        serde_json::from_slice(&bytes).map_err(StoreError::from)
    }

    async fn list_snapshots(&self, agent_id: &str) -> Result<Vec<String>, StoreError> {
        let dir = self.agent_dir(agent_id).join("snapshots");
        let Ok(mut entries) = fs::read_dir(&dir).await else {
            return Ok(Vec::new());
        };
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        Ok(ids)
    }

    async fn save_info(&self, agent_id: &str, info: &AgentInfo) -> Result<(), StoreError> {
        let path = self.agent_dir(agent_id).join("meta.json");
        self.save_atomic(&path, info).await
    }

    async fn load_info(&self, agent_id: &str) -> Result<AgentInfo, StoreError> {
        let path = self.agent_dir(agent_id).join("meta.json");
        let bytes = fs::read(&path)
            .await
            .map_err(|_| StoreError::NotFound(format!("info for {agent_id}")))?;
        serde_json::from_slice(&bytes).map_err(StoreError::from)
    }

    async fn exists(&self, agent_id: &str) -> Result<bool, StoreError> {
        Ok(fs::metadata(self.agent_dir(agent_id)).await.is_ok())
    }

    async fn delete(&self, agent_id: &str) -> Result<(), StoreError> {
        let dir = self.agent_dir(agent_id);
        if fs::metadata(&dir).await.is_ok() {
            fs::remove_dir_all(&dir).await?;
        }
        Ok(())
    }

    async fn list(&self, prefix: Option<&str>) -> Result<Vec<String>, StoreError> {
        let Ok(mut entries) = fs::read_dir(&self.base_dir).await else {
            return Ok(Vec::new());
        };
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if prefix.map(|p| name.starts_with(p)).unwrap_or(true) {
                    ids.push(name.to_string());
                }
            }
        }
        Ok(ids)
    }

    async fn save_history_window(&self, agent_id: &str, window: &HistoryWindow) -> Result<(), StoreError> {
        let path = self
            .agent_dir(agent_id)
            .join("history/windows")
            .join(format!("{}.json", window.id));
        self.save_atomic(&path, window).await
    }

    async fn load_history_windows(&self, agent_id: &str) -> Result<Vec<HistoryWindow>, StoreError> {
        self.load_json_dir(&self.agent_dir(agent_id).join("history/windows")).await
    }

    async fn save_compression_record(
        &self,
        agent_id: &str,
        record: &CompressionRecord,
    ) -> Result<(), StoreError> {
        let path = self
            .agent_dir(agent_id)
            .join("history/compressions")
            .join(format!("{}.json", record.id));
        self.save_atomic(&path, record).await
    }

    async fn load_compression_records(
        &self,
        agent_id: &str,
    ) -> Result<Vec<CompressionRecord>, StoreError> {
        self.load_json_dir(&self.agent_dir(agent_id).join("history/compressions"))
            .await
    }

    async fn save_recovered_file(&self, agent_id: &str, file: &RecoveredFile) -> Result<(), StoreError> {
        let path = self
            .agent_dir(agent_id)
            .join("history/recovered")
            .join(format!("{}.json", file.id));
        self.save_atomic(&path, file).await
    }

    async fn load_recovered_files(&self, agent_id: &str) -> Result<Vec<RecoveredFile>, StoreError> {
        self.load_json_dir(&self.agent_dir(agent_id).join("history/recovered"))
            .await
    }

    async fn save_media_cache(&self, agent_id: &str, cache: &Value) -> Result<(), StoreError> {
        self.save_atomic(&self.runtime_path(agent_id, "media-cache"), cache).await
    }

    async fn load_media_cache(&self, agent_id: &str) -> Result<Value, StoreError> {
        self.load_atomic(&self.runtime_path(agent_id, "media-cache")).await
    }
}

impl FileStore {
    async fn load_json_dir<T: DeserializeOwned>(&self, dir: &Path) -> Result<Vec<T>, StoreError> {
        let Ok(mut entries) = fs::read_dir(dir).await else {
            return Ok(Vec::new());
        };
        let mut items: Vec<(PathBuf, T)> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = fs::read(&path).await?;
            let value: T = serde_json::from_slice(&bytes)?;
            items.push((path, value));
        }
        items.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(items.into_iter().map(|(_, v)| v).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_protocol::message::Role;

    #[tokio::test]
    async fn round_trips_messages_through_wal_rename() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let messages = vec![Message::text(Role::User, "hello")];
        store.save_messages("agent-1", &messages).await.unwrap();
        let loaded = store.load_messages("agent-1").await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(!wal_path_for(&store.runtime_path("agent-1", "messages")).exists());
    }

    #[tokio::test]
    async fn wal_left_behind_by_a_simulated_crash_is_recovered() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let path = store.runtime_path("agent-1", "messages");
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        let messages = vec![Message::text(Role::User, "recovered")];
        let bytes = serde_json::to_vec(&messages).unwrap();
        tokio::fs::write(wal_path_for(&path), &bytes).await.unwrap();

        store.recover().await.unwrap();
        let loaded = store.load_messages("agent-1").await.unwrap();
        assert_eq!(loaded.len(), 1);
    }

    #[tokio::test]
    async fn events_append_in_order_and_filter_by_since() {
        use agent_protocol::event::{Event, ProgressEventKind};

        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        for seq in 1..=3u64 {
            let envelope = Envelope {
                cursor: seq,
                bookmark: Bookmark::new(seq),
                event: Event::Progress(ProgressEventKind::ThinkChunkStart),
            };
            store.append_event("agent-1", &envelope).await.unwrap();
        }
        let events = store
            .read_events("agent-1", Some(Bookmark::new(1)), Some(Channel::Progress))
            .await
            .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].bookmark.seq, 2);
        assert_eq!(events[1].bookmark.seq, 3);
    }
}
