//! Minimal in-memory `Store`, used by the test suite and as a reference for
//! the contract alongside the file-backed WAL store.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use agent_protocol::bookmark::Bookmark;
use agent_protocol::event::{Channel, Envelope};
use agent_protocol::history::{CompressionRecord, HistoryWindow, RecoveredFile};
use agent_protocol::message::Message;
use agent_protocol::snapshot::{AgentInfo, Snapshot};
use agent_protocol::todo::TodoItem;
use agent_protocol::tool_call::ToolCallRecord;

use super::Store;
use crate::error::StoreError;

#[derive(Default)]
struct AgentRecord {
    messages: Vec<Message>,
    tool_call_records: Vec<ToolCallRecord>,
    todos: Vec<TodoItem>,
    events: Vec<Envelope>,
    snapshots: HashMap<String, Snapshot>,
    info: Option<AgentInfo>,
    history_windows: Vec<HistoryWindow>,
    compression_records: Vec<CompressionRecord>,
    recovered_files: Vec<RecoveredFile>,
    media_cache: Value,
}

pub struct MemoryStore {
    agents: Mutex<HashMap<String, AgentRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            agents: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn save_messages(&self, agent_id: &str, messages: &[Message]) -> Result<(), StoreError> {
        let mut agents = self.agents.lock();
        agents.entry(agent_id.to_string()).or_default().messages = messages.to_vec();
        Ok(())
    }

    async fn load_messages(&self, agent_id: &str) -> Result<Vec<Message>, StoreError> {
        Ok(self
            .agents
            .lock()
            .get(agent_id)
            .map(|a| a.messages.clone())
            .unwrap_or_default())
    }

    async fn save_tool_call_records(
        &self,
        agent_id: &str,
        records: &[ToolCallRecord],
    ) -> Result<(), StoreError> {
        let mut agents = self.agents.lock();
        agents.entry(agent_id.to_string()).or_default().tool_call_records = records.to_vec();
        Ok(())
    }

    async fn load_tool_call_records(&self, agent_id: &str) -> Result<Vec<ToolCallRecord>, StoreError> {
        Ok(self
            .agents
            .lock()
            .get(agent_id)
            .map(|a| a.tool_call_records.clone())
            .unwrap_or_default())
    }

    async fn save_todos(&self, agent_id: &str, todos: &[TodoItem]) -> Result<(), StoreError> {
        let mut agents = self.agents.lock();
        agents.entry(agent_id.to_string()).or_default().todos = todos.to_vec();
        Ok(())
    }

    async fn load_todos(&self, agent_id: &str) -> Result<Vec<TodoItem>, StoreError> {
        Ok(self
            .agents
            .lock()
            .get(agent_id)
            .map(|a| a.todos.clone())
            .unwrap_or_default())
    }

    async fn append_event(&self, agent_id: &str, envelope: &Envelope) -> Result<(), StoreError> {
        let mut agents = self.agents.lock();
        agents
            .entry(agent_id.to_string())
            .or_default()
            .events
            .push(envelope.clone());
        Ok(())
    }

    async fn read_events(
        &self,
        agent_id: &str,
        since: Option<Bookmark>,
        channel: Option<Channel>,
    ) -> Result<Vec<Envelope>, StoreError> {
        let agents = self.agents.lock();
        let Some(agent) = agents.get(agent_id) else {
            return Ok(Vec::new());
        };
        Ok(agent
            .events
            .iter()
            .filter(|e| since.map(|s| e.bookmark.seq > s.seq).unwrap_or(true))
            .filter(|e| channel.map(|c| e.event.channel() == c).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn save_snapshot(&self, agent_id: &str, snapshot: &Snapshot) -> Result<(), StoreError> {
        let mut agents = self.agents.lock();
        agents
            .entry(agent_id.to_string())
            .or_default()
            .snapshots
            .insert(snapshot.id.clone(), snapshot.clone());
        Ok(())
    }

    async fn load_snapshot(&self, agent_id: &str, snapshot_id: &str) -> Result<Snapshot, StoreError> {
        self.agents
            .lock()
            .get(agent_id)
            .and_then(|a| a.snapshots.get(snapshot_id).cloned())
            .ok_or_else(|| StoreError::NotFound(format!("snapshot {snapshot_id}")))
    }

    async fn list_snapshots(&self, agent_id: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .agents
            .lock()
            .get(agent_id)
            .map(|a| a.snapshots.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn save_info(&self, agent_id: &str, info: &AgentInfo) -> Result<(), StoreError> {
        let mut agents = self.agents.lock();
        agents.entry(agent_id.to_string()).or_default().info = Some(info.clone());
        Ok(())
    }

    async fn load_info(&self, agent_id: &str) -> Result<AgentInfo, StoreError> {
        self.agents
            .lock()
            .get(agent_id)
            .and_then(|a| a.info.clone())
            .ok_or_else(|| StoreError::NotFound(format!("info for {agent_id}")))
    }

    async fn exists(&self, agent_id: &str) -> Result<bool, StoreError> {
        Ok(self.agents.lock().contains_key(agent_id))
    }

    async fn delete(&self, agent_id: &str) -> Result<(), StoreError> {
        self.agents.lock().remove(agent_id);
        Ok(())
    }

    async fn list(&self, prefix: Option<&str>) -> Result<Vec<String>, StoreError> {
        Ok(self
            .agents
            .lock()
            .keys()
            .filter(|id| prefix.map(|p| id.starts_with(p)).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn save_history_window(&self, agent_id: &str, window: &HistoryWindow) -> Result<(), StoreError> {
        let mut agents = self.agents.lock();
        agents
            .entry(agent_id.to_string())
            .or_default()
            .history_windows
            .push(window.clone());
        Ok(())
    }

    async fn load_history_windows(&self, agent_id: &str) -> Result<Vec<HistoryWindow>, StoreError> {
        Ok(self
            .agents
            .lock()
            .get(agent_id)
            .map(|a| a.history_windows.clone())
            .unwrap_or_default())
    }

    async fn save_compression_record(
        &self,
        agent_id: &str,
        record: &CompressionRecord,
    ) -> Result<(), StoreError> {
        let mut agents = self.agents.lock();
        agents
            .entry(agent_id.to_string())
            .or_default()
            .compression_records
            .push(record.clone());
        Ok(())
    }

    async fn load_compression_records(
        &self,
        agent_id: &str,
    ) -> Result<Vec<CompressionRecord>, StoreError> {
        Ok(self
            .agents
            .lock()
            .get(agent_id)
            .map(|a| a.compression_records.clone())
            .unwrap_or_default())
    }

    async fn save_recovered_file(&self, agent_id: &str, file: &RecoveredFile) -> Result<(), StoreError> {
        let mut agents = self.agents.lock();
        agents
            .entry(agent_id.to_string())
            .or_default()
            .recovered_files
            .push(file.clone());
        Ok(())
    }

    async fn load_recovered_files(&self, agent_id: &str) -> Result<Vec<RecoveredFile>, StoreError> {
        Ok(self
            .agents
            .lock()
            .get(agent_id)
            .map(|a| a.recovered_files.clone())
            .unwrap_or_default())
    }

    async fn save_media_cache(&self, agent_id: &str, cache: &Value) -> Result<(), StoreError> {
        let mut agents = self.agents.lock();
        agents.entry(agent_id.to_string()).or_default().media_cache = cache.clone();
        Ok(())
    }

    async fn load_media_cache(&self, agent_id: &str) -> Result<Value, StoreError> {
        Ok(self
            .agents
            .lock()
            .get(agent_id)
            .map(|a| a.media_cache.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_protocol::message::Role;

    #[tokio::test]
    async fn round_trips_messages() {
        let store = MemoryStore::new();
        let messages = vec![Message::text(Role::User, "hi")];
        store.save_messages("agent-1", &messages).await.unwrap();
        let loaded = store.load_messages("agent-1").await.unwrap();
        assert_eq!(loaded.len(), 1);
    }

    #[tokio::test]
    async fn read_events_filters_by_since_and_channel() {
        use agent_protocol::event::{Event, ProgressEventKind};

        let store = MemoryStore::new();
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
        assert!(events.iter().all(|e| e.bookmark.seq > 1));
    }
}
