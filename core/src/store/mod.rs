//! Durable backend contract (§4.9), plus two implementations: an in-memory
//! reference (`memory`) and a file-backed WAL store (`file`) grounded on the
//! teacher's `session/store.rs` `SessionStore` trait.

pub mod file;
pub mod memory;

use async_trait::async_trait;
use serde_json::Value;

use agent_protocol::bookmark::Bookmark;
use agent_protocol::event::{Channel, Envelope};
use agent_protocol::history::{CompressionRecord, HistoryWindow, RecoveredFile};
use agent_protocol::message::Message;
use agent_protocol::snapshot::{AgentInfo, Snapshot};
use agent_protocol::todo::TodoItem;
use agent_protocol::tool_call::ToolCallRecord;

use crate::error::StoreError;

#[async_trait]
pub trait Store: Send + Sync {
    async fn save_messages(&self, agent_id: &str, messages: &[Message]) -> Result<(), StoreError>;
    async fn load_messages(&self, agent_id: &str) -> Result<Vec<Message>, StoreError>;

    async fn save_tool_call_records(
        &self,
        agent_id: &str,
        records: &[ToolCallRecord],
    ) -> Result<(), StoreError>;
    async fn load_tool_call_records(&self, agent_id: &str) -> Result<Vec<ToolCallRecord>, StoreError>;

    async fn save_todos(&self, agent_id: &str, todos: &[TodoItem]) -> Result<(), StoreError>;
    async fn load_todos(&self, agent_id: &str) -> Result<Vec<TodoItem>, StoreError>;

    async fn append_event(&self, agent_id: &str, envelope: &Envelope) -> Result<(), StoreError>;
    async fn read_events(
        &self,
        agent_id: &str,
        since: Option<Bookmark>,
        channel: Option<Channel>,
    ) -> Result<Vec<Envelope>, StoreError>;

    async fn save_snapshot(&self, agent_id: &str, snapshot: &Snapshot) -> Result<(), StoreError>;
    async fn load_snapshot(&self, agent_id: &str, snapshot_id: &str) -> Result<Snapshot, StoreError>;
    async fn list_snapshots(&self, agent_id: &str) -> Result<Vec<String>, StoreError>;

    async fn save_info(&self, agent_id: &str, info: &AgentInfo) -> Result<(), StoreError>;
    async fn load_info(&self, agent_id: &str) -> Result<AgentInfo, StoreError>;

    async fn exists(&self, agent_id: &str) -> Result<bool, StoreError>;
    async fn delete(&self, agent_id: &str) -> Result<(), StoreError>;
    async fn list(&self, prefix: Option<&str>) -> Result<Vec<String>, StoreError>;

    async fn save_history_window(&self, agent_id: &str, window: &HistoryWindow) -> Result<(), StoreError>;
    async fn load_history_windows(&self, agent_id: &str) -> Result<Vec<HistoryWindow>, StoreError>;

    async fn save_compression_record(
        &self,
        agent_id: &str,
        record: &CompressionRecord,
    ) -> Result<(), StoreError>;
    async fn load_compression_records(
        &self,
        agent_id: &str,
    ) -> Result<Vec<CompressionRecord>, StoreError>;

    async fn save_recovered_file(&self, agent_id: &str, file: &RecoveredFile) -> Result<(), StoreError>;
    async fn load_recovered_files(&self, agent_id: &str) -> Result<Vec<RecoveredFile>, StoreError>;

    async fn save_media_cache(&self, agent_id: &str, cache: &Value) -> Result<(), StoreError>;
    async fn load_media_cache(&self, agent_id: &str) -> Result<Value, StoreError>;
}
