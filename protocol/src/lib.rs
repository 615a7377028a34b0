//! Wire types shared between every crate in the workspace.
//!
//! Nothing in this crate performs I/O or owns a runtime; it is the same kind
//! of pure data layer the hook system builds its event contexts on top of.

pub mod bookmark;
pub mod event;
pub mod history;
pub mod hooks;
pub mod message;
pub mod snapshot;
pub mod todo;
pub mod tool_call;

pub use bookmark::Bookmark;
pub use event::{Channel, ControlEventKind, Envelope, Event, MonitorEventKind, ProgressEventKind};
pub use history::{CompressionRecord, HistoryWindow, RecoveredFile};
pub use message::{ContentBlock, Message, Role};
pub use snapshot::{AgentInfo, AgentMetadata, Snapshot};
pub use todo::{TodoItem, TodoStatus};
pub use tool_call::{AuditEntry, ToolCallRecord, ToolCallState};
