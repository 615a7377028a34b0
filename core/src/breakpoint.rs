//! Lifecycle phase tracking with audit (§4.2).

use agent_protocol::event::{Event, MonitorEventKind};
use parking_lot::Mutex;
use time::OffsetDateTime;
use tracing::instrument;

use crate::event_bus::EventBus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Breakpoint {
    Ready,
    PreModel,
    StreamingModel,
    ToolPending,
    PreTool,
    ToolExecuting,
    PostTool,
    AwaitingApproval,
}

impl Breakpoint {
    pub fn as_str(self) -> &'static str {
        match self {
            Breakpoint::Ready => "READY",
            Breakpoint::PreModel => "PRE_MODEL",
            Breakpoint::StreamingModel => "STREAMING_MODEL",
            Breakpoint::ToolPending => "TOOL_PENDING",
            Breakpoint::PreTool => "PRE_TOOL",
            Breakpoint::ToolExecuting => "TOOL_EXECUTING",
            Breakpoint::PostTool => "POST_TOOL",
            Breakpoint::AwaitingApproval => "AWAITING_APPROVAL",
        }
    }
}

struct BreakpointEntry {
    current: Breakpoint,
    #[allow(dead_code)]
    timestamp: OffsetDateTime,
}

/// Tracks the agent's current lifecycle phase; every `set` records a
/// transition and emits a `breakpoint_changed` monitor event unless the
/// state is unchanged.
pub struct BreakpointManager {
    state: Mutex<BreakpointEntry>,
}

impl BreakpointManager {
    pub fn new(initial: Breakpoint) -> Self {
        Self {
            state: Mutex::new(BreakpointEntry {
                current: initial,
                timestamp: OffsetDateTime::now_utc(),
            }),
        }
    }

    pub fn current(&self) -> Breakpoint {
        self.state.lock().current
    }

    #[instrument(name = "breakpoint.set", skip(self, bus), fields(next = next.as_str()))]
    pub async fn set(&self, bus: &EventBus, agent_id: &str, next: Breakpoint, note: Option<String>) {
        let previous = {
            let mut entry = self.state.lock();
            let previous = entry.current;
            entry.current = next;
            entry.timestamp = OffsetDateTime::now_utc();
            previous
        };
        if previous == next {
            return;
        }
        bus.emit(
            agent_id,
            Event::Monitor(MonitorEventKind::BreakpointChanged {
                previous: previous.as_str().to_string(),
                current: next.as_str().to_string(),
                note,
            }),
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn unchanged_state_does_not_emit() {
        let bus = EventBus::new(Arc::new(MemoryStore::new()));
        let manager = BreakpointManager::new(Breakpoint::Ready);
        manager.set(&bus, "agent-1", Breakpoint::Ready, None).await;
        assert_eq!(bus.current_seq(), 0);
    }

    #[tokio::test]
    async fn transition_emits_breakpoint_changed() {
        let bus = EventBus::new(Arc::new(MemoryStore::new()));
        let manager = BreakpointManager::new(Breakpoint::Ready);
        manager
            .set(&bus, "agent-1", Breakpoint::PreModel, None)
            .await;
        assert_eq!(manager.current(), Breakpoint::PreModel);
        assert_eq!(bus.current_seq(), 1);
    }
}
