//! Event bus envelopes and the three channel vocabularies (§4.1, §6).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bookmark::Bookmark;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Progress,
    Control,
    Monitor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEventKind {
    TextChunkStart { index: usize },
    TextChunk { index: usize, text: String },
    TextChunkEnd { index: usize },
    ThinkChunkStart,
    ThinkChunkEnd,
    #[serde(rename = "tool:start")]
    ToolStart { call_id: String, name: String, input: Value },
    #[serde(rename = "tool:end")]
    ToolEnd { call_id: String, name: String, ok: bool },
    #[serde(rename = "tool:error")]
    ToolError { call_id: String, name: String, message: String },
    Done { reason: DoneReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoneReason {
    Completed,
    Interrupted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlEventKind {
    PermissionRequired {
        permission_id: String,
        tool_name: String,
    },
    PermissionDecided {
        permission_id: String,
        allow: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorEventKind {
    StateChanged { from: String, to: String },
    BreakpointChanged { previous: String, current: String, #[serde(default, skip_serializing_if = "Option::is_none")] note: Option<String> },
    ToolExecuted { call_id: String, name: String, duration_ms: u64 },
    Error { phase: String, message: String },
    TokenUsage { input_tokens: u64, output_tokens: u64 },
    ContextCompression { phase: CompressionPhase, #[serde(default, skip_serializing_if = "Option::is_none")] ratio: Option<f64> },
    SchedulerTriggered { reason: String },
    ReminderSent { kind: String },
    FileChanged { path: String },
    StepComplete { step_count: u64 },
    AgentResumed { strategy: String, sealed: Vec<String> },
    StorageFailure { detail: String },
    ToolManualUpdated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionPhase {
    Start,
    End,
}

/// An event on one of the three channels, before it is wrapped into an
/// `Envelope` by the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "snake_case")]
pub enum Event {
    Progress(ProgressEventKind),
    Control(ControlEventKind),
    Monitor(MonitorEventKind),
}

impl Event {
    pub fn channel(&self) -> Channel {
        match self {
            Event::Progress(_) => Channel::Progress,
            Event::Control(_) => Channel::Control,
            Event::Monitor(_) => Channel::Monitor,
        }
    }

    /// Whether persistence failure for this event must be retried and
    /// surfaced as a `storage_failure` monitor event (§4.1).
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Event::Progress(ProgressEventKind::ToolEnd { .. })
                | Event::Progress(ProgressEventKind::Done { .. })
                | Event::Control(ControlEventKind::PermissionDecided { .. })
                | Event::Monitor(MonitorEventKind::AgentResumed { .. })
                | Event::Monitor(MonitorEventKind::StateChanged { .. })
                | Event::Monitor(MonitorEventKind::BreakpointChanged { .. })
                | Event::Monitor(MonitorEventKind::Error { .. })
        )
    }
}

/// The persisted wrapper the bus appends to the per-agent log (§4.1, GLOSSARY).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub cursor: u64,
    pub bookmark: Bookmark,
    pub event: Event,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_end_and_done_are_critical() {
        let done = Event::Progress(ProgressEventKind::Done {
            reason: DoneReason::Completed,
        });
        assert!(done.is_critical());
        let chunk = Event::Progress(ProgressEventKind::TextChunk {
            index: 0,
            text: "hi".into(),
        });
        assert!(!chunk.is_critical());
    }

    #[test]
    fn envelope_round_trips() {
        let env = Envelope {
            cursor: 1,
            bookmark: Bookmark::new(1),
            event: Event::Monitor(MonitorEventKind::StepComplete { step_count: 1 }),
        };
        let json = serde_json::to_string(&env).unwrap();
        let back: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(env, back);
    }
}
