//! Tool call records and their state DAG (§3 `ToolCallRecord`, §4.7).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

/// `PENDING -> (APPROVAL_REQUIRED -> APPROVED|DENIED) -> EXECUTING -> COMPLETED|FAILED`,
/// plus the terminal `SEALED` reached only via interrupt or crash recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolCallState {
    Pending,
    ApprovalRequired,
    Approved,
    Denied,
    Executing,
    Completed,
    Failed,
    Sealed,
}

impl ToolCallState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ToolCallState::Completed
                | ToolCallState::Failed
                | ToolCallState::Denied
                | ToolCallState::Sealed
        )
    }

    /// Whether `next` is a legal transition out of `self` per the §3 DAG.
    pub fn can_transition_to(self, next: ToolCallState) -> bool {
        use ToolCallState::*;
        matches!(
            (self, next),
            (Pending, ApprovalRequired)
                | (Pending, Approved)
                | (Pending, Denied)
                | (Pending, Executing)
                | (ApprovalRequired, Approved)
                | (ApprovalRequired, Denied)
                | (Approved, Executing)
                | (Executing, Completed)
                | (Executing, Failed)
                | (Pending, Sealed)
                | (ApprovalRequired, Sealed)
                | (Approved, Sealed)
                | (Executing, Sealed)
        )
    }
}

/// Classification of a terminal or error outcome surfaced to the model (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    Validation,
    Runtime,
    Logical,
    Aborted,
    Exception,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub state: ToolCallState,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub id: String,
    pub name: String,
    pub input: Value,
    pub state: ToolCallState,
    #[serde(default)]
    pub approval: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ToolErrorKind>,
    pub is_error: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    pub audit_trail: Vec<AuditEntry>,
}

impl ToolCallRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        let now = OffsetDateTime::now_utc();
        let id = id.into();
        Self {
            id,
            name: name.into(),
            input,
            state: ToolCallState::Pending,
            approval: None,
            result: None,
            error: None,
            error_kind: None,
            is_error: false,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            duration_ms: None,
            audit_trail: vec![AuditEntry {
                state: ToolCallState::Pending,
                timestamp: now,
                note: None,
            }],
        }
    }

    /// Transition to `next`, appending an audit entry.
    ///
    /// Returns the previous state on success. The DAG is not enforced here —
    /// callers (the tool pipeline) are the single source of legal transitions
    /// and are expected to check `can_transition_to` themselves when the
    /// transition is conditional; this method always records what happened.
    pub fn transition(&mut self, next: ToolCallState, note: Option<String>) -> ToolCallState {
        let previous = self.state;
        let now = OffsetDateTime::now_utc();
        self.state = next;
        self.updated_at = now;
        match next {
            ToolCallState::Executing => self.started_at = Some(now),
            ToolCallState::Completed | ToolCallState::Failed | ToolCallState::Sealed => {
                self.completed_at = Some(now);
                if let Some(started) = self.started_at {
                    self.duration_ms = Some((now - started).whole_milliseconds().max(0) as u64);
                }
            }
            _ => {}
        }
        self.audit_trail.push(AuditEntry {
            state: next,
            timestamp: now,
            note,
        });
        previous
    }

    pub fn seal(&mut self, reason: impl Into<String>) {
        let note = reason.into();
        self.is_error = true;
        self.error = Some(note.clone());
        self.error_kind = Some(ToolErrorKind::Aborted);
        self.transition(ToolCallState::Sealed, Some(note));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_dag_transitions_are_legal() {
        let mut record = ToolCallRecord::new("call_1", "fs_read", serde_json::json!({}));
        assert!(record
            .state
            .can_transition_to(ToolCallState::Executing));
        record.transition(ToolCallState::Executing, None);
        assert!(record.state.can_transition_to(ToolCallState::Completed));
        record.transition(ToolCallState::Completed, None);
        assert!(record.state.is_terminal());
        assert_eq!(record.audit_trail.len(), 3);
    }

    #[test]
    fn sealing_marks_terminal_and_records_error() {
        let mut record = ToolCallRecord::new("call_2", "fs_write", serde_json::json!({}));
        record.transition(ToolCallState::Executing, None);
        record.seal("Interrupted by user");
        assert_eq!(record.state, ToolCallState::Sealed);
        assert!(record.is_error);
        assert_eq!(record.error.as_deref(), Some("Interrupted by user"));
    }

    #[test]
    fn failed_does_not_permit_further_transition() {
        assert!(!ToolCallState::Failed.can_transition_to(ToolCallState::Executing));
        assert!(!ToolCallState::Completed.can_transition_to(ToolCallState::Sealed));
    }
}
