//! Immutable snapshots and the persisted agent sidecar (§3).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::bookmark::Bookmark;
use crate::message::Message;

/// Immutable once written; `last_sfp_index` is the safe fence point forks
/// restart from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub messages: Vec<Message>,
    pub last_sfp_index: usize,
    pub last_bookmark: Bookmark,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
}

impl Snapshot {
    /// Default snapshot id per §6: `sfp:<lastSfpIndex>`.
    pub fn default_id(last_sfp_index: usize) -> String {
        format!("sfp:{last_sfp_index}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionMode {
    Auto,
    Approval,
    Readonly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionPolicy {
    pub mode: PermissionMode,
    #[serde(default)]
    pub allow_tools: Vec<String>,
    #[serde(default)]
    pub deny_tools: Vec<String>,
    #[serde(default)]
    pub require_approval_tools: Vec<String>,
}

impl Default for PermissionPolicy {
    fn default() -> Self {
        Self {
            mode: PermissionMode::Auto,
            allow_tools: Vec::new(),
            deny_tools: Vec::new(),
            require_approval_tools: Vec::new(),
        }
    }
}

/// Persisted sidecar describing how an agent was configured (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMetadata {
    pub template_id: String,
    pub template_version: String,
    pub sandbox_config: Value,
    pub model_config: Value,
    pub tool_descriptors: Vec<Value>,
    pub permission_policy: PermissionPolicy,
    pub todo_config: Value,
    #[serde(default)]
    pub subagent_config: Option<Value>,
    pub context_options: Value,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub config_version: u32,
    /// Chain of ancestor agent ids for forks, oldest first.
    #[serde(default)]
    pub lineage: Vec<String>,
    pub breakpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInfo {
    pub agent_id: String,
    pub metadata: AgentMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_snapshot_id_matches_format() {
        assert_eq!(Snapshot::default_id(12), "sfp:12");
    }

    #[test]
    fn permission_policy_defaults_to_auto() {
        let policy = PermissionPolicy::default();
        assert_eq!(policy.mode, PermissionMode::Auto);
        assert!(policy.allow_tools.is_empty());
    }
}
