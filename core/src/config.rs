//! Per-agent configuration loaded from TOML (§4.6, §9 "Configuration"),
//! validated against a generated JSON schema.

use std::path::Path;

use agent_protocol::snapshot::PermissionPolicy;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MultimodalRetention {
    #[serde(default = "default_keep_recent")]
    pub keep_recent: usize,
}

fn default_keep_recent() -> usize {
    3
}

impl Default for MultimodalRetention {
    fn default() -> Self {
        Self {
            keep_recent: default_keep_recent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ContextOptions {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u64,
    #[serde(default = "default_compress_to_tokens")]
    pub compress_to_tokens: u64,
    #[serde(default)]
    pub multimodal_retention: MultimodalRetention,
}

fn default_max_tokens() -> u64 {
    50_000
}

fn default_compress_to_tokens() -> u64 {
    30_000
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            compress_to_tokens: default_compress_to_tokens(),
            multimodal_retention: MultimodalRetention::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ToolRunnerOptions {
    #[serde(default = "default_max_tool_concurrency")]
    pub max_tool_concurrency: usize,
    #[serde(default = "default_tool_timeout_ms")]
    pub tool_timeout_ms: u64,
}

fn default_max_tool_concurrency() -> usize {
    3
}

fn default_tool_timeout_ms() -> u64 {
    60_000
}

impl Default for ToolRunnerOptions {
    fn default() -> Self {
        Self {
            max_tool_concurrency: default_max_tool_concurrency(),
            tool_timeout_ms: default_tool_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TodoConfig {
    #[serde(default = "default_reminder_interval_steps")]
    pub reminder_interval_steps: u64,
}

fn default_reminder_interval_steps() -> u64 {
    10
}

impl Default for TodoConfig {
    fn default() -> Self {
        Self {
            reminder_interval_steps: default_reminder_interval_steps(),
        }
    }
}

/// The configuration surface an `Agent` is built from. `config_version` is
/// stamped on every meta save so a future loader can detect a mismatch
/// between a resumed agent's persisted config and its current template.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentConfig {
    pub template_id: String,
    pub template_version: String,
    #[serde(default)]
    pub sandbox_root: Option<String>,
    #[serde(default)]
    pub permission_policy: PermissionPolicyConfig,
    #[serde(default)]
    pub context: ContextOptions,
    #[serde(default)]
    pub tool_runner: ToolRunnerOptions,
    #[serde(default)]
    pub todo: TodoConfig,
    #[serde(default)]
    pub expose_thinking: bool,
    #[serde(default = "default_config_version")]
    pub config_version: u32,
}

fn default_config_version() -> u32 {
    1
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PermissionModeConfig {
    Auto,
    Approval,
    Readonly,
}

impl Default for PermissionModeConfig {
    fn default() -> Self {
        PermissionModeConfig::Auto
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PermissionPolicyConfig {
    #[serde(default)]
    pub mode: PermissionModeConfig,
    #[serde(default)]
    pub allow_tools: Vec<String>,
    #[serde(default)]
    pub deny_tools: Vec<String>,
    #[serde(default)]
    pub require_approval_tools: Vec<String>,
}

impl From<PermissionPolicyConfig> for PermissionPolicy {
    fn from(cfg: PermissionPolicyConfig) -> Self {
        use agent_protocol::snapshot::PermissionMode;
        PermissionPolicy {
            mode: match cfg.mode {
                PermissionModeConfig::Auto => PermissionMode::Auto,
                PermissionModeConfig::Approval => PermissionMode::Approval,
                PermissionModeConfig::Readonly => PermissionMode::Readonly,
            },
            allow_tools: cfg.allow_tools,
            deny_tools: cfg.deny_tools,
            require_approval_tools: cfg.require_approval_tools,
        }
    }
}

impl AgentConfig {
    pub fn from_toml(text: &str) -> Result<Self, AgentError> {
        toml::from_str(text).map_err(|e| AgentError::Internal(format!("invalid config: {e}")))
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, AgentError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AgentError::Internal(format!("reading config {path:?}: {e}")))?;
        Self::from_toml(&text)
    }
}
