//! Error taxonomy for the runtime crate (§7): one `#[non_exhaustive]` enum
//! per failure domain, never raw strings.

use thiserror::Error;

/// Fatal to a `resume` call; surfaced directly to the caller (§7).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResumeError {
    #[error("session not found: {agent_id}")]
    SessionNotFound { agent_id: String },
    #[error("agent not found: {agent_id}")]
    AgentNotFound { agent_id: String },
    #[error("template not found: {template_id}")]
    TemplateNotFound { template_id: String },
    #[error("template version mismatch: expected {expected}, found {found}")]
    TemplateVersionMismatch { expected: String, found: String },
    #[error("sandbox initialization failed: {detail}")]
    SandboxInitFailed { detail: String },
    #[error("corrupted data: {detail}")]
    CorruptedData { detail: String },
}

impl ResumeError {
    pub fn code(&self) -> &'static str {
        match self {
            ResumeError::SessionNotFound { .. } => "SESSION_NOT_FOUND",
            ResumeError::AgentNotFound { .. } => "AGENT_NOT_FOUND",
            ResumeError::TemplateNotFound { .. } => "TEMPLATE_NOT_FOUND",
            ResumeError::TemplateVersionMismatch { .. } => "TEMPLATE_VERSION_MISMATCH",
            ResumeError::SandboxInitFailed { .. } => "SANDBOX_INIT_FAILED",
            ResumeError::CorruptedData { .. } => "CORRUPTED_DATA",
        }
    }
}

/// Persistence-layer failures (§4.9, §7).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("corrupted wal: {path}")]
    CorruptedWal { path: String },
}

/// Top-level agent runtime errors not otherwise classified.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AgentError {
    #[error("resume failed: {0}")]
    Resume(#[from] ResumeError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("runner is already processing")]
    AlreadyProcessing,
    #[error("pool is full (max {max_agents})")]
    PoolFull { max_agents: usize },
    #[error("internal error: {0}")]
    Internal(String),
}
