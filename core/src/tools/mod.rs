//! The `Tool` contract consumed (not implemented) by the pipeline (§6), plus
//! the execution pipeline itself.

pub mod pipeline;

use async_trait::async_trait;
use schemars::Schema;
use serde_json::Value;

/// Outcome classification surfaced to the model (§7).
#[derive(Debug, Clone)]
pub enum ToolOutcomeKind {
    Ok,
    Validation,
    Runtime,
    Logical,
    Aborted,
    Exception,
}

#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub kind: ToolOutcomeKind,
    pub data: Option<Value>,
    pub error: Option<String>,
    pub recommendations: Vec<String>,
    pub retryable: bool,
}

impl ToolOutcome {
    pub fn ok(data: Value) -> Self {
        Self {
            kind: ToolOutcomeKind::Ok,
            data: Some(data),
            error: None,
            recommendations: Vec::new(),
            retryable: false,
        }
    }

    pub fn error(kind: ToolOutcomeKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            data: None,
            error: Some(message.into()),
            recommendations: Vec::new(),
            retryable,
        }
    }
}

pub struct ToolContext {
    pub agent_id: String,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> &Schema;
    async fn exec(&self, args: Value, ctx: &ToolContext) -> ToolOutcome;
    fn to_descriptor(&self) -> Value {
        serde_json::json!({
            "name": self.name(),
            "description": self.description(),
            "input_schema": self.input_schema(),
        })
    }
}
