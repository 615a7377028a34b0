//! Tool execution pipeline (§4.7): validation, policy, hook gates, approval,
//! bounded concurrency, timeouts, audit trail, sealing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use agent_protocol::event::{ControlEventKind, Event, MonitorEventKind, ProgressEventKind};
use agent_protocol::hooks::{HookEventContext, HookEventData, HookEventName};
use agent_protocol::message::ContentBlock;
use agent_protocol::snapshot::PermissionPolicy;
use agent_protocol::tool_call::{ToolCallRecord, ToolCallState};
use dashmap::DashMap;
use serde_json::Value;
use time::OffsetDateTime;
use tokio::sync::oneshot;
use tracing::instrument;
use uuid::Uuid;

use crate::breakpoint::{Breakpoint, BreakpointManager};
use crate::event_bus::EventBus;
use crate::file_pool::FilePool;
use crate::permission::{self, PermissionDecision};
use crate::tool_runner::ToolRunner;
use crate::tools::{Tool, ToolContext, ToolOutcome, ToolOutcomeKind};

const DEFAULT_TOOL_TIMEOUT_MS: u64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    Allow,
    Deny,
}

/// Registered tools plus the moving parts the pipeline threads a
/// `tool_use` block through.
pub struct ToolPipeline {
    tools: HashMap<String, Arc<dyn Tool>>,
    permission_policy: PermissionPolicy,
    runner: Arc<ToolRunner>,
    file_pool: Arc<FilePool>,
    pending_approvals: DashMap<String, oneshot::Sender<ApprovalDecision>>,
    tool_timeout_ms: u64,
}

pub struct ProcessedCall {
    pub record: ToolCallRecord,
    pub result_block: ContentBlock,
}

impl ToolPipeline {
    pub fn new(
        tools: Vec<Arc<dyn Tool>>,
        permission_policy: PermissionPolicy,
        runner: Arc<ToolRunner>,
        file_pool: Arc<FilePool>,
        tool_timeout_ms: u64,
    ) -> Self {
        Self {
            tools: tools.into_iter().map(|t| (t.name().to_string(), t)).collect(),
            permission_policy,
            runner,
            file_pool,
            pending_approvals: DashMap::new(),
            tool_timeout_ms: if tool_timeout_ms == 0 {
                DEFAULT_TOOL_TIMEOUT_MS
            } else {
                tool_timeout_ms
            },
        }
    }

    /// Resolves a pending approval registered during step 6. Returns `false`
    /// if no such approval is pending (already resolved, or unknown id).
    pub fn decide(&self, permission_id: &str, decision: ApprovalDecision) -> bool {
        if let Some((_, sender)) = self.pending_approvals.remove(permission_id) {
            let _ = sender.send(decision);
            true
        } else {
            false
        }
    }

    /// JSON descriptors for every registered tool, passed to the model on
    /// each turn.
    pub fn tool_descriptors(&self) -> Vec<Value> {
        self.tools.values().map(|t| t.to_descriptor()).collect()
    }

    /// Denies every approval still awaiting a decision and drops queued
    /// tool work (§4.6 "interrupt"). In-flight executions are left to the
    /// `ToolRunner`'s own `clear()` semantics.
    pub fn clear_pending(&self) {
        let pending: Vec<String> = self.pending_approvals.iter().map(|e| e.key().clone()).collect();
        for permission_id in pending {
            if let Some((_, sender)) = self.pending_approvals.remove(&permission_id) {
                let _ = sender.send(ApprovalDecision::Deny);
            }
        }
        self.runner.clear();
    }

    #[instrument(name = "tool_pipeline.process", skip(self, bus, breakpoints, input), fields(tool = %name))]
    pub async fn process(
        &self,
        bus: &EventBus,
        breakpoints: &BreakpointManager,
        agent_id: &str,
        call_id: &str,
        name: &str,
        input: Value,
    ) -> ProcessedCall {
        let mut record = ToolCallRecord::new(call_id, name, input.clone());
        bus.emit(
            agent_id,
            Event::Progress(ProgressEventKind::ToolStart {
                call_id: call_id.to_string(),
                name: name.to_string(),
                input: input.clone(),
            }),
        )
        .await;

        let outcome = self.run_phases(bus, breakpoints, agent_id, &mut record, name, input).await;

        let (is_error, monitor_or_error) = match &outcome.kind {
            ToolOutcomeKind::Ok => (false, None),
            _ => (true, outcome.error.clone()),
        };

        breakpoints
            .set(bus, agent_id, Breakpoint::PostTool, None)
            .await;

        if is_error {
            bus.emit(
                agent_id,
                Event::Progress(ProgressEventKind::ToolError {
                    call_id: call_id.to_string(),
                    name: name.to_string(),
                    message: monitor_or_error.clone().unwrap_or_default(),
                }),
            )
            .await;
        } else if let Some(duration_ms) = record.duration_ms {
            bus.emit(
                agent_id,
                Event::Monitor(MonitorEventKind::ToolExecuted {
                    call_id: call_id.to_string(),
                    name: name.to_string(),
                    duration_ms,
                }),
            )
            .await;
        }
        bus.emit(
            agent_id,
            Event::Progress(ProgressEventKind::ToolEnd {
                call_id: call_id.to_string(),
                name: name.to_string(),
                ok: !is_error,
            }),
        )
        .await;

        let result_content = build_result_content(&outcome);
        record.result = Some(result_content.clone());
        record.is_error = is_error;
        if let Some(err) = &outcome.error {
            record.error = Some(err.clone());
        }

        ProcessedCall {
            record: record.clone(),
            result_block: ContentBlock::ToolResult {
                tool_use_id: call_id.to_string(),
                content: result_content,
                is_error,
            },
        }
    }

    async fn run_phases(
        &self,
        bus: &EventBus,
        breakpoints: &BreakpointManager,
        agent_id: &str,
        record: &mut ToolCallRecord,
        name: &str,
        input: Value,
    ) -> ToolOutcome {
        let Some(tool) = self.tools.get(name).cloned() else {
            record.transition(ToolCallState::Failed, Some("Tool not found".into()));
            return ToolOutcome::error(ToolOutcomeKind::Logical, "Tool not found", false);
        };

        if let Err(message) = validate_schema(&tool, &input) {
            record.transition(ToolCallState::Failed, Some(message.clone()));
            let mut outcome = ToolOutcome::error(ToolOutcomeKind::Validation, message, false);
            outcome.recommendations.push("check the tool's input_schema and retry".into());
            return outcome;
        }

        let decision = permission::evaluate(&self.permission_policy, name);
        if decision == PermissionDecision::Deny {
            record.transition(ToolCallState::Denied, Some("denied by policy".into()));
            return ToolOutcome::error(ToolOutcomeKind::Logical, "Denied by policy", false);
        }

        let pre_tool_event = HookEventContext {
            session_id: agent_id.to_string(),
            transcript_path: None,
            cwd: String::new(),
            hook_event_name: HookEventName::PreToolUse,
            timestamp: OffsetDateTime::now_utc().to_string(),
            event_data: HookEventData::PreToolUse {
                tool_name: name.to_string(),
                tool_input: input.clone(),
            },
        };
        if let Err(hook_err) = agent_hooks::trigger_hook(pre_tool_event).await {
            use agent_hooks::manager::HookError;
            match hook_err {
                HookError::Aborted(reason) | HookError::ExecutionFailed(reason) => {
                    record.transition(ToolCallState::Denied, Some(reason.clone()));
                    return ToolOutcome::error(ToolOutcomeKind::Logical, reason, false);
                }
                HookError::UserConfirmationRequired(_) => {
                    if !self
                        .await_approval(bus, breakpoints, agent_id, record)
                        .await
                    {
                        return ToolOutcome::error(
                            ToolOutcomeKind::Logical,
                            "Denied by user",
                            false,
                        );
                    }
                }
                HookError::RetryRequested(reason) => {
                    record.transition(ToolCallState::Failed, Some(reason.clone()));
                    return ToolOutcome::error(ToolOutcomeKind::Runtime, reason, true);
                }
            }
        } else if decision == PermissionDecision::Ask {
            if !self
                .await_approval(bus, breakpoints, agent_id, record)
                .await
            {
                return ToolOutcome::error(ToolOutcomeKind::Logical, "Denied by user", false);
            }
        } else {
            record.transition(ToolCallState::Approved, None);
        }

        breakpoints.set(bus, agent_id, Breakpoint::PreTool, None).await;
        record.transition(ToolCallState::Executing, None);
        breakpoints
            .set(bus, agent_id, Breakpoint::ToolExecuting, None)
            .await;

        let agent_id_owned = agent_id.to_string();
        let timeout = Duration::from_millis(self.tool_timeout_ms);
        let run_result = self
            .runner
            .run(async move {
                let ctx = ToolContext { agent_id: agent_id_owned };
                tokio::time::timeout(timeout, tool.exec(input, &ctx)).await
            })
            .await;

        let outcome = match run_result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_elapsed)) => {
                ToolOutcome::error(ToolOutcomeKind::Aborted, "Tool execution timed out", true)
            }
            Err(_cleared) => {
                ToolOutcome::error(ToolOutcomeKind::Aborted, "Cleared before execution", false)
            }
        };

        self.record_file_pool_side_effects(name, &record.input).await;

        match outcome.kind {
            ToolOutcomeKind::Ok => {
                record.transition(ToolCallState::Completed, None);
            }
            _ => {
                record.transition(ToolCallState::Failed, outcome.error.clone());
            }
        }

        outcome
    }

    async fn await_approval(
        &self,
        bus: &EventBus,
        breakpoints: &BreakpointManager,
        agent_id: &str,
        record: &mut ToolCallRecord,
    ) -> bool {
        record.transition(ToolCallState::ApprovalRequired, None);
        breakpoints
            .set(bus, agent_id, Breakpoint::AwaitingApproval, None)
            .await;

        let permission_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending_approvals.insert(permission_id.clone(), tx);

        bus.emit(
            agent_id,
            Event::Control(ControlEventKind::PermissionRequired {
                permission_id: permission_id.clone(),
                tool_name: record.name.clone(),
            }),
        )
        .await;

        let decision = rx.await.unwrap_or(ApprovalDecision::Deny);
        bus.emit(
            agent_id,
            Event::Control(ControlEventKind::PermissionDecided {
                permission_id,
                allow: decision == ApprovalDecision::Allow,
                note: None,
            }),
        )
        .await;

        match decision {
            ApprovalDecision::Allow => {
                record.transition(ToolCallState::Approved, None);
                true
            }
            ApprovalDecision::Deny => {
                record.transition(ToolCallState::Denied, None);
                false
            }
        }
    }

    async fn record_file_pool_side_effects(&self, tool_name: &str, input: &Value) {
        let Some(path) = input.get("path").and_then(|p| p.as_str()) else {
            return;
        };
        let path = std::path::Path::new(path);
        match tool_name {
            "fs_read" => {
                let _ = self.file_pool.record_read(path).await;
            }
            "fs_write" | "fs_edit" | "fs_multi_edit" => {
                let _ = self.file_pool.record_edit(path).await;
            }
            _ => {}
        }
    }
}

fn validate_schema(tool: &Arc<dyn Tool>, input: &Value) -> Result<(), String> {
    let schema_value = serde_json::to_value(tool.input_schema())
        .map_err(|e| format!("invalid schema: {e}"))?;
    let validator = jsonschema::validator_for(&schema_value)
        .map_err(|e| format!("invalid schema: {e}"))?;
    let errors: Vec<String> = validator.iter_errors(input).map(|e| e.to_string()).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}

fn build_result_content(outcome: &ToolOutcome) -> Value {
    match &outcome.kind {
        ToolOutcomeKind::Ok => {
            // If the tool already returned `{ok, data}`, unwrap `data` to
            // avoid double-nesting (§4.7 step 11).
            let data = outcome.data.clone().unwrap_or(Value::Null);
            if let Some(inner) = data.get("data").filter(|_| data.get("ok").is_some()) {
                serde_json::json!({"ok": true, "data": inner})
            } else {
                serde_json::json!({"ok": true, "data": data})
            }
        }
        kind => {
            let error_type = match kind {
                ToolOutcomeKind::Validation => "validation",
                ToolOutcomeKind::Runtime => "runtime",
                ToolOutcomeKind::Logical => "logical",
                ToolOutcomeKind::Aborted => "aborted",
                ToolOutcomeKind::Exception => "exception",
                ToolOutcomeKind::Ok => unreachable!(),
            };
            serde_json::json!({
                "ok": false,
                "error": outcome.error.clone().unwrap_or_default(),
                "errorType": error_type,
                "retryable": outcome.retryable,
                "recommendations": outcome.recommendations,
            })
        }
    }
}
