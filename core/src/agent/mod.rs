//! The top-level orchestrator (§4.6): owns every other subsystem and exposes
//! chat/stream/send/decide/snapshot/fork/interrupt.

pub mod pool;
mod runtime;

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use agent_protocol::bookmark::Bookmark;
use agent_protocol::event::Channel;
use agent_protocol::message::Message;
use agent_protocol::snapshot::{AgentInfo, AgentMetadata};
use agent_protocol::tool_call::ToolCallRecord;
use parking_lot::{Mutex, RwLock};
use time::OffsetDateTime;
use tokio::sync::Notify;
use tracing::instrument;
use uuid::Uuid;

use crate::breakpoint::{Breakpoint, BreakpointManager};
use crate::config::AgentConfig;
use crate::context::ContextManager;
use crate::error::{AgentError, ResumeError};
use crate::event_bus::EventBus;
use crate::file_pool::FilePool;
use crate::message_queue::MessageQueue;
use crate::model::ModelClient;
use crate::sandbox::Sandbox;
use crate::scheduler::Scheduler;
use crate::store::Store;
use crate::todo::TodoService;
use crate::tool_runner::ToolRunner;
use crate::tools::pipeline::{ApprovalDecision, ToolPipeline};
use crate::tools::Tool;

pub use runtime::ChatOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Idle,
    Working,
    Paused,
}

pub struct AgentDeps {
    pub store: Arc<dyn Store>,
    pub sandbox: Arc<dyn Sandbox>,
    pub model: Arc<dyn ModelClient>,
    pub tools: Vec<Arc<dyn Tool>>,
}

pub(crate) struct ProcessingGuard {
    pub started_at: OffsetDateTime,
}

pub const PROCESSING_TIMEOUT_SECS: i64 = 5 * 60;

/// Every mutable piece the loop needs, behind the locking discipline §5
/// describes: single active `runStep` per agent, guarded by `processing`.
pub struct Agent {
    pub id: String,
    pub(crate) config: RwLock<AgentConfig>,
    pub(crate) metadata: RwLock<AgentMetadata>,
    pub(crate) messages: RwLock<Vec<Message>>,
    pub(crate) tool_records: RwLock<Vec<ToolCallRecord>>,
    pub(crate) breakpoint: BreakpointManager,
    pub(crate) message_queue: MessageQueue,
    pub(crate) context_manager: ContextManager,
    pub(crate) event_bus: EventBus,
    pub(crate) store: Arc<dyn Store>,
    pub(crate) tool_pipeline: ToolPipeline,
    pub(crate) model: Arc<dyn ModelClient>,
    pub(crate) todo_service: TodoService,
    pub(crate) scheduler: Scheduler,
    pub(crate) file_pool: Arc<FilePool>,
    pub(crate) state: Mutex<AgentState>,
    pub(crate) step_count: AtomicU64,
    pub(crate) last_sfp_index: AtomicUsize,
    pub(crate) interrupted: AtomicBool,
    pub(crate) processing: Mutex<Option<ProcessingGuard>>,
    pub(crate) pending_next_round: AtomicBool,
    pub(crate) processing_notify: Notify,
    pub(crate) lineage: Vec<String>,
}

/// ULID-ish id over `0123456789ABCDEFGHJKMNPQRSTVWXYZ`, `agt:<time><random>`
/// (§6). Not a real ULID (no monotonic time-component encoding) — good
/// enough for uniqueness and the documented shape.
pub fn generate_agent_id() -> String {
    const ALPHABET: &[u8] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";
    let time_component: String = {
        let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        let mut digits = Vec::new();
        let mut n = millis as u64;
        for _ in 0..10 {
            digits.push(ALPHABET[(n % ALPHABET.len() as u64) as usize]);
            n /= ALPHABET.len() as u64;
        }
        digits.reverse();
        String::from_utf8(digits).unwrap()
    };
    let random_component: String = {
        let raw = Uuid::new_v4();
        raw.simple()
            .to_string()
            .bytes()
            .filter_map(|b| {
                let idx = (b as usize) % ALPHABET.len();
                Some(ALPHABET[idx] as char)
            })
            .take(16)
            .collect()
    };
    format!("agt:{time_component}{random_component}")
}

pub enum ResumeStrategy {
    Crash,
    Manual,
}

impl Agent {
    #[instrument(name = "agent.create", skip(config, deps))]
    pub async fn create(config: AgentConfig, deps: AgentDeps) -> Result<Arc<Self>, AgentError> {
        let id = generate_agent_id();
        let now = OffsetDateTime::now_utc();
        let metadata = AgentMetadata {
            template_id: config.template_id.clone(),
            template_version: config.template_version.clone(),
            sandbox_config: serde_json::json!({"root": config.sandbox_root}),
            model_config: serde_json::Value::Null,
            tool_descriptors: deps.tools.iter().map(|t| t.to_descriptor()).collect(),
            permission_policy: config.permission_policy.clone().into(),
            todo_config: serde_json::to_value(&config.todo).unwrap_or_default(),
            subagent_config: None,
            context_options: serde_json::to_value(&config.context).unwrap_or_default(),
            created_at: now,
            updated_at: now,
            config_version: config.config_version,
            lineage: Vec::new(),
            breakpoint: Breakpoint::Ready.as_str().to_string(),
        };
        let agent = Self::assemble(id, config, metadata, Vec::new(), deps).await;
        agent.persist_info().await?;
        Ok(Arc::new(agent))
    }

    #[instrument(name = "agent.resume", skip(config, deps))]
    pub async fn resume(
        agent_id: &str,
        config: AgentConfig,
        deps: AgentDeps,
        strategy: ResumeStrategy,
    ) -> Result<Arc<Self>, AgentError> {
        if !deps.store.exists(agent_id).await.map_err(AgentError::from)? {
            return Err(AgentError::Resume(ResumeError::AgentNotFound {
                agent_id: agent_id.to_string(),
            }));
        }
        let metadata = deps
            .store
            .load_info(agent_id)
            .await
            .map_err(AgentError::from)?
            .metadata;
        let messages = deps.store.load_messages(agent_id).await.map_err(AgentError::from)?;
        let tool_records = deps
            .store
            .load_tool_call_records(agent_id)
            .await
            .map_err(AgentError::from)?;

        let agent = Self::assemble(agent_id.to_string(), config, metadata, tool_records, deps).await;

        if matches!(strategy, ResumeStrategy::Crash) {
            let sealed = agent.seal_non_terminal_records().await;
            agent.emit_agent_resumed("crash", sealed).await;
        }

        *agent.messages.write() = messages;
        Ok(Arc::new(agent))
    }

    async fn assemble(
        id: String,
        config: AgentConfig,
        metadata: AgentMetadata,
        tool_records: Vec<ToolCallRecord>,
        deps: AgentDeps,
    ) -> Self {
        let runner = Arc::new(ToolRunner::new(config.tool_runner.max_tool_concurrency));
        let file_pool = Arc::new(FilePool::new(deps.sandbox.clone(), true));
        let tool_pipeline = ToolPipeline::new(
            deps.tools,
            config.permission_policy.clone().into(),
            runner,
            file_pool.clone(),
            config.tool_runner.tool_timeout_ms,
        );
        let event_bus = EventBus::new(deps.store.clone());
        let context_manager = ContextManager::new(config.context.clone());
        let scheduler = Scheduler::new(1);
        let todo_service = TodoService::load(
            id.clone(),
            deps.store.clone(),
            config.todo.reminder_interval_steps,
        )
        .await;

        Self {
            id,
            config: RwLock::new(config),
            metadata: RwLock::new(metadata),
            messages: RwLock::new(Vec::new()),
            tool_records: RwLock::new(tool_records),
            breakpoint: BreakpointManager::new(Breakpoint::Ready),
            message_queue: MessageQueue::new(),
            context_manager,
            event_bus,
            store: deps.store,
            tool_pipeline,
            model: deps.model,
            todo_service,
            scheduler,
            file_pool,
            state: Mutex::new(AgentState::Idle),
            step_count: AtomicU64::new(0),
            last_sfp_index: AtomicUsize::new(0),
            interrupted: AtomicBool::new(false),
            processing: Mutex::new(None),
            pending_next_round: AtomicBool::new(false),
            processing_notify: Notify::new(),
            lineage: Vec::new(),
        }
    }

    pub async fn persist_info(&self) -> Result<(), AgentError> {
        let info = AgentInfo {
            agent_id: self.id.clone(),
            metadata: self.metadata.read().clone(),
        };
        self.store.save_info(&self.id, &info).await.map_err(AgentError::from)
    }

    pub fn info(&self) -> AgentInfo {
        AgentInfo {
            agent_id: self.id.clone(),
            metadata: self.metadata.read().clone(),
        }
    }

    pub fn state(&self) -> AgentState {
        *self.state.lock()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.read().clone()
    }

    pub fn tool_records(&self) -> Vec<ToolCallRecord> {
        self.tool_records.read().clone()
    }

    pub fn status(&self) -> AgentStatus {
        AgentStatus {
            agent_id: self.id.clone(),
            state: self.state(),
            step_count: self.step_count.load(Ordering::SeqCst),
            last_sfp_index: self.last_sfp_index.load(Ordering::SeqCst),
            breakpoint: self.breakpoint.current().as_str().to_string(),
        }
    }

    pub async fn subscribe(
        &self,
        channels: Vec<Channel>,
        since: Option<Bookmark>,
        kinds: Option<Vec<String>>,
    ) -> crate::event_bus::Subscription {
        self.event_bus.subscribe(&self.id, channels, since, kinds).await
    }

    pub fn decide(&self, permission_id: &str, allow: bool) -> bool {
        let decision = if allow {
            ApprovalDecision::Allow
        } else {
            ApprovalDecision::Deny
        };
        self.tool_pipeline.decide(permission_id, decision)
    }

    pub fn get_todos(&self) -> Vec<agent_protocol::todo::TodoItem> {
        self.todo_service.get_todos()
    }

    async fn seal_non_terminal_records(&self) -> Vec<String> {
        let mut sealed_ids = Vec::new();
        let mut records = self.tool_records.write();
        for record in records.iter_mut() {
            if !record.state.is_terminal() {
                let reason = match record.state {
                    agent_protocol::tool_call::ToolCallState::ApprovalRequired => {
                        "Interrupted while awaiting approval"
                    }
                    agent_protocol::tool_call::ToolCallState::Approved => {
                        "Interrupted before execution started"
                    }
                    agent_protocol::tool_call::ToolCallState::Executing => {
                        "Interrupted while executing"
                    }
                    _ => "Interrupted before completion",
                };
                record.seal(reason);
                sealed_ids.push(record.id.clone());
            }
        }
        sealed_ids
    }

    async fn emit_agent_resumed(&self, strategy: &str, sealed: Vec<String>) {
        self.event_bus
            .emit(
                &self.id,
                agent_protocol::event::Event::Monitor(
                    agent_protocol::event::MonitorEventKind::AgentResumed {
                        strategy: strategy.to_string(),
                        sealed,
                    },
                ),
            )
            .await;
    }
}

#[derive(Debug, Clone)]
pub struct AgentStatus {
    pub agent_id: String,
    pub state: AgentState,
    pub step_count: u64,
    pub last_sfp_index: usize,
    pub breakpoint: String,
}
