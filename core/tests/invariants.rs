//! Cross-module properties that only show up once several subsystems are
//! wired together through a live `Agent` (§8 universal invariants, plus the
//! scenarios that need more than one subsystem to observe).

use std::sync::Arc;
use std::time::Duration;

use agent_protocol::event::Channel;
use agent_protocol::message::ContentBlock;
use agent_protocol::tool_call::{ToolCallRecord, ToolCallState};
use agent_runtime::agent::{Agent, AgentDeps, AgentError, ResumeStrategy};
use agent_runtime::config::AgentConfig;
use agent_runtime::model::{ChunkDelta, ContentBlockKind, FakeModelClient, ModelChunk, ModelClient, ModelStream, StreamRequest};
use agent_runtime::sandbox::NullSandbox;
use agent_runtime::store::memory::MemoryStore;
use agent_runtime::tools::{Tool, ToolContext, ToolOutcome};
use async_trait::async_trait;
use schemars::{schema_for, JsonSchema, Schema};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

fn default_config() -> AgentConfig {
    AgentConfig::from_toml(
        r#"
        template_id = "default"
        template_version = "1"
        "#,
    )
    .unwrap()
}

async fn make_agent(model: Arc<dyn ModelClient>, tools: Vec<Arc<dyn Tool>>) -> Arc<Agent> {
    let deps = AgentDeps {
        store: Arc::new(MemoryStore::new()),
        sandbox: Arc::new(NullSandbox),
        model,
        tools,
    };
    Agent::create(default_config(), deps).await.unwrap()
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct EchoInput {
    text: String,
}

struct EchoTool {
    schema: Schema,
}

impl EchoTool {
    fn new() -> Self {
        Self {
            schema: schema_for!(EchoInput),
        }
    }
}

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "echoes its input back as the result"
    }

    fn input_schema(&self) -> &Schema {
        &self.schema
    }

    async fn exec(&self, args: Value, _ctx: &ToolContext) -> ToolOutcome {
        ToolOutcome::ok(args)
    }
}

/// Wraps another `ModelClient`, delaying the start of each stream so tests
/// can force two `run_step` calls to genuinely overlap.
struct DelayedModelClient {
    inner: FakeModelClient,
    delay: Duration,
}

#[async_trait]
impl ModelClient for DelayedModelClient {
    async fn stream(&self, request: StreamRequest) -> Box<dyn ModelStream> {
        tokio::time::sleep(self.delay).await;
        self.inner.stream(request).await
    }
}

#[tokio::test]
async fn bookmarks_are_strictly_increasing_across_a_live_step() {
    let agent = make_agent(Arc::new(FakeModelClient::text_only("hello there")), vec![]).await;
    let mut sub = agent
        .subscribe(vec![Channel::Progress, Channel::Control, Channel::Monitor], None, None)
        .await;

    agent.run_step().await.unwrap();

    let mut last_seq = 0u64;
    let mut count = 0;
    while let Ok(envelope) = sub.receiver.try_recv() {
        assert!(envelope.bookmark.seq > last_seq, "bookmarks must strictly increase");
        last_seq = envelope.bookmark.seq;
        count += 1;
    }
    assert!(count > 0, "a step with no queued work still emits a Done event");
}

#[tokio::test]
async fn tool_use_and_tool_result_pair_up_within_a_step() {
    let tool_call_input = json!({"text": "hi"});
    let model = FakeModelClient::tool_call("call_1", "echo", tool_call_input.clone());
    let agent = make_agent(Arc::new(model), vec![Arc::new(EchoTool::new())]).await;

    agent.send("please echo hi");
    let had_tool_calls = agent.run_step().await.unwrap();
    assert!(had_tool_calls);

    let messages = agent.messages();
    let tool_use_id = messages
        .iter()
        .flat_map(|m| &m.content)
        .find_map(|block| match block {
            ContentBlock::ToolUse { id, name, .. } if name == "echo" => Some(id.clone()),
            _ => None,
        })
        .expect("assistant message contains a tool_use block");

    let matched_result = messages.iter().flat_map(|m| &m.content).any(|block| {
        matches!(block, ContentBlock::ToolResult { tool_use_id: id, .. } if *id == tool_use_id)
    });
    assert!(matched_result, "every tool_use must be followed by a matching tool_result");

    let records = agent.tool_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].state, ToolCallState::Completed);
}

#[tokio::test]
async fn crash_resume_seals_unresolved_tool_calls() {
    let store = Arc::new(MemoryStore::new());
    let deps = AgentDeps {
        store: store.clone(),
        sandbox: Arc::new(NullSandbox),
        model: Arc::new(FakeModelClient::text_only("hi")),
        tools: vec![],
    };
    let config = default_config();
    let original = Agent::create(config.clone(), deps).await.unwrap();
    let agent_id = original.id.clone();

    let mut unresolved = ToolCallRecord::new("call_1", "echo", json!({}));
    unresolved.transition(ToolCallState::Executing, None);
    agent_runtime::store::Store::save_tool_call_records(&*store, &agent_id, &[unresolved])
        .await
        .unwrap();

    let resume_deps = AgentDeps {
        store: store.clone(),
        sandbox: Arc::new(NullSandbox),
        model: Arc::new(FakeModelClient::text_only("hi")),
        tools: vec![],
    };
    let resumed = Agent::resume(&agent_id, config, resume_deps, ResumeStrategy::Crash)
        .await
        .unwrap();

    let records = resumed.tool_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].state, ToolCallState::Sealed);
    assert!(records[0].is_error);
}

#[tokio::test]
async fn a_second_concurrent_step_is_rejected_while_one_is_in_flight() {
    let model = DelayedModelClient {
        inner: FakeModelClient::text_only("slow"),
        delay: Duration::from_millis(100),
    };
    let agent = make_agent(Arc::new(model), vec![]).await;

    let first = {
        let agent = agent.clone();
        tokio::spawn(async move { agent.run_step().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let second_result = agent.run_step().await;
    assert!(matches!(second_result, Err(AgentError::AlreadyProcessing)));

    first.await.unwrap().unwrap();
}

#[tokio::test]
async fn chunk_variants_compile_through_the_fake_client() {
    // Sanity check that every ModelChunk/ChunkDelta/ContentBlockKind variant
    // used by the control loop round-trips through the fake client without
    // the match in `stream_model_turn` needing a catch-all.
    let chunks = vec![
        ModelChunk::ContentBlockStart {
            index: 0,
            block: ContentBlockKind::Text,
        },
        ModelChunk::ContentBlockDelta {
            index: 0,
            delta: ChunkDelta::Text {
                text: "hi".to_string(),
            },
        },
        ModelChunk::ContentBlockStop { index: 0 },
    ];
    let client = FakeModelClient::new(chunks);
    let agent = make_agent(Arc::new(client), vec![]).await;
    agent.run_step().await.unwrap();
    assert!(!agent.messages().is_empty());
}
