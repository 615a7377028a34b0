//! The model provider contract the loop consumes (§6), plus a test-only fake
//! that replays scripted chunks so §8's end-to-end scenarios are testable
//! without a live provider.

use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, Clone)]
pub enum ContentBlockKind {
    Text,
    ToolUse { id: String, name: String },
}

#[derive(Debug, Clone)]
pub enum ChunkDelta {
    Text { text: String },
    InputJson { partial_json: String },
    Thinking { text: String },
}

#[derive(Debug, Clone)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// A chunk of a streamed model response, mirroring the variants required by
/// `runStep` (§4.6 step 6, §6).
#[derive(Debug, Clone)]
pub enum ModelChunk {
    ContentBlockStart { index: usize, block: ContentBlockKind },
    ContentBlockDelta { index: usize, delta: ChunkDelta },
    ContentBlockStop { index: usize },
    MessageDelta { usage: Usage },
}

pub struct StreamRequest {
    pub messages: Vec<agent_protocol::message::Message>,
    pub tools: Vec<Value>,
    pub max_tokens: Option<u64>,
    pub temperature: Option<f32>,
    pub system: Option<String>,
}

#[async_trait]
pub trait ModelStream: Send {
    /// Returns the next chunk, or `None` once the stream is exhausted.
    async fn next_chunk(&mut self) -> Option<ModelChunk>;
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn stream(&self, request: StreamRequest) -> Box<dyn ModelStream>;
}

/// Replays a fixed sequence of chunks regardless of the request, for tests.
pub struct FakeModelClient {
    chunks: Vec<ModelChunk>,
}

impl FakeModelClient {
    pub fn new(chunks: Vec<ModelChunk>) -> Self {
        Self { chunks }
    }

    /// A single text block saying `text`, with no tool calls.
    pub fn text_only(text: impl Into<String>) -> Self {
        Self::new(vec![
            ModelChunk::ContentBlockStart {
                index: 0,
                block: ContentBlockKind::Text,
            },
            ModelChunk::ContentBlockDelta {
                index: 0,
                delta: ChunkDelta::Text { text: text.into() },
            },
            ModelChunk::ContentBlockStop { index: 0 },
            ModelChunk::MessageDelta {
                usage: Usage {
                    input_tokens: 0,
                    output_tokens: 0,
                },
            },
        ])
    }

    /// A single `tool_use` block with a parsed JSON input.
    pub fn tool_call(call_id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self::new(vec![
            ModelChunk::ContentBlockStart {
                index: 0,
                block: ContentBlockKind::ToolUse {
                    id: call_id.into(),
                    name: name.into(),
                },
            },
            ModelChunk::ContentBlockDelta {
                index: 0,
                delta: ChunkDelta::InputJson {
                    partial_json: input.to_string(),
                },
            },
            ModelChunk::ContentBlockStop { index: 0 },
            ModelChunk::MessageDelta {
                usage: Usage {
                    input_tokens: 0,
                    output_tokens: 0,
                },
            },
        ])
    }
}

struct FakeStream {
    remaining: std::vec::IntoIter<ModelChunk>,
}

#[async_trait]
impl ModelStream for FakeStream {
    async fn next_chunk(&mut self) -> Option<ModelChunk> {
        self.remaining.next()
    }
}

#[async_trait]
impl ModelClient for FakeModelClient {
    async fn stream(&self, _request: StreamRequest) -> Box<dyn ModelStream> {
        Box::new(FakeStream {
            remaining: self.chunks.clone().into_iter(),
        })
    }
}
