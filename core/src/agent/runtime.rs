//! The control loop itself (§4.6 `runStep`) plus the public chat/send/
//! interrupt/snapshot/fork surface built on top of it.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use agent_protocol::bookmark::Bookmark;
use agent_protocol::event::{DoneReason, Event, MonitorEventKind, ProgressEventKind};
use agent_protocol::message::{ContentBlock, Message, Role};
use agent_protocol::snapshot::Snapshot;
use time::OffsetDateTime;

use crate::breakpoint::Breakpoint;
use crate::error::AgentError;
use crate::message_queue::SendOptions;
use crate::model::{ChunkDelta, ContentBlockKind, ModelChunk, StreamRequest};

use super::{Agent, AgentState, ProcessingGuard, PROCESSING_TIMEOUT_SECS};

/// What a completed `runStep` (or a whole `chat` call, which may run several
/// steps while tool calls are pending) produced.
pub struct ChatOutcome {
    pub messages: Vec<Message>,
    pub interrupted: bool,
}

impl Agent {
    /// Enqueues `text` for the next step to pick up; does not itself run a
    /// step (§4.5).
    pub fn send(&self, text: &str) {
        self.message_queue.send(text, SendOptions::default());
    }

    /// Enqueues `text`, then drives `runStep` until the model produces a
    /// turn with no pending tool calls (or the agent is interrupted).
    pub async fn chat(self: &Arc<Self>, text: &str) -> Result<ChatOutcome, AgentError> {
        self.send(text);
        self.drain_to_completion().await
    }

    async fn drain_to_completion(self: &Arc<Self>) -> Result<ChatOutcome, AgentError> {
        loop {
            let had_tool_calls = self.run_step().await?;
            if self.interrupted.load(Ordering::SeqCst) || !had_tool_calls {
                break;
            }
        }
        Ok(ChatOutcome {
            messages: self.messages.read().clone(),
            interrupted: self.interrupted.swap(false, Ordering::SeqCst),
        })
    }

    /// Guards against more than one active `runStep` per agent (§4.6
    /// "ensureProcessing"): a stale guard older than
    /// [`PROCESSING_TIMEOUT_SECS`] is treated as abandoned and reclaimed.
    fn begin_processing(&self) -> Result<(), AgentError> {
        let mut guard = self.processing.lock();
        if let Some(existing) = guard.as_ref() {
            let age = OffsetDateTime::now_utc() - existing.started_at;
            if age.whole_seconds() < PROCESSING_TIMEOUT_SECS {
                return Err(AgentError::AlreadyProcessing);
            }
        }
        *guard = Some(ProcessingGuard {
            started_at: OffsetDateTime::now_utc(),
        });
        Ok(())
    }

    fn end_processing(&self) {
        *self.processing.lock() = None;
        self.processing_notify.notify_waiters();
    }

    /// One full model turn: drains queued messages, compresses context if
    /// needed, streams a model response, executes any tool calls it
    /// contains, and appends the results. Returns whether tool calls were
    /// present (the caller loops again when they were, since the model
    /// still owes a follow-up turn).
    #[tracing::instrument(name = "agent.run_step", skip(self), fields(agent_id = %self.id))]
    pub async fn run_step(self: &Arc<Self>) -> Result<bool, AgentError> {
        self.begin_processing()?;
        let result = self.run_step_inner().await;
        self.end_processing();
        result
    }

    async fn run_step_inner(self: &Arc<Self>) -> Result<bool, AgentError> {
        *self.state.lock() = AgentState::Working;
        self.breakpoint.set(&self.event_bus, &self.id, Breakpoint::PreModel, None).await;

        let queued = self.message_queue.drain();
        if !queued.is_empty() {
            self.messages.write().extend(queued);
            self.persist_messages().await?;
        }

        self.maybe_compress().await?;

        if self.interrupted.load(Ordering::SeqCst) {
            self.finish_step(DoneReason::Interrupted).await;
            return Ok(false);
        }

        self.breakpoint
            .set(&self.event_bus, &self.id, Breakpoint::StreamingModel, None)
            .await;

        let request = StreamRequest {
            messages: self.messages.read().clone(),
            tools: self.tool_pipeline.tool_descriptors(),
            max_tokens: None,
            temperature: None,
            system: None,
        };
        let (assistant_content, tool_uses) = self.stream_model_turn(request).await;

        if !assistant_content.is_empty() {
            self.messages
                .write()
                .push(Message::new(Role::Assistant, assistant_content));
            self.persist_messages().await?;
        }

        let had_tool_calls = !tool_uses.is_empty();
        if had_tool_calls {
            self.breakpoint
                .set(&self.event_bus, &self.id, Breakpoint::ToolPending, None)
                .await;
            let mut result_blocks = Vec::with_capacity(tool_uses.len());
            for (call_id, name, input) in tool_uses {
                if self.interrupted.load(Ordering::SeqCst) {
                    break;
                }
                let processed = self
                    .tool_pipeline
                    .process(&self.event_bus, &self.breakpoint, &self.id, &call_id, &name, input)
                    .await;
                self.tool_records.write().push(processed.record);
                result_blocks.push(processed.result_block);
            }
            if !result_blocks.is_empty() {
                self.messages.write().push(Message::new(Role::User, result_blocks));
                self.persist_messages().await?;
            }
            self.store
                .save_tool_call_records(&self.id, &self.tool_records.read().clone())
                .await
                .map_err(AgentError::from)?;
        }

        self.breakpoint.set(&self.event_bus, &self.id, Breakpoint::Ready, None).await;

        let reason = if self.interrupted.load(Ordering::SeqCst) {
            DoneReason::Interrupted
        } else {
            DoneReason::Completed
        };
        self.finish_step(reason).await;
        Ok(had_tool_calls)
    }

    async fn stream_model_turn(
        &self,
        request: StreamRequest,
    ) -> (Vec<ContentBlock>, Vec<(String, String, serde_json::Value)>) {
        let mut stream = self.model.stream(request).await;
        let mut text_buf = String::new();
        let mut pending_tool: Option<(String, String, String)> = None;
        let mut content = Vec::new();
        let mut tool_uses = Vec::new();

        while let Some(chunk) = stream.next_chunk().await {
            match chunk {
                ModelChunk::ContentBlockStart { index, block } => {
                    self.event_bus
                        .emit(&self.id, Event::Progress(ProgressEventKind::TextChunkStart { index }))
                        .await;
                    if let ContentBlockKind::ToolUse { id, name } = block {
                        pending_tool = Some((id, name, String::new()));
                    }
                }
                ModelChunk::ContentBlockDelta { index, delta } => match delta {
                    ChunkDelta::Text { text } => {
                        text_buf.push_str(&text);
                        self.event_bus
                            .emit(&self.id, Event::Progress(ProgressEventKind::TextChunk { index, text }))
                            .await;
                    }
                    ChunkDelta::InputJson { partial_json } => {
                        if let Some((_, _, buf)) = pending_tool.as_mut() {
                            buf.push_str(&partial_json);
                        }
                    }
                    ChunkDelta::Thinking { .. } => {}
                },
                ModelChunk::ContentBlockStop { index } => {
                    self.event_bus
                        .emit(&self.id, Event::Progress(ProgressEventKind::TextChunkEnd { index }))
                        .await;
                    if let Some((id, name, buf)) = pending_tool.take() {
                        let input: serde_json::Value =
                            serde_json::from_str(&buf).unwrap_or(serde_json::Value::Null);
                        content.push(ContentBlock::ToolUse {
                            id: id.clone(),
                            name: name.clone(),
                            input: input.clone(),
                        });
                        tool_uses.push((id, name, input));
                    } else if !text_buf.is_empty() {
                        content.push(ContentBlock::Text {
                            text: std::mem::take(&mut text_buf),
                        });
                    }
                }
                ModelChunk::MessageDelta { usage } => {
                    self.event_bus
                        .emit(
                            &self.id,
                            Event::Monitor(MonitorEventKind::TokenUsage {
                                input_tokens: usage.input_tokens,
                                output_tokens: usage.output_tokens,
                            }),
                        )
                        .await;
                }
            }
        }

        (content, tool_uses)
    }

    async fn maybe_compress(&self) -> Result<(), AgentError> {
        let messages = self.messages.read().clone();
        let analysis = self.context_manager.analyze(&messages);
        if !analysis.should_compress {
            return Ok(());
        }
        self.event_bus
            .emit(
                &self.id,
                Event::Monitor(MonitorEventKind::ContextCompression {
                    phase: agent_protocol::event::CompressionPhase::Start,
                    ratio: None,
                }),
            )
            .await;

        let events = self
            .store
            .read_events(&self.id, None, None)
            .await
            .unwrap_or_default();
        let outcome = self
            .context_manager
            .compress(&messages, &events, Some(&self.file_pool))
            .await;

        let mut new_messages = vec![outcome.summary.clone()];
        new_messages.extend(outcome.retained_messages.clone());
        *self.messages.write() = new_messages;
        self.persist_messages().await?;

        self.store
            .save_history_window(&self.id, &outcome.history_window)
            .await
            .map_err(AgentError::from)?;
        self.store
            .save_compression_record(&self.id, &outcome.compression_record)
            .await
            .map_err(AgentError::from)?;
        for recovered in &outcome.recovered_files {
            self.store
                .save_recovered_file(&self.id, recovered)
                .await
                .map_err(AgentError::from)?;
        }

        self.event_bus
            .emit(
                &self.id,
                Event::Monitor(MonitorEventKind::ContextCompression {
                    phase: agent_protocol::event::CompressionPhase::End,
                    ratio: Some(outcome.ratio),
                }),
            )
            .await;
        Ok(())
    }

    async fn finish_step(&self, reason: DoneReason) {
        let step_count = self.step_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.event_bus
            .emit(&self.id, Event::Progress(ProgressEventKind::Done { reason }))
            .await;
        self.event_bus
            .emit(&self.id, Event::Monitor(MonitorEventKind::StepComplete { step_count }))
            .await;
        self.scheduler.notify_step(&self.event_bus, &self.id, step_count).await;
        self.todo_service
            .notify_step(&self.event_bus, &self.message_queue, step_count)
            .await;
        *self.state.lock() = AgentState::Idle;
    }

    async fn persist_messages(&self) -> Result<(), AgentError> {
        let messages = self.messages.read().clone();
        self.store
            .save_messages(&self.id, &messages)
            .await
            .map_err(AgentError::from)
    }

    /// Stops the current (or next) step at its next checkpoint, clears
    /// queued-but-unstarted tool work, and seals any tool call left
    /// unresolved (§4.6/§4.7 "Sealing").
    pub async fn interrupt(&self, note: Option<String>) {
        self.interrupted.store(true, Ordering::SeqCst);
        self.tool_pipeline.clear_pending();
        {
            let mut records = self.tool_records.write();
            for record in records.iter_mut() {
                if !record.state.is_terminal() {
                    record.seal(note.clone().unwrap_or_else(|| "Interrupted".to_string()));
                }
            }
        }
        self.breakpoint
            .set(&self.event_bus, &self.id, Breakpoint::Ready, note)
            .await;
        *self.state.lock() = AgentState::Idle;
    }

    /// Writes an immutable snapshot of the current message history (§4.6).
    pub async fn snapshot(&self, label: Option<String>) -> Result<Snapshot, AgentError> {
        let messages = self.messages.read().clone();
        let last_sfp_index = self.last_sfp_index.load(Ordering::SeqCst);
        let id = label.unwrap_or_else(|| Snapshot::default_id(last_sfp_index));
        let snapshot = Snapshot {
            id: id.clone(),
            messages,
            last_sfp_index,
            last_bookmark: Bookmark::new(self.event_bus.current_seq()),
            created_at: OffsetDateTime::now_utc(),
            metadata: None,
        };
        self.store
            .save_snapshot(&self.id, &snapshot)
            .await
            .map_err(AgentError::from)?;
        Ok(snapshot)
    }

    /// Loads `snapshot_id` from the store without mutating this agent; the
    /// caller constructs a new `Agent` (a fork) from the result via
    /// [`super::AgentDeps`] and [`super::Agent::resume`]-style assembly.
    pub async fn load_snapshot(&self, snapshot_id: &str) -> Result<Snapshot, AgentError> {
        self.store
            .load_snapshot(&self.id, snapshot_id)
            .await
            .map_err(AgentError::from)
    }
}
