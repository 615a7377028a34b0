//! The event bus (§4.1): three logical channels, bookmarks, replay and
//! backpressure. Subscribers get unbounded per-subscriber queues rather than
//! a lossy `broadcast` channel, per the replay/backpressure contract in
//! §4.1/§9.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use agent_protocol::bookmark::Bookmark;
use agent_protocol::event::{Channel, Envelope, Event};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

use crate::store::Store;

const RETAIN_MIN: usize = 5000;
const RETAIN_MAX: usize = 10000;
const RETRY_BUFFER_MAX: usize = 1000;

pub struct Subscription {
    pub receiver: mpsc::UnboundedReceiver<Envelope>,
    id: u64,
    bus: Arc<EventBusInner>,
}

impl Subscription {
    /// Stop receiving and release this subscriber's queue (§4.1 backpressure).
    pub fn close(self) {
        self.bus.remove_subscriber(self.id);
    }
}

struct SubscriberEntry {
    id: u64,
    channels: Vec<Channel>,
    kinds: Option<Vec<String>>,
    sender: mpsc::UnboundedSender<Envelope>,
}

struct EventBusInner {
    sequence: AtomicU64,
    cursor: AtomicU64,
    subscriber_id: AtomicU64,
    ring: Mutex<VecDeque<Envelope>>,
    subscribers: Mutex<Vec<SubscriberEntry>>,
    retry_buffer: Mutex<VecDeque<Envelope>>,
    store: Arc<dyn Store>,
}

impl EventBusInner {
    fn remove_subscriber(&self, id: u64) {
        self.subscribers.lock().retain(|s| s.id != id);
    }
}

/// Publishes envelopes on three channels; supports subscription with `since`
/// bookmark replay and kind filtering.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<EventBusInner>,
}

impl EventBus {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            inner: Arc::new(EventBusInner {
                sequence: AtomicU64::new(0),
                cursor: AtomicU64::new(0),
                subscriber_id: AtomicU64::new(0),
                ring: Mutex::new(VecDeque::new()),
                subscribers: Mutex::new(Vec::new()),
                retry_buffer: Mutex::new(VecDeque::new()),
                store,
            }),
        }
    }

    /// Emits `event`, assigning a strictly-increasing bookmark and cursor,
    /// fanning out to matching subscribers, and persisting asynchronously.
    #[instrument(name = "event_bus.emit", skip(self, event), fields(channel))]
    pub async fn emit(&self, agent_id: &str, event: Event) -> Envelope {
        let channel = event.channel();
        tracing::Span::current().record("channel", tracing::field::debug(&channel));

        let seq = self.inner.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let cursor = self.inner.cursor.fetch_add(1, Ordering::SeqCst) + 1;
        let envelope = Envelope {
            cursor,
            bookmark: Bookmark::new(seq),
            event,
        };

        {
            let mut ring = self.inner.ring.lock();
            ring.push_back(envelope.clone());
            while ring.len() > RETAIN_MAX {
                ring.pop_front();
            }
            let _ = RETAIN_MIN;
        }

        self.dispatch(&envelope);

        if let Err(err) = self.inner.store.append_event(agent_id, &envelope).await {
            if envelope.event.is_critical() {
                warn!(?err, "critical event persistence failed, buffering for retry");
                let mut retry = self.inner.retry_buffer.lock();
                retry.push_back(envelope.clone());
                while retry.len() > RETRY_BUFFER_MAX {
                    retry.pop_front();
                }
                drop(retry);
                let synthetic = Event::Monitor(
                    agent_protocol::event::MonitorEventKind::StorageFailure {
                        detail: err.to_string(),
                    },
                );
                self.dispatch_raw(synthetic);
            } else {
                debug!(?err, "non-critical event persistence failed");
            }
        }

        envelope
    }

    fn dispatch(&self, envelope: &Envelope) {
        let subscribers = self.inner.subscribers.lock();
        for sub in subscribers.iter() {
            if !sub.channels.contains(&envelope.event.channel()) {
                continue;
            }
            if let Some(kinds) = &sub.kinds {
                if !kinds.iter().any(|k| k == event_kind_name(&envelope.event)) {
                    continue;
                }
            }
            // Unbounded: a slow subscriber accumulates in its own queue,
            // never dropped. `send` only errs if the receiver was dropped.
            let _ = sub.sender.send(envelope.clone());
        }
    }

    /// Dispatch a synthetic event (e.g. `storage_failure`) without assigning
    /// it a new bookmark or persisting it; it exists only for live observers.
    fn dispatch_raw(&self, event: Event) {
        let cursor = self.inner.cursor.fetch_add(1, Ordering::SeqCst) + 1;
        let seq = self.inner.sequence.load(Ordering::SeqCst);
        let envelope = Envelope {
            cursor,
            bookmark: Bookmark::new(seq),
            event,
        };
        self.dispatch(&envelope);
    }

    /// Subscribe to `channels`, optionally replaying everything with
    /// `bookmark.seq > since.seq` (store-backed, then in-memory ring) before
    /// live delivery begins.
    #[instrument(name = "event_bus.subscribe", skip(self))]
    pub async fn subscribe(
        &self,
        agent_id: &str,
        channels: Vec<Channel>,
        since: Option<Bookmark>,
        kinds: Option<Vec<String>>,
    ) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.inner.subscriber_id.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(since) = since {
            let replay = self
                .inner
                .store
                .read_events(agent_id, Some(since), None)
                .await
                .unwrap_or_default();
            for envelope in replay {
                if envelope.bookmark.seq <= since.seq {
                    continue;
                }
                if !channels.contains(&envelope.event.channel()) {
                    continue;
                }
                if let Some(kinds) = &kinds {
                    if !kinds.iter().any(|k| k == event_kind_name(&envelope.event)) {
                        continue;
                    }
                }
                let _ = tx.send(envelope);
            }
        }

        self.inner.subscribers.lock().push(SubscriberEntry {
            id,
            channels,
            kinds,
            sender: tx,
        });

        Subscription {
            receiver: rx,
            id,
            bus: self.inner.clone(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    pub fn current_seq(&self) -> u64 {
        self.inner.sequence.load(Ordering::SeqCst)
    }
}

fn event_kind_name(event: &Event) -> &'static str {
    use agent_protocol::event::{ControlEventKind, MonitorEventKind, ProgressEventKind};
    match event {
        Event::Progress(p) => match p {
            ProgressEventKind::TextChunkStart { .. } => "text_chunk_start",
            ProgressEventKind::TextChunk { .. } => "text_chunk",
            ProgressEventKind::TextChunkEnd { .. } => "text_chunk_end",
            ProgressEventKind::ThinkChunkStart => "think_chunk_start",
            ProgressEventKind::ThinkChunkEnd => "think_chunk_end",
            ProgressEventKind::ToolStart { .. } => "tool:start",
            ProgressEventKind::ToolEnd { .. } => "tool:end",
            ProgressEventKind::ToolError { .. } => "tool:error",
            ProgressEventKind::Done { .. } => "done",
        },
        Event::Control(c) => match c {
            ControlEventKind::PermissionRequired { .. } => "permission_required",
            ControlEventKind::PermissionDecided { .. } => "permission_decided",
        },
        Event::Monitor(m) => match m {
            MonitorEventKind::StateChanged { .. } => "state_changed",
            MonitorEventKind::BreakpointChanged { .. } => "breakpoint_changed",
            MonitorEventKind::ToolExecuted { .. } => "tool_executed",
            MonitorEventKind::Error { .. } => "error",
            MonitorEventKind::TokenUsage { .. } => "token_usage",
            MonitorEventKind::ContextCompression { .. } => "context_compression",
            MonitorEventKind::SchedulerTriggered { .. } => "scheduler_triggered",
            MonitorEventKind::ReminderSent { .. } => "reminder_sent",
            MonitorEventKind::FileChanged { .. } => "file_changed",
            MonitorEventKind::StepComplete { .. } => "step_complete",
            MonitorEventKind::AgentResumed { .. } => "agent_resumed",
            MonitorEventKind::StorageFailure { .. } => "storage_failure",
            MonitorEventKind::ToolManualUpdated => "tool_manual_updated",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use agent_protocol::event::{DoneReason, ProgressEventKind};

    #[tokio::test]
    async fn bookmarks_are_strictly_increasing() {
        let bus = EventBus::new(Arc::new(MemoryStore::new()));
        let a = bus
            .emit("agent-1", Event::Progress(ProgressEventKind::ThinkChunkStart))
            .await;
        let b = bus
            .emit("agent-1", Event::Progress(ProgressEventKind::ThinkChunkEnd))
            .await;
        assert!(a.bookmark.seq < b.bookmark.seq);
        assert!(a.cursor < b.cursor);
    }

    #[tokio::test]
    async fn subscriber_receives_only_matching_channel() {
        let bus = EventBus::new(Arc::new(MemoryStore::new()));
        let mut sub = bus
            .subscribe("agent-1", vec![Channel::Progress], None, None)
            .await;
        bus.emit(
            "agent-1",
            Event::Monitor(agent_protocol::event::MonitorEventKind::StepComplete {
                step_count: 1,
            }),
        )
        .await;
        bus.emit(
            "agent-1",
            Event::Progress(ProgressEventKind::Done {
                reason: DoneReason::Completed,
            }),
        )
        .await;
        let received = sub.receiver.recv().await.unwrap();
        assert_eq!(received.event.channel(), Channel::Progress);
        assert!(sub.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn replay_never_yields_entries_at_or_below_since() {
        let store = Arc::new(MemoryStore::new());
        let bus = EventBus::new(store);
        let first = bus
            .emit("agent-1", Event::Progress(ProgressEventKind::ThinkChunkStart))
            .await;
        bus.emit("agent-1", Event::Progress(ProgressEventKind::ThinkChunkEnd))
            .await;

        let mut sub = bus
            .subscribe("agent-1", vec![Channel::Progress], Some(first.bookmark), None)
            .await;
        let replayed = sub.receiver.recv().await.unwrap();
        assert!(replayed.bookmark.seq > first.bookmark.seq);
    }
}
