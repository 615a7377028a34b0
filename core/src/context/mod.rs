//! Token estimation and history compression (§4.8).

use std::sync::Arc;

use agent_protocol::event::Envelope;
use agent_protocol::history::{CompressionRecord, HistoryWindow, HistoryWindowStats, RecoveredFile};
use agent_protocol::message::{ContentBlock, Message, Role};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::config::ContextOptions;
use crate::file_pool::FilePool;

const CHARS_PER_TOKEN: usize = 4;
const MULTIMODAL_TOKEN_ESTIMATE: u64 = 500;

pub struct Analysis {
    pub estimated_tokens: u64,
    pub should_compress: bool,
}

pub struct CompressionOutcome {
    pub summary: Message,
    pub removed_messages: Vec<Message>,
    pub retained_messages: Vec<Message>,
    pub ratio: f64,
    pub history_window: HistoryWindow,
    pub compression_record: CompressionRecord,
    pub recovered_files: Vec<RecoveredFile>,
}

pub struct ContextManager {
    options: ContextOptions,
}

impl ContextManager {
    pub fn new(options: ContextOptions) -> Self {
        Self { options }
    }

    /// ~4 chars/token for text and reasoning; multimodal blocks count as a
    /// flat 500 tokens each.
    pub fn analyze(&self, messages: &[Message]) -> Analysis {
        let total = estimate_tokens(messages);
        Analysis {
            estimated_tokens: total,
            should_compress: total > self.options.max_tokens,
        }
    }

    pub async fn compress(
        &self,
        messages: &[Message],
        events: &[Envelope],
        file_pool: Option<&Arc<FilePool>>,
    ) -> CompressionOutcome {
        let now = OffsetDateTime::now_utc();
        let total_tokens = estimate_tokens(messages);

        let window = HistoryWindow {
            id: HistoryWindow::id_for(now),
            messages: messages.to_vec(),
            events: events.to_vec(),
            stats: HistoryWindowStats {
                message_count: messages.len(),
                estimated_tokens: total_tokens,
            },
            timestamp: now,
        };

        let keep_recent = self.options.multimodal_retention.keep_recent;
        let target_fraction = (self.options.compress_to_tokens as f64 / total_tokens.max(1) as f64)
            .max(0.6);
        let base_keep = ((messages.len() as f64) * target_fraction).ceil() as usize;
        let base_keep = base_keep.min(messages.len());

        let multimodal_indices: Vec<usize> = messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m.content.iter().any(ContentBlock::is_multimodal))
            .map(|(i, _)| i)
            .collect();
        let retained_multimodal_from: Vec<usize> = multimodal_indices
            .iter()
            .rev()
            .take(keep_recent)
            .copied()
            .collect();
        let earliest_retained_multimodal = retained_multimodal_from.iter().copied().min();

        let split_at = match earliest_retained_multimodal {
            Some(idx) => (messages.len() - base_keep).min(idx),
            None => messages.len() - base_keep,
        };

        let removed_messages: Vec<Message> = messages[..split_at].to_vec();
        let retained_messages: Vec<Message> = messages[split_at..].to_vec();

        let summary_text = build_summary(&removed_messages, now, &window.id);
        let summary = Message::text(Role::System, summary_text.clone());

        let ratio = if messages.is_empty() {
            1.0
        } else {
            retained_messages.len() as f64 / messages.len() as f64
        };

        let mut recovered_files = Vec::new();
        if let Some(pool) = file_pool {
            let _ = pool;
            // FilePool exposes only per-path freshness queries, not an
            // enumerable "accessed set" yet; the pipeline's caller is
            // expected to pass the paths it wants snapshotted. Left empty
            // here deliberately until that contract is extended.
        }

        let compression_record = CompressionRecord {
            id: Uuid::new_v4().to_string(),
            window_id: window.id.clone(),
            summary: CompressionRecord::truncate_summary(&summary_text),
            ratio,
            recovered_file_ids: recovered_files.iter().map(|f: &RecoveredFile| f.id.clone()).collect(),
            timestamp: now,
        };

        CompressionOutcome {
            summary,
            removed_messages,
            retained_messages,
            ratio,
            history_window: window,
            compression_record,
            recovered_files,
        }
    }
}

fn estimate_tokens(messages: &[Message]) -> u64 {
    messages
        .iter()
        .flat_map(|m| m.content.iter())
        .map(|block| match block {
            ContentBlock::Text { text } | ContentBlock::Reasoning { text } => {
                (text.len() / CHARS_PER_TOKEN).max(1) as u64
            }
            ContentBlock::Image { .. } | ContentBlock::Audio { .. } | ContentBlock::File { .. } => {
                MULTIMODAL_TOKEN_ESTIMATE
            }
            ContentBlock::ToolUse { input, .. } => {
                (input.to_string().len() / CHARS_PER_TOKEN).max(1) as u64
            }
            ContentBlock::ToolResult { content, .. } => {
                (content.to_string().len() / CHARS_PER_TOKEN).max(1) as u64
            }
        })
        .sum()
}

fn build_summary(removed: &[Message], now: OffsetDateTime, window_id: &str) -> String {
    let mut body = String::new();
    for message in removed {
        body.push_str(&format!("[{:?}]\n", message.role));
        for block in &message.content {
            let preview = match block {
                ContentBlock::Text { text } | ContentBlock::Reasoning { text } => {
                    truncate(text, 100)
                }
                ContentBlock::Image { mime, .. } => {
                    format!("[image-summary id={} mime={mime} note=source=compression]", message.id)
                }
                ContentBlock::Audio { mime, .. } => {
                    format!("[audio-summary id={} mime={mime} note=source=compression]", message.id)
                }
                ContentBlock::File { mime, name, .. } => format!(
                    "[file-summary id={} mime={mime} name={:?} note=source=compression]",
                    message.id, name
                ),
                ContentBlock::ToolUse { name, input, .. } => format!("[tool] {name}({input})"),
                ContentBlock::ToolResult { content, .. } => {
                    format!("[result] {}", truncate(&content.to_string(), 100))
                }
            };
            body.push_str(&preview);
            body.push('\n');
        }
    }
    format!("<context-summary timestamp={now} window={window_id}>\n{body}</context-summary>")
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_text_message(chars: usize) -> Message {
        Message::text(Role::User, "x".repeat(chars))
    }

    #[test]
    fn analyze_flags_compression_above_threshold() {
        let manager = ContextManager::new(ContextOptions {
            max_tokens: 100,
            compress_to_tokens: 60,
            multimodal_retention: Default::default(),
        });
        let messages = vec![long_text_message(1000)];
        let analysis = manager.analyze(&messages);
        assert!(analysis.should_compress);
    }

    #[tokio::test]
    async fn compress_retains_a_tail_and_produces_a_summary_message() {
        let manager = ContextManager::new(ContextOptions {
            max_tokens: 1000,
            compress_to_tokens: 600,
            multimodal_retention: crate::config::MultimodalRetention { keep_recent: 2 },
        });
        let messages: Vec<Message> = (0..20).map(|i| Message::text(Role::User, format!("m{i}"))).collect();
        let outcome = manager.compress(&messages, &[], None).await;
        assert!(!outcome.retained_messages.is_empty());
        assert!(matches!(outcome.summary.content[0], ContentBlock::Text { .. }));
        assert_eq!(outcome.history_window.messages.len(), 20);
    }
}
