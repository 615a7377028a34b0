//! Archival records written by the context manager before a compression (§3, §4.8).

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::event::Envelope;
use crate::message::Message;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryWindowStats {
    pub message_count: usize,
    pub estimated_tokens: u64,
}

/// The full pre-compression messages + events, saved before anything is
/// dropped from the live conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryWindow {
    pub id: String,
    pub messages: Vec<Message>,
    pub events: Vec<Envelope>,
    pub stats: HistoryWindowStats,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl HistoryWindow {
    /// `window-<ts>` id as produced by the compression step.
    pub fn id_for(timestamp: OffsetDateTime) -> String {
        format!("window-{}", timestamp.unix_timestamp())
    }
}

/// Summary text, ratio, and references to files snapshotted during a
/// compression. Summary text is capped at 500 chars before storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionRecord {
    pub id: String,
    pub window_id: String,
    pub summary: String,
    pub ratio: f64,
    pub recovered_file_ids: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl CompressionRecord {
    pub const SUMMARY_MAX_CHARS: usize = 500;

    pub fn truncate_summary(summary: &str) -> String {
        summary.chars().take(Self::SUMMARY_MAX_CHARS).collect()
    }
}

/// A file snapshotted out of `FilePool`'s accessed set during compression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveredFile {
    pub id: String,
    pub path: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub captured_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_is_truncated_to_500_chars() {
        let long = "x".repeat(900);
        let truncated = CompressionRecord::truncate_summary(&long);
        assert_eq!(truncated.chars().count(), 500);
    }
}
