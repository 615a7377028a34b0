//! Event bus bookmarks (§3, §4.1): a strictly increasing cross-session cursor.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Bookmark {
    pub seq: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl Bookmark {
    pub fn new(seq: u64) -> Self {
        Self {
            seq,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}
