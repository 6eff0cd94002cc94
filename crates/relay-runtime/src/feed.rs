//! # Message Feed
//!
//! Reads signed messages, one JSON object per line, records them in the
//! message store and publishes each as a single-message batch.

use msg_publisher::MessagePublisher;
use shared_types::{MessageBatch, SignedMessage};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

use crate::adapters::InMemoryMessageStore;

/// Counters for one feed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub published: u64,
    pub malformed: u64,
    pub failed: u64,
}

/// Consume `reader` until EOF.
///
/// Malformed lines and publish failures are logged and counted; neither
/// stops the feed.
///
/// # Errors
///
/// Only I/O errors from `reader`.
pub async fn run_feed<R>(
    reader: R,
    store: &InMemoryMessageStore,
    publisher: &dyn MessagePublisher,
) -> std::io::Result<FeedStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = FeedStats::default();
    let mut lines = reader.lines();
    let mut line_no = 0u64;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let msg: SignedMessage = match serde_json::from_str(line) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(line = line_no, error = %e, "Skipping malformed message");
                stats.malformed += 1;
                continue;
            }
        };

        let record = store.insert(&msg);
        let batch: MessageBatch = Arc::from(vec![msg]);
        match publisher.publish_messages(batch).await {
            Ok(()) => {
                debug!(record = %record.id, cid = %record.cid, "Message published");
                stats.published += 1;
            }
            Err(e) => {
                warn!(record = %record.id, error = %e, "Publish failed");
                stats.failed += 1;
            }
        }
    }

    Ok(stats)
}
