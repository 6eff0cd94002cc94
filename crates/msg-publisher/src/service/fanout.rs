//! Fan-out publisher: forwards every batch to all sub-publishers.

use async_trait::async_trait;
use futures::future::join_all;
use shared_types::MessageBatch;
use std::sync::Arc;
use tracing::warn;

use crate::domain::PublishError;
use crate::ports::inbound::MessagePublisher;

/// Broadcasts each batch to an ordered set of publishers.
///
/// Sub-publishers run concurrently. A failing branch is logged and never
/// affects the others or the caller.
#[derive(Default)]
pub struct FanOutPublisher {
    publishers: Vec<Arc<dyn MessagePublisher>>,
}

impl FanOutPublisher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_publishers(publishers: Vec<Arc<dyn MessagePublisher>>) -> Self {
        Self { publishers }
    }

    /// Append a sub-publisher. Wiring happens before the first publish.
    pub fn add_publisher(&mut self, publisher: Arc<dyn MessagePublisher>) {
        self.publishers.push(publisher);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.publishers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.publishers.is_empty()
    }
}

#[async_trait]
impl MessagePublisher for FanOutPublisher {
    async fn publish_messages(&self, batch: MessageBatch) -> Result<(), PublishError> {
        if self.publishers.is_empty() {
            return Err(PublishError::NoPublishers);
        }

        let branches = self
            .publishers
            .iter()
            .map(|publisher| publisher.publish_messages(Arc::clone(&batch)));
        let results = join_all(branches).await;

        for (publisher, result) in self.publishers.iter().zip(results) {
            if let Err(e) = result {
                warn!(publisher = publisher.name(), error = %e, "Fan-out branch failed");
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "fan-out"
    }
}
