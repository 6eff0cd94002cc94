//! Gossip publisher: announces each message's encoding on a topic.

use async_trait::async_trait;
use shared_bus::{GossipTransport, Topic, TopicError};
use shared_types::MessageBatch;
use std::sync::Arc;
use tracing::trace;

use crate::domain::PublishError;
use crate::ports::inbound::MessagePublisher;

pub struct GossipPublisher {
    topic: Arc<dyn Topic>,
}

impl GossipPublisher {
    #[must_use]
    pub fn new(topic: Arc<dyn Topic>) -> Self {
        Self { topic }
    }

    /// Resolve `topic` on `transport`.
    ///
    /// # Errors
    ///
    /// Whatever the transport reports for the topic name.
    pub fn join(transport: &dyn GossipTransport, topic: &str) -> Result<Self, TopicError> {
        Ok(Self::new(transport.join_topic(topic)?))
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        self.topic.name()
    }
}

#[async_trait]
impl MessagePublisher for GossipPublisher {
    /// Publishes messages one payload at a time and stops at the first
    /// transport error.
    async fn publish_messages(&self, batch: MessageBatch) -> Result<(), PublishError> {
        for msg in batch.iter() {
            self.topic.publish(msg.serialized().to_vec()).await?;
            trace!(topic = self.topic.name(), cid = %msg.cid(), "Message gossiped");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "gossip"
    }
}
