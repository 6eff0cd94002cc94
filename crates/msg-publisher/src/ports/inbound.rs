//! Inbound port (API) of the publisher pipeline.

use async_trait::async_trait;
use shared_types::MessageBatch;

use crate::domain::PublishError;

/// Broadcast a batch of signed messages.
///
/// Every pipeline stage implements this and delegates to the next stage
/// through the same trait. Stages never mutate the batch; they only decide
/// whether and where to forward it.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Hand a batch to this stage.
    ///
    /// # Errors
    ///
    /// Stage-specific; see each implementation. Asynchronous stages only fail
    /// when their worker has stopped.
    async fn publish_messages(&self, batch: MessageBatch) -> Result<(), PublishError>;

    /// Short stage name used in logs.
    fn name(&self) -> &str {
        "publisher"
    }
}
