//! Concurrency-limited publisher: a fixed worker pool behind one queue.

use async_trait::async_trait;
use shared_types::MessageBatch;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use super::{cancelled, ShutdownSignal};
use crate::domain::{check_queue_capacity, ConfigError, PublishError};
use crate::ports::inbound::MessagePublisher;

/// Spreads batches over `workers` tasks that call the wrapped publisher.
///
/// At most `workers` calls into the wrapped publisher are in flight at any
/// time. Batches leave the queue in arrival order but may complete in any
/// order.
pub struct ConcurrencyLimitedPublisher {
    queue: mpsc::Sender<MessageBatch>,
    workers: usize,
}

impl ConcurrencyLimitedPublisher {
    /// # Errors
    ///
    /// - `ConfigError::ZeroWorkers` - `workers` is 0
    /// - `ConfigError::ZeroQueueCapacity` - `capacity` is 0
    pub fn spawn(
        inner: Arc<dyn MessagePublisher>,
        workers: usize,
        capacity: usize,
        shutdown: ShutdownSignal,
    ) -> Result<Self, ConfigError> {
        if workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        check_queue_capacity(capacity)?;

        let (queue, rx) = mpsc::channel(capacity);
        let rx = Arc::new(Mutex::new(rx));
        for worker in 0..workers {
            tokio::spawn(run_worker(
                worker,
                Arc::clone(&inner),
                Arc::clone(&rx),
                shutdown.clone(),
            ));
        }
        info!(workers, inner = inner.name(), "Concurrency-limited publisher started");

        Ok(Self { queue, workers })
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }
}

#[async_trait]
impl MessagePublisher for ConcurrencyLimitedPublisher {
    async fn publish_messages(&self, batch: MessageBatch) -> Result<(), PublishError> {
        self.queue
            .send(batch)
            .await
            .map_err(|_| PublishError::Stopped("publisher workers are not running".to_string()))
    }

    fn name(&self) -> &str {
        "concurrent"
    }
}

async fn run_worker(
    worker: usize,
    inner: Arc<dyn MessagePublisher>,
    queue: Arc<Mutex<mpsc::Receiver<MessageBatch>>>,
    mut shutdown: ShutdownSignal,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancelled(&mut shutdown) => break,
            next = async { queue.lock().await.recv().await } => next,
        };
        let Some(batch) = next else { break };

        if let Err(e) = inner.publish_messages(batch).await {
            warn!(worker, publisher = inner.name(), error = %e, "Failed to publish batch");
        }
    }
    debug!(worker, "Publisher worker stopped");
}
