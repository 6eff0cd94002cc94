//! # Deduplicating Publisher
//!
//! Suppresses re-delivery of messages seen within the last one to two
//! release periods.
//!
//! `publish_messages` only queues the batch. A single worker owns the
//! [`DedupCache`]: it forwards the unseen part of each batch to the wrapped
//! publisher and rotates the cache once per release period. Each batch is
//! classified against one cache state, never across a rotation.

use async_trait::async_trait;
use shared_types::MessageBatch;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::{cancelled, ShutdownSignal};
use crate::domain::{check_queue_capacity, ConfigError, DedupCache, PublishError};
use crate::ports::inbound::MessagePublisher;

pub struct DeduplicatingPublisher {
    queue: mpsc::Sender<MessageBatch>,
    release_period: Duration,
}

impl DeduplicatingPublisher {
    /// Start the dedup worker in front of `inner`.
    ///
    /// # Errors
    ///
    /// - `ConfigError::ZeroReleasePeriod` - `release_period` is zero
    /// - `ConfigError::ZeroQueueCapacity` - `capacity` is 0
    pub fn spawn(
        inner: Arc<dyn MessagePublisher>,
        release_period: Duration,
        capacity: usize,
        shutdown: ShutdownSignal,
    ) -> Result<Self, ConfigError> {
        if release_period.is_zero() {
            return Err(ConfigError::ZeroReleasePeriod);
        }
        check_queue_capacity(capacity)?;

        let (queue, rx) = mpsc::channel(capacity);
        tokio::spawn(run(inner, release_period, rx, shutdown));

        Ok(Self {
            queue,
            release_period,
        })
    }

    #[must_use]
    pub fn release_period(&self) -> Duration {
        self.release_period
    }
}

#[async_trait]
impl MessagePublisher for DeduplicatingPublisher {
    async fn publish_messages(&self, batch: MessageBatch) -> Result<(), PublishError> {
        self.queue
            .send(batch)
            .await
            .map_err(|_| PublishError::Stopped("dedup worker is not running".to_string()))
    }

    fn name(&self) -> &str {
        "dedup"
    }
}

async fn run(
    inner: Arc<dyn MessagePublisher>,
    release_period: Duration,
    mut rx: mpsc::Receiver<MessageBatch>,
    mut shutdown: ShutdownSignal,
) {
    let mut cache = DedupCache::new();
    let mut rotation = interval_at(Instant::now() + release_period, release_period);
    rotation.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(period = ?release_period, inner = inner.name(), "Dedup publisher started");

    loop {
        tokio::select! {
            biased;
            _ = cancelled(&mut shutdown) => break,
            _ = rotation.tick() => {
                let evicted = cache.rotate();
                debug!(epoch = cache.epoch(), evicted, remembered = cache.len(), "Dedup cache rotated");
            }
            next = rx.recv() => {
                let Some(batch) = next else { break };

                let fresh = cache.filter_new(&batch);
                if fresh.is_empty() {
                    debug!(size = batch.len(), "All messages recently published, skipping");
                    continue;
                }

                let forward: MessageBatch = if fresh.len() == batch.len() {
                    batch
                } else {
                    debug!(size = batch.len(), fresh = fresh.len(), "Dropping recently published messages");
                    fresh.into()
                };

                if let Err(e) = inner.publish_messages(forward).await {
                    warn!(publisher = inner.name(), error = %e, "Failed to forward batch");
                }
            }
        }
    }

    info!("Dedup publisher stopped");
}
