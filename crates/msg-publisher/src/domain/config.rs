//! Publisher pipeline configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::ConfigError;

/// Batches buffered per delivery queue before producers block.
pub const DEFAULT_QUEUE_CAPACITY: usize = 30;

/// Gossip topic messages are announced on.
pub const DEFAULT_GOSSIP_TOPIC: &str = "/msgs";

/// Floor for a release period derived from the block delay.
pub const MIN_DERIVED_RELEASE_PERIOD: Duration = Duration::from_secs(1);

/// Options consumed when assembling the pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    /// Include the gossip publisher in the fan-out set.
    pub enable_gossip: bool,
    /// Reconcile extra node senders against the registry on every publish.
    pub enable_multi_node: bool,
    /// Worker pool size; 0 disables the concurrency layer.
    pub concurrency: usize,
    /// Dedup release period in seconds.
    ///
    /// `None` or negative disables dedup, `0` derives the period from the
    /// block delay.
    pub cache_release_period_secs: Option<i64>,
    /// Capacity of every delivery queue.
    pub queue_capacity: usize,
    /// Gossip topic name.
    pub gossip_topic: String,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            enable_gossip: false,
            enable_multi_node: false,
            concurrency: 0,
            cache_release_period_secs: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            gossip_topic: DEFAULT_GOSSIP_TOPIC.to_string(),
        }
    }
}

impl PublisherConfig {
    /// Effective dedup release period, or `None` when dedup is off.
    #[must_use]
    pub fn resolve_release_period(&self, block_delay: Duration) -> Option<Duration> {
        match self.cache_release_period_secs {
            None => None,
            Some(secs) if secs < 0 => None,
            Some(0) => Some((block_delay / 3).max(MIN_DERIVED_RELEASE_PERIOD)),
            Some(secs) => Some(Duration::from_secs(secs.unsigned_abs())),
        }
    }

    /// Reject option combinations that cannot be assembled.
    ///
    /// # Errors
    ///
    /// - `ConfigError::ZeroQueueCapacity` - `queue_capacity` is 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_queue_capacity(self.queue_capacity)
    }
}

pub(crate) fn check_queue_capacity(capacity: usize) -> Result<(), ConfigError> {
    if capacity == 0 {
        return Err(ConfigError::ZeroQueueCapacity);
    }
    Ok(())
}
