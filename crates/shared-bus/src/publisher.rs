//! # Topic Publisher
//!
//! Defines the publishing side of the gossip transport and an in-memory
//! implementation backed by `tokio::sync::broadcast`.

use crate::subscriber::TopicSubscription;
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

/// Errors from topic operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TopicError {
    /// Topic names must be non-empty.
    #[error("Topic name must not be empty")]
    EmptyName,

    /// The transport has been shut down.
    #[error("Topic {0} is closed")]
    Closed(String),

    /// Transport-specific failure.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// A joined gossip topic that accepts byte payloads.
#[async_trait]
pub trait Topic: Send + Sync {
    /// The topic name this handle publishes to.
    fn name(&self) -> &str;

    /// Publish one payload to every subscriber of the topic.
    async fn publish(&self, payload: Vec<u8>) -> Result<(), TopicError>;
}

/// A gossip network that can resolve topic names into publishable handles.
pub trait GossipTransport: Send + Sync {
    /// Join (or resolve) a topic by name.
    ///
    /// # Errors
    ///
    /// - `TopicError::EmptyName` - `name` is empty
    /// - `TopicError::Closed` - the transport no longer accepts topics
    fn join_topic(&self, name: &str) -> Result<Arc<dyn Topic>, TopicError>;
}

/// In-memory gossip transport.
///
/// Each topic name maps to one broadcast channel. Suitable for single-process
/// operation and tests; networked deployments plug in a different
/// [`GossipTransport`].
pub struct InMemoryTopicBus {
    /// Broadcast sender per topic name.
    topics: RwLock<HashMap<String, broadcast::Sender<Vec<u8>>>>,

    /// Total payloads published across all topics.
    published: Arc<AtomicU64>,

    /// Channel capacity per topic.
    capacity: usize,
}

impl InMemoryTopicBus {
    /// Create a new bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new bus with the given per-topic capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            published: Arc::new(AtomicU64::new(0)),
            capacity,
        }
    }

    /// Subscribe to a topic, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns `TopicError::EmptyName` for an empty topic name.
    pub fn subscribe(&self, name: &str) -> Result<TopicSubscription, TopicError> {
        let sender = self.sender_for(name)?;
        debug!(topic = name, "New topic subscription created");
        Ok(TopicSubscription::new(name.to_string(), sender.subscribe()))
    }

    /// Number of live subscribers on a topic.
    #[must_use]
    pub fn subscriber_count(&self, name: &str) -> usize {
        self.topics
            .read()
            .ok()
            .and_then(|topics| topics.get(name).map(broadcast::Sender::receiver_count))
            .unwrap_or(0)
    }

    /// Total payloads published across all topics.
    #[must_use]
    pub fn payloads_published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Get the per-topic channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn sender_for(&self, name: &str) -> Result<broadcast::Sender<Vec<u8>>, TopicError> {
        if name.is_empty() {
            return Err(TopicError::EmptyName);
        }

        if let Some(sender) = self
            .topics
            .read()
            .map_err(|_| TopicError::Closed(name.to_string()))?
            .get(name)
        {
            return Ok(sender.clone());
        }

        let mut topics = self
            .topics
            .write()
            .map_err(|_| TopicError::Closed(name.to_string()))?;
        let sender = topics
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        Ok(sender.clone())
    }
}

impl Default for InMemoryTopicBus {
    fn default() -> Self {
        Self::new()
    }
}

impl GossipTransport for InMemoryTopicBus {
    fn join_topic(&self, name: &str) -> Result<Arc<dyn Topic>, TopicError> {
        let sender = self.sender_for(name)?;
        Ok(Arc::new(InMemoryTopic {
            name: name.to_string(),
            sender,
            published: Arc::clone(&self.published),
        }))
    }
}

/// Topic handle returned by [`InMemoryTopicBus::join_topic`].
struct InMemoryTopic {
    name: String,
    sender: broadcast::Sender<Vec<u8>>,
    published: Arc<AtomicU64>,
}

#[async_trait]
impl Topic for InMemoryTopic {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, payload: Vec<u8>) -> Result<(), TopicError> {
        self.published.fetch_add(1, Ordering::Relaxed);

        match self.sender.send(payload) {
            Ok(receivers) => {
                debug!(topic = %self.name, receivers, "Payload published");
            }
            Err(_) => {
                // Gossip is best effort: nobody listening is not a failure.
                debug!(topic = %self.name, "Payload dropped (no subscribers)");
            }
        }
        Ok(())
    }
}
