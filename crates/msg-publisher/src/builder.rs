//! # Pipeline Assembly
//!
//! Builds the publisher chain from a [`PublisherConfig`]:
//!
//! ```text
//! [Dedup]? → [ConcurrencyLimited]? → FanOut(MultiNodeDispatcher, [Gossip]?)
//! ```
//!
//! Optional stages are left out when their option disables them.

use async_trait::async_trait;
use shared_bus::GossipTransport;
use shared_types::{MessageBatch, NodeDescriptor};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

use crate::domain::{ConfigError, PublishError, PublisherConfig};
use crate::ports::inbound::MessagePublisher;
use crate::ports::outbound::{MessageStore, NodeDialer, NodeRegistry};
use crate::service::{
    ConcurrencyLimitedPublisher, DeduplicatingPublisher, FanOutPublisher, GossipPublisher,
    MultiNodeDispatcher, NodeSender,
};

/// Block delay used to derive the dedup period when none is configured.
pub const DEFAULT_BLOCK_DELAY: Duration = Duration::from_secs(30);

pub struct PipelineBuilder {
    config: PublisherConfig,
    main_node: NodeDescriptor,
    dialer: Arc<dyn NodeDialer>,
    registry: Arc<dyn NodeRegistry>,
    store: Arc<dyn MessageStore>,
    gossip: Option<Arc<dyn GossipTransport>>,
    block_delay: Duration,
}

impl PipelineBuilder {
    pub fn new(
        config: PublisherConfig,
        main_node: NodeDescriptor,
        dialer: Arc<dyn NodeDialer>,
        registry: Arc<dyn NodeRegistry>,
        store: Arc<dyn MessageStore>,
    ) -> Self {
        Self {
            config,
            main_node,
            dialer,
            registry,
            store,
            gossip: None,
            block_delay: DEFAULT_BLOCK_DELAY,
        }
    }

    /// Gossip transport used when `enable_gossip` is set.
    #[must_use]
    pub fn with_gossip(mut self, transport: Arc<dyn GossipTransport>) -> Self {
        self.gossip = Some(transport);
        self
    }

    /// Network block delay, used to derive the dedup release period.
    #[must_use]
    pub fn with_block_delay(mut self, block_delay: Duration) -> Self {
        self.block_delay = block_delay;
        self
    }

    /// Dial the main node, start every worker and wire the chain.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - `PublishError::Config` - invalid options or missing gossip transport
    /// - `PublishError::Dial` - the main node could not be reached
    /// - `PublishError::Topic` - the gossip topic could not be joined
    pub async fn build(self) -> Result<Pipeline, PublishError> {
        self.config.validate()?;
        let capacity = self.config.queue_capacity;
        let (shutdown, signal) = watch::channel(false);

        let gossip = if self.config.enable_gossip {
            let transport = self
                .gossip
                .as_ref()
                .ok_or(ConfigError::MissingGossipTransport)?;
            Some(GossipPublisher::join(
                transport.as_ref(),
                &self.config.gossip_topic,
            )?)
        } else {
            None
        };

        let client = self.dialer.dial(&self.main_node).await?;
        let main = NodeSender::spawn(
            self.main_node.clone(),
            client,
            Arc::clone(&self.store),
            capacity,
            signal.clone(),
        )?;
        let dispatcher = Arc::new(MultiNodeDispatcher::new(
            main,
            self.config.enable_multi_node,
            Arc::clone(&self.registry),
            Arc::clone(&self.dialer),
            Arc::clone(&self.store),
            capacity,
            signal.clone(),
        ));

        let mut fanout = FanOutPublisher::new();
        fanout.add_publisher(dispatcher.clone());
        if let Some(gossip) = gossip {
            fanout.add_publisher(Arc::new(gossip));
        }
        let mut publisher: Arc<dyn MessagePublisher> = Arc::new(fanout);

        if self.config.concurrency > 0 {
            publisher = Arc::new(ConcurrencyLimitedPublisher::spawn(
                publisher,
                self.config.concurrency,
                capacity,
                signal.clone(),
            )?);
        }

        let release_period = self.config.resolve_release_period(self.block_delay);
        if let Some(period) = release_period {
            publisher = Arc::new(DeduplicatingPublisher::spawn(
                publisher,
                period,
                capacity,
                signal.clone(),
            )?);
        }

        info!(
            main_node = %self.main_node.id,
            multi_node = self.config.enable_multi_node,
            gossip = self.config.enable_gossip,
            concurrency = self.config.concurrency,
            dedup_period = ?release_period,
            "Publisher pipeline assembled"
        );

        Ok(Pipeline {
            publisher,
            dispatcher,
            shutdown,
        })
    }
}

/// An assembled publisher chain and the lifetime of its workers.
///
/// Dropping the pipeline stops every worker.
pub struct Pipeline {
    publisher: Arc<dyn MessagePublisher>,
    dispatcher: Arc<MultiNodeDispatcher>,
    shutdown: watch::Sender<bool>,
}

impl Pipeline {
    /// Outermost stage; what callers publish into.
    #[must_use]
    pub fn publisher(&self) -> Arc<dyn MessagePublisher> {
        Arc::clone(&self.publisher)
    }

    /// The RPC dispatcher, for inspecting live node senders.
    #[must_use]
    pub fn dispatcher(&self) -> &MultiNodeDispatcher {
        &self.dispatcher
    }

    /// Stop all workers. Queued batches are dropped.
    pub fn shutdown(&self) {
        info!("Shutting down publisher pipeline");
        self.shutdown.send_replace(true);
    }
}

#[async_trait]
impl MessagePublisher for Pipeline {
    async fn publish_messages(&self, batch: MessageBatch) -> Result<(), PublishError> {
        self.publisher.publish_messages(batch).await
    }

    fn name(&self) -> &str {
        self.publisher.name()
    }
}
