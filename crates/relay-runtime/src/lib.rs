//! # Relay Runtime Library
//!
//! Wires the message publisher pipeline to concrete adapters. The
//! executable entry point is `main.rs`; the library is exposed for tests.
//!
//! ## Startup Sequence
//!
//! 1. Load [`RelayConfig`] (defaults, then `RELAY_*` environment)
//! 2. Create the store, the node registry and the gossip bus
//! 3. Dial the main node and assemble the pipeline
//! 4. Feed messages until EOF or Ctrl-C
//! 5. Shut the pipeline down

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod config;
pub mod feed;

use msg_publisher::{NodeDialer, Pipeline, PipelineBuilder, PublishError};
use shared_bus::InMemoryTopicBus;
use std::sync::Arc;
use tracing::info;

use crate::adapters::{InMemoryMessageStore, JsonRpcDialer, StaticNodeRegistry};

pub use config::RelayConfig;
pub use feed::{run_feed, FeedStats};

/// Shared adapters of one relay process.
pub struct RelayRuntime {
    config: RelayConfig,
    store: Arc<InMemoryMessageStore>,
    registry: Arc<StaticNodeRegistry>,
    gossip: Arc<InMemoryTopicBus>,
}

impl RelayRuntime {
    #[must_use]
    pub fn new(config: RelayConfig) -> Self {
        let registry = Arc::new(StaticNodeRegistry::new(config.nodes.clone()));
        Self {
            config,
            store: Arc::new(InMemoryMessageStore::new()),
            registry,
            gossip: Arc::new(InMemoryTopicBus::new()),
        }
    }

    /// Assemble the pipeline over HTTP JSON-RPC connections.
    ///
    /// # Errors
    ///
    /// See [`PipelineBuilder::build`].
    pub async fn start(&self) -> Result<Pipeline, PublishError> {
        let dialer = Arc::new(JsonRpcDialer::new(self.config.rpc_timeout()));
        self.start_with_dialer(dialer).await
    }

    /// Assemble the pipeline with a caller-supplied dialer.
    ///
    /// # Errors
    ///
    /// See [`PipelineBuilder::build`].
    pub async fn start_with_dialer(
        &self,
        dialer: Arc<dyn NodeDialer>,
    ) -> Result<Pipeline, PublishError> {
        info!(
            main_node = %self.config.main_node.url,
            extra_nodes = self.registry.len(),
            "Starting relay runtime"
        );

        PipelineBuilder::new(
            self.config.publisher.clone(),
            self.config.main_node.clone(),
            dialer,
            self.registry.clone(),
            self.store.clone(),
        )
        .with_gossip(self.gossip.clone())
        .with_block_delay(self.config.block_delay())
        .build()
        .await
    }

    #[must_use]
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> Arc<InMemoryMessageStore> {
        Arc::clone(&self.store)
    }

    #[must_use]
    pub fn registry(&self) -> Arc<StaticNodeRegistry> {
        Arc::clone(&self.registry)
    }

    #[must_use]
    pub fn gossip(&self) -> Arc<InMemoryTopicBus> {
        Arc::clone(&self.gossip)
    }
}
