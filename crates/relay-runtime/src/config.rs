//! # Relay Configuration
//!
//! Runtime configuration with defaults and `RELAY_*` environment overrides.
//!
//! | variable | effect |
//! |---|---|
//! | `RELAY_MAIN_NODE_URL` / `RELAY_MAIN_NODE_TOKEN` | main node endpoint |
//! | `RELAY_NODES` | extra nodes, `id=url#token,...` |
//! | `RELAY_ENABLE_GOSSIP` / `RELAY_ENABLE_MULTI_NODE` | `true` / `false` |
//! | `RELAY_CONCURRENCY` | worker pool size, 0 disables |
//! | `RELAY_CACHE_RELEASE_PERIOD` | seconds; 0 derives from block delay, negative disables |
//! | `RELAY_QUEUE_CAPACITY` | batches per delivery queue |
//! | `RELAY_GOSSIP_TOPIC` | gossip topic name |
//! | `RELAY_BLOCK_DELAY_SECS` | network block delay |
//! | `RELAY_RPC_TIMEOUT_SECS` | per-request RPC timeout |

use msg_publisher::PublisherConfig;
use shared_types::NodeDescriptor;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid node entry {0:?}, expected id=url#token")]
    InvalidNodeEntry(String),

    #[error("duplicate node id {0}")]
    DuplicateNode(String),

    #[error("main node url must not be empty")]
    MissingMainNode,
}

/// Complete relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// The fixed main node every batch goes to.
    pub main_node: NodeDescriptor,
    /// Extra nodes served by the static registry.
    pub nodes: Vec<NodeDescriptor>,
    /// Pipeline options.
    pub publisher: PublisherConfig,
    /// Network block delay in seconds.
    pub block_delay_secs: u64,
    /// Per-request RPC timeout in seconds.
    pub rpc_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            main_node: NodeDescriptor::new("main", "main", "http://127.0.0.1:1234/rpc/v1", ""),
            nodes: Vec::new(),
            publisher: PublisherConfig::default(),
            block_delay_secs: 30,
            rpc_timeout_secs: 60,
        }
    }
}

impl RelayConfig {
    /// Load configuration from process environment.
    ///
    /// # Errors
    ///
    /// See [`RelayConfig::from_lookup`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Unparseable numbers and booleans are logged and the default kept;
    /// malformed node lists are rejected.
    ///
    /// # Errors
    ///
    /// - `ConfigError::InvalidNodeEntry` - a `RELAY_NODES` entry is malformed
    /// - `ConfigError::DuplicateNode` - two nodes share an ID
    /// - `ConfigError::MissingMainNode` - the main node URL is empty
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("RELAY_MAIN_NODE_URL") {
            config.main_node.url = url;
        }
        if let Some(token) = lookup("RELAY_MAIN_NODE_TOKEN") {
            config.main_node.token = token;
            info!("Loaded main node token from environment");
        }
        if config.main_node.url.is_empty() {
            return Err(ConfigError::MissingMainNode);
        }

        if let Some(nodes) = lookup("RELAY_NODES") {
            config.nodes = parse_nodes(&nodes)?;
        }

        let publisher = &mut config.publisher;
        override_parsed(&lookup, "RELAY_ENABLE_GOSSIP", &mut publisher.enable_gossip);
        override_parsed(&lookup, "RELAY_ENABLE_MULTI_NODE", &mut publisher.enable_multi_node);
        override_parsed(&lookup, "RELAY_CONCURRENCY", &mut publisher.concurrency);
        override_parsed(&lookup, "RELAY_QUEUE_CAPACITY", &mut publisher.queue_capacity);
        if let Some(topic) = lookup("RELAY_GOSSIP_TOPIC") {
            publisher.gossip_topic = topic;
        }
        if let Some(raw) = lookup("RELAY_CACHE_RELEASE_PERIOD") {
            match raw.trim().parse::<i64>() {
                Ok(secs) => publisher.cache_release_period_secs = Some(secs),
                Err(_) => warn!(value = %raw, "RELAY_CACHE_RELEASE_PERIOD must be an integer"),
            }
        }

        override_parsed(&lookup, "RELAY_BLOCK_DELAY_SECS", &mut config.block_delay_secs);
        override_parsed(&lookup, "RELAY_RPC_TIMEOUT_SECS", &mut config.rpc_timeout_secs);

        Ok(config)
    }

    #[must_use]
    pub fn block_delay(&self) -> Duration {
        Duration::from_secs(self.block_delay_secs)
    }

    #[must_use]
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *target = value,
        Err(_) => warn!(key, value = %raw, "Ignoring unparseable configuration value"),
    }
}

/// Parse `id=url#token` entries separated by commas. The token is optional.
///
/// # Errors
///
/// - `ConfigError::InvalidNodeEntry` - an entry lacks an id or url
/// - `ConfigError::DuplicateNode` - an id appears twice
pub fn parse_nodes(raw: &str) -> Result<Vec<NodeDescriptor>, ConfigError> {
    let mut nodes: Vec<NodeDescriptor> = Vec::new();

    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (id, rest) = entry
            .split_once('=')
            .ok_or_else(|| ConfigError::InvalidNodeEntry(entry.to_string()))?;
        let (url, token) = rest.split_once('#').unwrap_or((rest, ""));
        let (id, url) = (id.trim(), url.trim());
        if id.is_empty() || url.is_empty() {
            return Err(ConfigError::InvalidNodeEntry(entry.to_string()));
        }
        if nodes.iter().any(|n| n.id.as_str() == id) {
            return Err(ConfigError::DuplicateNode(id.to_string()));
        }
        nodes.push(NodeDescriptor::new(id, id, url, token.trim()));
    }

    Ok(nodes)
}
