//! Error types for the publisher pipeline and its ports.

use shared_bus::TopicError;
use shared_types::{Cid, NodeId};
use thiserror::Error;

/// Caller-visible publish errors.
///
/// Individual node pushes and fan-out branches never surface here; only the
/// main delivery path, the registry fetch and construction problems do.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("No publishers configured for fan-out")]
    NoPublishers,

    #[error("Publisher stopped: {0}")]
    Stopped(String),

    #[error("Node registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Dial error: {0}")]
    Dial(#[from] DialError),

    #[error("Gossip topic error: {0}")]
    Topic(#[from] TopicError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Construction-time configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("cache release period must be non-zero")]
    ZeroReleasePeriod,

    #[error("worker pool size must be non-zero")]
    ZeroWorkers,

    #[error("queue capacity must be non-zero")]
    ZeroQueueCapacity,

    #[error("gossip is enabled but no gossip transport was provided")]
    MissingGossipTransport,
}

/// Failure to open an RPC connection to a node.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("failed to dial node {node} at {url}: {reason}")]
pub struct DialError {
    pub node: NodeId,
    pub url: String,
    pub reason: String,
}

/// A downstream node refused (part of) a pushed batch.
///
/// `accepted` counts the messages at the front of the batch the node took
/// before failing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("push rejected after {accepted} accepted: {reason}")]
pub struct PushRejected {
    pub accepted: usize,
    pub reason: String,
}

impl PushRejected {
    pub fn new(accepted: usize, reason: impl Into<String>) -> Self {
        Self {
            accepted,
            reason: reason.into(),
        }
    }
}

/// Node registry lookup failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct RegistryError(pub String);

/// Message store failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("message {0} not found")]
    NotFound(Cid),

    #[error("record {0} not found")]
    RecordNotFound(String),

    #[error("store backend error: {0}")]
    Backend(String),
}
