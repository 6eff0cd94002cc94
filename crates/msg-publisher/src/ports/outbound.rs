//! Outbound ports (SPI) of the publisher pipeline.

use async_trait::async_trait;
use shared_types::{Cid, MessageRecord, NodeDescriptor, SignedMessage};
use std::sync::Arc;

use crate::domain::{DialError, PushRejected, RegistryError, StoreError};

/// An open RPC connection to one downstream node.
#[async_trait]
pub trait NodeRpcClient: Send + Sync {
    /// Push a batch without the node re-validating local policy.
    ///
    /// Returns the number of accepted messages. On failure the node may
    /// still have accepted a prefix, reported in `PushRejected::accepted`.
    async fn push_message_batch_untrusted(
        &self,
        batch: &[SignedMessage],
    ) -> Result<usize, PushRejected>;

    /// Release the connection. Called once when its sender stops.
    fn close(&self) {}
}

/// Opens RPC connections to nodes.
#[async_trait]
pub trait NodeDialer: Send + Sync {
    /// Connect to `node` using its URL and token.
    async fn dial(&self, node: &NodeDescriptor) -> Result<Arc<dyn NodeRpcClient>, DialError>;
}

/// Source of truth for the set of extra downstream nodes.
#[async_trait]
pub trait NodeRegistry: Send + Sync {
    async fn list_nodes(&self) -> Result<Vec<NodeDescriptor>, RegistryError>;
}

/// Storage of message records.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Look up a record by message CID.
    async fn get_message_by_cid(&self, cid: &Cid) -> Result<MessageRecord, StoreError>;

    /// Overwrite the delivery error annotation of a record.
    async fn update_error_annotation(&self, id: &str, error: &str) -> Result<(), StoreError>;
}
