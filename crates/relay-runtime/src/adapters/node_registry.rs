//! Node registry backed by a replaceable list from configuration.

use async_trait::async_trait;
use msg_publisher::{NodeRegistry, RegistryError};
use parking_lot::RwLock;
use shared_types::NodeDescriptor;

#[derive(Debug, Default)]
pub struct StaticNodeRegistry {
    nodes: RwLock<Vec<NodeDescriptor>>,
}

impl StaticNodeRegistry {
    #[must_use]
    pub fn new(nodes: Vec<NodeDescriptor>) -> Self {
        Self {
            nodes: RwLock::new(nodes),
        }
    }

    /// Replace the node list. Takes effect on the next dispatch.
    pub fn set_nodes(&self, nodes: Vec<NodeDescriptor>) {
        *self.nodes.write() = nodes;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }
}

#[async_trait]
impl NodeRegistry for StaticNodeRegistry {
    async fn list_nodes(&self) -> Result<Vec<NodeDescriptor>, RegistryError> {
        Ok(self.nodes.read().clone())
    }
}
