//! # Multi-Node Dispatcher
//!
//! Sends every batch to the main node and, when multi-node mode is on, to
//! every node currently listed by the registry.
//!
//! ## Reconciliation
//!
//! Each publish fetches the registry and diffs it against the sender
//! table:
//!
//! 1. Nodes missing from the table are reserved, dialed and get a new sender
//! 2. Senders whose node left the registry are cancelled and removed
//! 3. The batch is queued to every listed node with a live sender
//!
//! The table lock is only held while the map is read or mutated, never
//! across a dial or an enqueue. A reserved node is dialed by exactly one
//! publish; concurrent publishes skip it until its sender is live. A node
//! whose dial fails is released and retried on the next publish. An entry
//! sharing the main node's ID is ignored.

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use shared_types::{MessageBatch, NodeDescriptor, NodeId};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{NodeSender, ShutdownSignal};
use crate::domain::PublishError;
use crate::ports::inbound::MessagePublisher;
use crate::ports::outbound::{MessageStore, NodeDialer, NodeRegistry};

pub struct MultiNodeDispatcher {
    /// Fixed sender, not subject to registry membership.
    main: NodeSender,
    enable_multi_node: bool,
    registry: Arc<dyn NodeRegistry>,
    dialer: Arc<dyn NodeDialer>,
    store: Arc<dyn MessageStore>,
    queue_capacity: usize,
    shutdown: ShutdownSignal,
    /// Senders for registry nodes, keyed by node ID.
    senders: Mutex<SenderTable>,
}

#[derive(Default)]
struct SenderTable {
    slots: HashMap<NodeId, Slot>,
    next_ticket: u64,
}

enum Slot {
    /// Dial in flight, owned by the publish holding this ticket.
    Starting(u64),
    Live(Arc<NodeSender>),
}

impl SenderTable {
    fn live(&self, id: &NodeId) -> Option<Arc<NodeSender>> {
        match self.slots.get(id) {
            Some(Slot::Live(sender)) => Some(Arc::clone(sender)),
            _ => None,
        }
    }

    fn owns(&self, id: &NodeId, ticket: u64) -> bool {
        matches!(self.slots.get(id), Some(Slot::Starting(t)) if *t == ticket)
    }
}

impl MultiNodeDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        main: NodeSender,
        enable_multi_node: bool,
        registry: Arc<dyn NodeRegistry>,
        dialer: Arc<dyn NodeDialer>,
        store: Arc<dyn MessageStore>,
        queue_capacity: usize,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            main,
            enable_multi_node,
            registry,
            dialer,
            store,
            queue_capacity,
            shutdown,
            senders: Mutex::new(SenderTable::default()),
        }
    }

    /// IDs of the live registry-node senders, sorted.
    #[must_use]
    pub fn live_nodes(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .senders
            .lock()
            .slots
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Live(_)))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    #[must_use]
    pub fn main_node(&self) -> &NodeDescriptor {
        self.main.node()
    }

    /// Bring the sender table in line with `nodes` and return the live
    /// senders the batch should go to, in registry order.
    async fn reconcile(&self, nodes: &[NodeDescriptor]) -> Vec<Arc<NodeSender>> {
        let main = self.main.node_id();
        let mut listed = HashSet::new();
        let nodes: Vec<&NodeDescriptor> = nodes
            .iter()
            .filter(|node| node.id != *main && listed.insert(node.id.clone()))
            .collect();

        let (reserved, retired) = {
            let mut guard = self.senders.lock();
            let table = &mut *guard;
            let gone: Vec<NodeId> = table
                .slots
                .keys()
                .filter(|id| !listed.contains(*id))
                .cloned()
                .collect();
            let retired: Vec<Arc<NodeSender>> = gone
                .iter()
                .filter_map(|id| match table.slots.remove(id) {
                    Some(Slot::Live(sender)) => Some(sender),
                    _ => None,
                })
                .collect();

            let mut reserved = Vec::new();
            for node in nodes.iter().copied() {
                if let Entry::Vacant(slot) = table.slots.entry(node.id.clone()) {
                    let ticket = table.next_ticket;
                    slot.insert(Slot::Starting(ticket));
                    table.next_ticket += 1;
                    reserved.push((node, ticket));
                }
            }
            (reserved, retired)
        };

        for sender in retired {
            sender.cancel();
            info!(node = %sender.node_id(), "Node left registry, sender stopped");
        }

        for (node, ticket) in reserved {
            let dialed = self.dialer.dial(node).await;

            let mut table = self.senders.lock();
            if !table.owns(&node.id, ticket) {
                // Retired by a concurrent publish while dialing.
                if let Ok(client) = dialed {
                    client.close();
                }
                continue;
            }

            let client = match dialed {
                Ok(client) => client,
                Err(e) => {
                    table.slots.remove(&node.id);
                    warn!(node = %node.id, error = %e, "Failed to dial node, retrying next publish");
                    continue;
                }
            };

            match NodeSender::spawn(
                node.clone(),
                client,
                Arc::clone(&self.store),
                self.queue_capacity,
                self.shutdown.clone(),
            ) {
                Ok(sender) => {
                    info!(node = %node.id, url = %node.url, "Node sender added");
                    table.slots.insert(node.id.clone(), Slot::Live(Arc::new(sender)));
                }
                Err(e) => {
                    table.slots.remove(&node.id);
                    warn!(node = %node.id, error = %e, "Failed to start node sender");
                }
            }
        }

        let table = self.senders.lock();
        nodes.iter().filter_map(|node| table.live(&node.id)).collect()
    }
}

#[async_trait]
impl MessagePublisher for MultiNodeDispatcher {
    async fn publish_messages(&self, batch: MessageBatch) -> Result<(), PublishError> {
        self.main.enqueue(Arc::clone(&batch)).await?;

        if !self.enable_multi_node {
            return Ok(());
        }

        let nodes = self.registry.list_nodes().await?;
        let targets = self.reconcile(&nodes).await;
        debug!(nodes = targets.len(), size = batch.len(), "Dispatching batch to registry nodes");

        let deliveries = targets.iter().map(|sender| {
            let batch = Arc::clone(&batch);
            async move { (sender.node_id(), sender.enqueue(batch).await) }
        });
        for (node, result) in join_all(deliveries).await {
            if let Err(e) = result {
                warn!(node = %node, error = %e, "Failed to queue batch for node");
            }
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "rpc"
    }
}

impl Drop for MultiNodeDispatcher {
    fn drop(&mut self) {
        for slot in self.senders.lock().slots.values() {
            if let Slot::Live(sender) = slot {
                sender.cancel();
            }
        }
    }
}
