//! # Node Sender
//!
//! One actor per downstream node: a bounded FIFO queue of batches and a
//! single worker that pushes them over the node's RPC connection.
//!
//! ## Failure Handling
//!
//! - Benign nonce rejections are logged at debug and dropped
//! - Any other rejection is written to the record of every unaccepted
//!   message, unless the record already carries the same text
//! - Store lookups that fail are logged and skipped; the worker keeps going

use shared_types::{Cid, MessageBatch, NodeDescriptor, NodeId, SignedMessage};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use super::{cancelled, is_cancelled, ShutdownSignal};
use crate::domain::{
    check_queue_capacity, classify_failure, needs_annotation, unaccepted, ConfigError,
    FailureClass, PublishError, PushRejected,
};
use crate::ports::outbound::{MessageStore, NodeRpcClient};

/// Handle to a running per-node delivery worker.
///
/// Dropping the handle cancels the worker.
pub struct NodeSender {
    node: NodeDescriptor,
    queue: mpsc::Sender<MessageBatch>,
    stop: watch::Sender<bool>,
    parent: ShutdownSignal,
    task: JoinHandle<()>,
}

impl NodeSender {
    /// Start a worker for `node` on an already dialed connection.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - `ConfigError::ZeroQueueCapacity` - `capacity` is 0
    pub fn spawn(
        node: NodeDescriptor,
        client: Arc<dyn NodeRpcClient>,
        store: Arc<dyn MessageStore>,
        capacity: usize,
        parent: ShutdownSignal,
    ) -> Result<Self, ConfigError> {
        check_queue_capacity(capacity)?;

        let (queue, rx) = mpsc::channel(capacity);
        let (stop, own) = watch::channel(false);
        let worker = DeliveryWorker {
            node: node.id.clone(),
            client,
            store,
        };
        let task = tokio::spawn(worker.run(rx, own, parent.clone()));

        Ok(Self {
            node,
            queue,
            stop,
            parent,
            task,
        })
    }

    /// Queue a batch for delivery.
    ///
    /// Waits while the queue is full. Returns `Ok` without queueing once the
    /// sender is cancelled; callers must not assume delivery.
    ///
    /// # Errors
    ///
    /// - `PublishError::Stopped` - the worker exited without being cancelled
    pub async fn enqueue(&self, batch: MessageBatch) -> Result<(), PublishError> {
        let mut own = self.stop.subscribe();
        let mut parent = self.parent.clone();

        let sent = tokio::select! {
            sent = self.queue.send(batch) => sent,
            _ = cancelled(&mut own) => return Ok(()),
            _ = cancelled(&mut parent) => return Ok(()),
        };

        match sent {
            Ok(()) => Ok(()),
            Err(_) if self.is_cancelled() => {
                debug!(node = %self.node.id, "Dropping batch for cancelled node sender");
                Ok(())
            }
            Err(_) => Err(PublishError::Stopped(format!(
                "node sender {} is not running",
                self.node.id
            ))),
        }
    }

    /// Stop the worker. Queued batches are dropped.
    pub fn cancel(&self) {
        self.stop.send_replace(true);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.stop.borrow() || is_cancelled(&self.parent)
    }

    /// Whether the worker task is still alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    #[must_use]
    pub fn node_id(&self) -> &NodeId {
        &self.node.id
    }

    #[must_use]
    pub fn node(&self) -> &NodeDescriptor {
        &self.node
    }
}

impl Drop for NodeSender {
    fn drop(&mut self) {
        self.cancel();
    }
}

struct DeliveryWorker {
    node: NodeId,
    client: Arc<dyn NodeRpcClient>,
    store: Arc<dyn MessageStore>,
}

impl DeliveryWorker {
    async fn run(
        self,
        mut rx: mpsc::Receiver<MessageBatch>,
        mut own: ShutdownSignal,
        mut parent: ShutdownSignal,
    ) {
        info!(node = %self.node, "Node sender started");

        loop {
            let batch = tokio::select! {
                biased;
                _ = cancelled(&mut own) => break,
                _ = cancelled(&mut parent) => break,
                next = rx.recv() => match next {
                    Some(batch) => batch,
                    None => break,
                },
            };

            tokio::select! {
                biased;
                _ = cancelled(&mut own) => break,
                _ = cancelled(&mut parent) => break,
                _ = self.deliver(&batch) => {}
            }
        }

        self.client.close();
        info!(node = %self.node, "Node sender stopped");
    }

    async fn deliver(&self, batch: &[SignedMessage]) {
        match self.client.push_message_batch_untrusted(batch).await {
            Ok(accepted) => {
                trace!(node = %self.node, accepted, "Batch pushed");
            }
            Err(rejected) => self.handle_rejection(batch, rejected).await,
        }
    }

    async fn handle_rejection(&self, batch: &[SignedMessage], rejected: PushRejected) {
        match classify_failure(&rejected.reason) {
            FailureClass::Benign => {
                debug!(
                    node = %self.node,
                    reason = %rejected.reason,
                    "Node already has these messages"
                );
            }
            FailureClass::Persistent => {
                warn!(
                    node = %self.node,
                    accepted = rejected.accepted,
                    total = batch.len(),
                    reason = %rejected.reason,
                    "Failed to push batch"
                );
                for msg in unaccepted(batch, rejected.accepted) {
                    self.record_failure(msg.cid(), &rejected.reason).await;
                }
            }
        }
    }

    async fn record_failure(&self, cid: Cid, reason: &str) {
        let record = match self.store.get_message_by_cid(&cid).await {
            Ok(record) => record,
            Err(e) => {
                error!(node = %self.node, cid = %cid, error = %e, "Failed to load message record");
                return;
            }
        };

        if !needs_annotation(&record.error_msg, reason) {
            return;
        }

        if let Err(e) = self.store.update_error_annotation(&record.id, reason).await {
            error!(node = %self.node, cid = %cid, error = %e, "Failed to record delivery error");
        }
    }
}
