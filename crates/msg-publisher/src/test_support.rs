//! Recording and scripted port implementations for unit tests.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use shared_types::{Cid, MessageBatch, MessageRecord, NodeDescriptor, NodeId, SignedMessage};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::domain::{DialError, PublishError, PushRejected, RegistryError, StoreError};
use crate::ports::inbound::MessagePublisher;
use crate::ports::outbound::{MessageStore, NodeDialer, NodeRegistry, NodeRpcClient};

pub fn msg(nonce: u64) -> SignedMessage {
    SignedMessage::new([3u8; 20], nonce, vec![nonce as u8], vec![0xAB; 65])
}

pub fn batch(nonces: &[u64]) -> MessageBatch {
    nonces.iter().map(|&n| msg(n)).collect::<Vec<_>>().into()
}

pub fn node(id: &str) -> NodeDescriptor {
    NodeDescriptor::new(id, format!("node-{id}"), format!("http://{id}:1234/rpc/v1"), "token")
}

pub fn nonces(batch: &[SignedMessage]) -> Vec<u64> {
    batch.iter().map(SignedMessage::nonce).collect()
}

/// Publisher that records every batch and reports it on a channel.
pub struct RecordingPublisher {
    pub batches: Mutex<Vec<MessageBatch>>,
    notify: mpsc::UnboundedSender<MessageBatch>,
}

impl RecordingPublisher {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<MessageBatch>) {
        let (notify, rx) = mpsc::unbounded_channel();
        let publisher = Arc::new(Self {
            batches: Mutex::new(Vec::new()),
            notify,
        });
        (publisher, rx)
    }

    pub fn calls(&self) -> usize {
        self.batches.lock().len()
    }
}

#[async_trait]
impl MessagePublisher for RecordingPublisher {
    async fn publish_messages(&self, batch: MessageBatch) -> Result<(), PublishError> {
        self.batches.lock().push(Arc::clone(&batch));
        let _ = self.notify.send(batch);
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Publisher that always fails.
pub struct FailingPublisher {
    pub calls: AtomicUsize,
}

impl FailingPublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl MessagePublisher for FailingPublisher {
    async fn publish_messages(&self, _batch: MessageBatch) -> Result<(), PublishError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(PublishError::Stopped("always fails".to_string()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Publisher that tracks how many calls are inside it at once.
pub struct ConcurrencyProbe {
    in_flight: AtomicUsize,
    pub peak: AtomicUsize,
    pub completed: AtomicUsize,
    hold: Duration,
}

impl ConcurrencyProbe {
    pub fn new(hold: Duration) -> Arc<Self> {
        Arc::new(Self {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            hold,
        })
    }
}

#[async_trait]
impl MessagePublisher for ConcurrencyProbe {
    async fn publish_messages(&self, _batch: MessageBatch) -> Result<(), PublishError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.hold).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// RPC client that records pushes and answers from a script.
pub struct MockRpcClient {
    pub node: NodeId,
    pub pushes: Mutex<Vec<Vec<SignedMessage>>>,
    reply: Mutex<Result<usize, PushRejected>>,
    notify: mpsc::UnboundedSender<(NodeId, Vec<SignedMessage>)>,
    pub closed: AtomicUsize,
}

impl MockRpcClient {
    pub fn new(node: NodeId) -> (Arc<Self>, mpsc::UnboundedReceiver<(NodeId, Vec<SignedMessage>)>) {
        let (notify, rx) = mpsc::unbounded_channel();
        (Self::with_notify(node, notify), rx)
    }

    fn with_notify(
        node: NodeId,
        notify: mpsc::UnboundedSender<(NodeId, Vec<SignedMessage>)>,
    ) -> Arc<Self> {
        Arc::new(Self {
            node,
            pushes: Mutex::new(Vec::new()),
            reply: Mutex::new(Ok(usize::MAX)),
            notify,
            closed: AtomicUsize::new(0),
        })
    }

    pub fn reject_with(&self, rejected: PushRejected) {
        *self.reply.lock() = Err(rejected);
    }
}

#[async_trait]
impl NodeRpcClient for MockRpcClient {
    async fn push_message_batch_untrusted(
        &self,
        batch: &[SignedMessage],
    ) -> Result<usize, PushRejected> {
        self.pushes.lock().push(batch.to_vec());
        let reply = self.reply.lock().clone().map(|n| n.min(batch.len()));
        let _ = self.notify.send((self.node.clone(), batch.to_vec()));
        reply
    }

    fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Dialer handing out one `MockRpcClient` per dial, all reporting on one channel.
pub struct MockDialer {
    pub clients: Mutex<HashMap<NodeId, Arc<MockRpcClient>>>,
    pub dials: Mutex<Vec<NodeId>>,
    failing: RwLock<HashSet<NodeId>>,
    notify: mpsc::UnboundedSender<(NodeId, Vec<SignedMessage>)>,
}

impl MockDialer {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<(NodeId, Vec<SignedMessage>)>) {
        let (notify, rx) = mpsc::unbounded_channel();
        let dialer = Arc::new(Self {
            clients: Mutex::new(HashMap::new()),
            dials: Mutex::new(Vec::new()),
            failing: RwLock::new(HashSet::new()),
            notify,
        });
        (dialer, rx)
    }

    pub fn fail_node(&self, id: &str, failing: bool) {
        let mut set = self.failing.write();
        if failing {
            set.insert(NodeId::from(id));
        } else {
            set.remove(&NodeId::from(id));
        }
    }

    pub fn client(&self, id: &str) -> Option<Arc<MockRpcClient>> {
        self.clients.lock().get(&NodeId::from(id)).cloned()
    }

    pub fn dial_count(&self, id: &str) -> usize {
        self.dials
            .lock()
            .iter()
            .filter(|n| n.as_str() == id)
            .count()
    }
}

#[async_trait]
impl NodeDialer for MockDialer {
    async fn dial(&self, node: &NodeDescriptor) -> Result<Arc<dyn NodeRpcClient>, DialError> {
        self.dials.lock().push(node.id.clone());
        if self.failing.read().contains(&node.id) {
            return Err(DialError {
                node: node.id.clone(),
                url: node.url.clone(),
                reason: "connection refused".to_string(),
            });
        }
        let client = MockRpcClient::with_notify(node.id.clone(), self.notify.clone());
        self.clients.lock().insert(node.id.clone(), Arc::clone(&client));
        Ok(client)
    }
}

/// Registry returning a mutable node list.
pub struct MockRegistry {
    nodes: RwLock<Vec<NodeDescriptor>>,
    fail: RwLock<bool>,
}

impl MockRegistry {
    pub fn new(ids: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            nodes: RwLock::new(ids.iter().map(|id| node(id)).collect()),
            fail: RwLock::new(false),
        })
    }

    pub fn set(&self, ids: &[&str]) {
        *self.nodes.write() = ids.iter().map(|id| node(id)).collect();
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.write() = fail;
    }
}

#[async_trait]
impl NodeRegistry for MockRegistry {
    async fn list_nodes(&self) -> Result<Vec<NodeDescriptor>, RegistryError> {
        if *self.fail.read() {
            return Err(RegistryError("registry unavailable".to_string()));
        }
        Ok(self.nodes.read().clone())
    }
}

/// Store keeping records in memory and logging every annotation write.
pub struct MockStore {
    records: RwLock<HashMap<Cid, MessageRecord>>,
    pub writes: Mutex<Vec<(String, String)>>,
}

impl MockStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            records: RwLock::new(HashMap::new()),
            writes: Mutex::new(Vec::new()),
        })
    }

    pub fn with_messages(messages: &[SignedMessage]) -> Arc<Self> {
        let store = Self::new();
        for m in messages {
            store.records.write().insert(
                m.cid(),
                MessageRecord {
                    id: format!("rec-{}", m.nonce()),
                    cid: m.cid(),
                    error_msg: String::new(),
                },
            );
        }
        store
    }

    pub fn error_of(&self, cid: &Cid) -> Option<String> {
        self.records.read().get(cid).map(|r| r.error_msg.clone())
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().len()
    }
}

#[async_trait]
impl MessageStore for MockStore {
    async fn get_message_by_cid(&self, cid: &Cid) -> Result<MessageRecord, StoreError> {
        self.records
            .read()
            .get(cid)
            .cloned()
            .ok_or(StoreError::NotFound(*cid))
    }

    async fn update_error_annotation(&self, id: &str, error: &str) -> Result<(), StoreError> {
        let mut records = self.records.write();
        let record = records
            .values_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::RecordNotFound(id.to_string()))?;
        record.error_msg = error.to_string();
        self.writes.lock().push((id.to_string(), error.to_string()));
        Ok(())
    }
}
