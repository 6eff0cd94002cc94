//! # Pipeline Integration Tests
//!
//! Run the assembled relay pipeline against the real store, registry and
//! gossip bus, with a scripted dialer standing in for the HTTP nodes.
//!
//! ## Scenarios
//!
//! 1. Persistent rejections land on the message record, once per reason
//! 2. Benign nonce rejections leave the record untouched
//! 3. Registry changes add and retire node senders
//! 4. Gossip subscribers see every message's encoding
//! 5. Dedup suppresses repeated messages

use async_trait::async_trait;
use msg_publisher::{
    DialError, MessagePublisher, NodeDialer, NodeRpcClient, PublisherConfig, PushRejected,
    NONCE_ALREADY_EXISTS,
};
use parking_lot::Mutex;
use relay_runtime::{run_feed, RelayConfig, RelayRuntime};
use shared_types::{MessageBatch, NodeDescriptor, NodeId, SignedMessage};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

type Push = (NodeId, Vec<SignedMessage>);

struct ScriptedClient {
    node: NodeId,
    reply: Option<PushRejected>,
    pushes: mpsc::UnboundedSender<Push>,
}

#[async_trait]
impl NodeRpcClient for ScriptedClient {
    async fn push_message_batch_untrusted(
        &self,
        batch: &[SignedMessage],
    ) -> Result<usize, PushRejected> {
        let _ = self.pushes.send((self.node.clone(), batch.to_vec()));
        match &self.reply {
            Some(rejection) => Err(rejection.clone()),
            None => Ok(batch.len()),
        }
    }
}

/// Dials clients that accept everything unless a rejection is scripted
/// for the node.
struct ScriptedDialer {
    replies: Mutex<HashMap<String, PushRejected>>,
    pushes: mpsc::UnboundedSender<Push>,
}

impl ScriptedDialer {
    fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Push>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let dialer = Arc::new(Self {
            replies: Mutex::new(HashMap::new()),
            pushes: tx,
        });
        (dialer, rx)
    }

    fn reject(&self, node: &str, reason: &str) {
        self.replies
            .lock()
            .insert(node.to_string(), PushRejected::new(0, reason));
    }
}

#[async_trait]
impl NodeDialer for ScriptedDialer {
    async fn dial(&self, node: &NodeDescriptor) -> Result<Arc<dyn NodeRpcClient>, DialError> {
        Ok(Arc::new(ScriptedClient {
            node: node.id.clone(),
            reply: self.replies.lock().get(node.id.as_str()).cloned(),
            pushes: self.pushes.clone(),
        }))
    }
}

fn msg(nonce: u64) -> SignedMessage {
    SignedMessage::new([0x42; 20], nonce, vec![nonce as u8; 8], vec![0x11; 65])
}

fn single(m: &SignedMessage) -> MessageBatch {
    Arc::from(vec![m.clone()])
}

fn node(id: &str) -> NodeDescriptor {
    NodeDescriptor::new(id, id, format!("http://{id}:1234/rpc/v1"), "")
}

fn config(publisher: PublisherConfig, nodes: &[&str]) -> RelayConfig {
    RelayConfig {
        main_node: node("main"),
        nodes: nodes.iter().map(|id| node(id)).collect(),
        publisher,
        ..RelayConfig::default()
    }
}

fn multi_node() -> PublisherConfig {
    PublisherConfig {
        enable_multi_node: true,
        ..PublisherConfig::default()
    }
}

async fn next_push(pushes: &mut mpsc::UnboundedReceiver<Push>) -> Push {
    timeout(Duration::from_secs(2), pushes.recv())
        .await
        .expect("push timed out")
        .expect("push channel closed")
}

async fn wait_until<F: Fn() -> bool>(cond: F) {
    timeout(Duration::from_secs(2), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached");
}

#[tokio::test]
async fn test_persistent_rejection_annotated_once_per_reason() {
    let (dialer, mut pushes) = ScriptedDialer::new();
    dialer.reject("a", "insufficient balance");
    let runtime = RelayRuntime::new(config(multi_node(), &["a"]));
    let store = runtime.store();
    let pipeline = runtime.start_with_dialer(dialer).await.unwrap();

    let first = msg(1);
    let record = store.insert(&first);
    pipeline.publish_messages(single(&first)).await.unwrap();
    pipeline.publish_messages(single(&first)).await.unwrap();

    // A second message through the same sender orders after both repeats.
    let second = msg(2);
    let second_record = store.insert(&second);
    pipeline.publish_messages(single(&second)).await.unwrap();

    wait_until(|| store.get(&second_record.cid).is_some_and(|r| !r.error_msg.is_empty())).await;
    assert_eq!(store.get(&record.cid).unwrap().error_msg, "insufficient balance");
    assert_eq!(store.annotation_writes(), 2);

    let mut seen = 0;
    while seen < 6 {
        next_push(&mut pushes).await;
        seen += 1;
    }
    pipeline.shutdown();
}

#[tokio::test]
async fn test_benign_rejection_leaves_record_clean() {
    let (dialer, mut pushes) = ScriptedDialer::new();
    dialer.reject("main", NONCE_ALREADY_EXISTS);
    dialer.reject("a", "gas limit exceeded");
    let runtime = RelayRuntime::new(config(multi_node(), &["a"]));
    let store = runtime.store();
    let pipeline = runtime.start_with_dialer(dialer).await.unwrap();

    let m = msg(3);
    let record = store.insert(&m);
    pipeline.publish_messages(single(&m)).await.unwrap();

    let mut nodes = vec![next_push(&mut pushes).await.0, next_push(&mut pushes).await.0];
    nodes.sort();
    assert_eq!(nodes, vec![NodeId::from("a"), NodeId::from("main")]);

    wait_until(|| store.annotation_writes() == 1).await;
    assert_eq!(store.get(&record.cid).unwrap().error_msg, "gas limit exceeded");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(store.annotation_writes(), 1);
    pipeline.shutdown();
}

#[tokio::test]
async fn test_registry_changes_follow_live_senders() {
    let (dialer, mut pushes) = ScriptedDialer::new();
    let runtime = RelayRuntime::new(config(multi_node(), &["a"]));
    let registry = runtime.registry();
    let pipeline = runtime.start_with_dialer(dialer).await.unwrap();

    pipeline.publish_messages(single(&msg(1))).await.unwrap();
    assert_eq!(pipeline.dispatcher().live_nodes(), vec![NodeId::from("a")]);
    next_push(&mut pushes).await;
    next_push(&mut pushes).await;

    registry.set_nodes(vec![node("b")]);
    pipeline.publish_messages(single(&msg(2))).await.unwrap();
    assert_eq!(pipeline.dispatcher().live_nodes(), vec![NodeId::from("b")]);

    let mut nodes = vec![next_push(&mut pushes).await.0, next_push(&mut pushes).await.0];
    nodes.sort();
    assert_eq!(nodes, vec![NodeId::from("b"), NodeId::from("main")]);
    pipeline.shutdown();
}

#[tokio::test]
async fn test_feed_reaches_gossip_subscribers() {
    let (dialer, mut pushes) = ScriptedDialer::new();
    let publisher = PublisherConfig {
        enable_gossip: true,
        concurrency: 2,
        ..PublisherConfig::default()
    };
    let runtime = RelayRuntime::new(config(publisher, &[]));
    let mut subscription = runtime.gossip().subscribe("/msgs").unwrap();
    let pipeline = runtime.start_with_dialer(dialer).await.unwrap();

    let m = msg(9);
    let input = format!("{}\n", serde_json::to_string(&m).unwrap());
    let stats = run_feed(input.as_bytes(), &runtime.store(), pipeline.publisher().as_ref())
        .await
        .unwrap();
    assert_eq!(stats.published, 1);

    let gossiped = timeout(Duration::from_secs(2), subscription.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(gossiped, m.serialized().to_vec());

    let (id, batch) = next_push(&mut pushes).await;
    assert_eq!(id, NodeId::from("main"));
    assert_eq!(batch[0].cid(), m.cid());
    pipeline.shutdown();
}

#[tokio::test]
async fn test_dedup_suppresses_repeats() {
    let (dialer, mut pushes) = ScriptedDialer::new();
    let publisher = PublisherConfig {
        cache_release_period_secs: Some(3600),
        ..PublisherConfig::default()
    };
    let runtime = RelayRuntime::new(config(publisher, &[]));
    let pipeline = runtime.start_with_dialer(dialer).await.unwrap();

    let (a, b) = (msg(1), msg(2));
    pipeline.publish_messages(single(&a)).await.unwrap();
    pipeline.publish_messages(single(&a)).await.unwrap();
    pipeline.publish_messages(single(&b)).await.unwrap();

    assert_eq!(next_push(&mut pushes).await.1[0].cid(), a.cid());
    assert_eq!(next_push(&mut pushes).await.1[0].cid(), b.cid());
    pipeline.shutdown();
}
