//! # In-Memory Message Store
//!
//! Message records keyed by CID, with a secondary index by record ID for
//! error annotations.

use async_trait::async_trait;
use msg_publisher::{MessageStore, StoreError};
use parking_lot::RwLock;
use shared_types::{Cid, MessageRecord, SignedMessage};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
struct Records {
    by_cid: HashMap<Cid, MessageRecord>,
    cid_by_id: HashMap<String, Cid>,
    next_id: u64,
}

/// Thread-safe in-memory [`MessageStore`].
#[derive(Default)]
pub struct InMemoryMessageStore {
    records: RwLock<Records>,
    annotation_writes: AtomicU64,
}

impl InMemoryMessageStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message, returning its record. Idempotent per CID.
    pub fn insert(&self, msg: &SignedMessage) -> MessageRecord {
        let mut records = self.records.write();
        let cid = msg.cid();
        if let Some(existing) = records.by_cid.get(&cid) {
            return existing.clone();
        }

        records.next_id += 1;
        let record = MessageRecord {
            id: format!("msg-{}", records.next_id),
            cid,
            error_msg: String::new(),
        };
        records.cid_by_id.insert(record.id.clone(), cid);
        records.by_cid.insert(cid, record.clone());
        record
    }

    #[must_use]
    pub fn get(&self, cid: &Cid) -> Option<MessageRecord> {
        self.records.read().by_cid.get(cid).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().by_cid.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of error annotations written since creation.
    #[must_use]
    pub fn annotation_writes(&self) -> u64 {
        self.annotation_writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn get_message_by_cid(&self, cid: &Cid) -> Result<MessageRecord, StoreError> {
        self.get(cid).ok_or(StoreError::NotFound(*cid))
    }

    async fn update_error_annotation(&self, id: &str, error: &str) -> Result<(), StoreError> {
        let mut records = self.records.write();
        let cid = *records
            .cid_by_id
            .get(id)
            .ok_or_else(|| StoreError::RecordNotFound(id.to_string()))?;
        let record = records
            .by_cid
            .get_mut(&cid)
            .ok_or(StoreError::NotFound(cid))?;
        record.error_msg = error.to_string();
        self.annotation_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
