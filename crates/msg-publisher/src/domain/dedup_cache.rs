//! # Two-Generation Dedup Cache
//!
//! Remembers message CIDs for one to two release periods.
//!
//! ## Aging
//!
//! - `mark` puts a CID into the current generation
//! - `rotate` turns the current generation into the previous one and drops
//!   the old previous generation
//!
//! A CID is "seen" while it sits in either generation, so memory stays bounded
//! by two periods' worth of distinct CIDs. Timers live outside this type;
//! callers drive `rotate` explicitly.

use shared_types::{Cid, SignedMessage};
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct DedupCache {
    current: HashSet<Cid>,
    previous: HashSet<Cid>,
    epoch: u64,
}

impl DedupCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the CID was seen in the current or previous generation.
    #[must_use]
    pub fn contains(&self, cid: &Cid) -> bool {
        self.current.contains(cid) || self.previous.contains(cid)
    }

    /// Mark a CID as seen in the current generation.
    ///
    /// Returns `true` if it was not seen before. A CID found in the previous
    /// generation is refreshed into the current one.
    pub fn mark(&mut self, cid: Cid) -> bool {
        let fresh = !self.contains(&cid);
        self.previous.remove(&cid);
        self.current.insert(cid);
        fresh
    }

    /// Mark every message in `batch` and return the ones not seen before,
    /// in batch order. Repeats within the batch are dropped too.
    pub fn filter_new(&mut self, batch: &[SignedMessage]) -> Vec<SignedMessage> {
        batch
            .iter()
            .filter(|msg| self.mark(msg.cid()))
            .cloned()
            .collect()
    }

    /// Age the cache by one generation. Returns how many CIDs were evicted.
    pub fn rotate(&mut self) -> usize {
        let evicted = std::mem::take(&mut self.previous);
        self.previous = std::mem::take(&mut self.current);
        self.epoch += 1;
        evicted.len()
    }

    /// Number of rotations so far.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Distinct CIDs remembered across both generations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.current.len() + self.previous.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current.is_empty() && self.previous.is_empty()
    }
}
