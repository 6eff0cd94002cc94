//! # Shared Bus - Gossip Topic Transport
//!
//! The publisher pipeline only needs to push byte payloads to a named topic.
//! This crate defines that seam and ships an in-memory implementation.
//!
//! ```text
//! ┌──────────────────┐   join_topic("/msgs")   ┌──────────────┐
//! │ GossipPublisher  │ ──────────────────────→ │  Topic Bus   │
//! │                  │   publish(bytes)        │              │ ──→ subscribers
//! └──────────────────┘ ──────────────────────→ └──────────────┘
//! ```

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod publisher;
pub mod subscriber;

pub use publisher::{GossipTransport, InMemoryTopicBus, Topic, TopicError};
pub use subscriber::{SubscriptionError, TopicSubscription};

/// Payloads buffered per topic before slow subscribers start lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
