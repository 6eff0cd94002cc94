//! # Message Publisher Pipeline
//!
//! Announces signed messages to downstream consensus nodes and the gossip
//! network once they are ready for broadcast.
//!
//! ## Architecture Role
//!
//! ```text
//! [Submission flow] ──publish_messages──→ [Dedup] → [Concurrent] → [FanOut]
//!                                                                   │
//!                                          ┌────────────────────────┴──────┐
//!                                          ↓                               ↓
//!                                 [MultiNodeDispatcher]             [Gossip topic]
//!                                   │        │        │
//!                                   ↓        ↓        ↓
//!                                 main     node A   node B ...
//! ```
//!
//! ## Failure Isolation
//!
//! - A slow or dead node stalls only its own sender
//! - Fan-out branch and per-node errors are logged, never returned
//! - Only main-node enqueue and registry fetch failures reach the caller
//! - Persistent push failures are written to the message record

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod builder;
pub mod domain;
pub mod ports;
pub mod service;

#[cfg(test)]
mod test_support;

pub use builder::{Pipeline, PipelineBuilder, DEFAULT_BLOCK_DELAY};
pub use domain::*;
pub use ports::inbound::MessagePublisher;
pub use ports::outbound::{MessageStore, NodeDialer, NodeRegistry, NodeRpcClient};
pub use service::{
    ConcurrencyLimitedPublisher, DeduplicatingPublisher, FanOutPublisher, GossipPublisher,
    MultiNodeDispatcher, NodeSender, ShutdownSignal,
};
