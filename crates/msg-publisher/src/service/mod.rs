//! # Publisher Stages
//!
//! Each stage implements [`MessagePublisher`](crate::ports::inbound::MessagePublisher)
//! and wraps the next one.
//!
//! ```text
//! Dedup → ConcurrencyLimited → FanOut ─┬→ MultiNodeDispatcher ─┬→ NodeSender (main)
//!                                      │                       ├→ NodeSender (A)
//!                                      │                       └→ NodeSender (B) ...
//!                                      └→ GossipPublisher → topic
//! ```
//!
//! ## Workers
//!
//! Every background worker takes a [`ShutdownSignal`]. Flipping it to `true`
//! (or dropping its sender) stops the worker after, or in the middle of, its
//! current unit of work. Queued batches are not drained.

use tokio::sync::watch;

mod concurrent;
mod dedup;
mod fanout;
mod gossip;
mod multi_node;
mod node_sender;

pub use concurrent::ConcurrencyLimitedPublisher;
pub use dedup::DeduplicatingPublisher;
pub use fanout::FanOutPublisher;
pub use gossip::GossipPublisher;
pub use multi_node::MultiNodeDispatcher;
pub use node_sender::NodeSender;

/// Lifetime token shared by the workers of one pipeline.
pub type ShutdownSignal = watch::Receiver<bool>;

/// Resolves once the signal is raised or its sender is gone.
pub(crate) async fn cancelled(signal: &mut ShutdownSignal) {
    let _ = signal.wait_for(|stop| *stop).await;
}

pub(crate) fn is_cancelled(signal: &ShutdownSignal) -> bool {
    *signal.borrow() || signal.has_changed().is_err()
}
