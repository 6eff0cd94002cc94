//! # Adapters
//!
//! Concrete implementations of the publisher pipeline's outbound ports.

pub mod message_store;
pub mod node_registry;
pub mod rpc_client;

pub use message_store::InMemoryMessageStore;
pub use node_registry::StaticNodeRegistry;
pub use rpc_client::{JsonRpcDialer, JsonRpcNodeClient, PUSH_UNTRUSTED_METHOD};
