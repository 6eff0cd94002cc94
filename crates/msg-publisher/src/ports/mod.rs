//! Ports for the publisher pipeline.
//!
//! - **inbound**: the `MessagePublisher` contract every stage implements
//! - **outbound**: node RPC, dialing, node registry and message store

pub mod inbound;
pub mod outbound;
