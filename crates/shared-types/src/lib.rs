//! # Shared Types Crate
//!
//! Entities shared by the publisher pipeline and the runtime adapters.
//!
//! ## Design Principles
//!
//! - **Content Addressing**: a message's identity is its CID; two messages
//!   with the same CID are the same delivery unit.
//! - **Immutability**: messages and batches never change once built.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod entities;

pub use entities::*;
