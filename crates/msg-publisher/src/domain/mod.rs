//! # Domain Layer for the Publisher Pipeline
//!
//! Pure logic with no I/O: the dedup cache, failure classification,
//! configuration and error types.
//!
//! ## Contents
//!
//! - **dedup_cache**: two-generation CID cache (`DedupCache`)
//! - **delivery**: push failure classification (`classify_failure`, `unaccepted`)
//! - **config**: assembly options (`PublisherConfig`)
//! - **errors**: error types for the pipeline and its ports

mod config;
mod dedup_cache;
mod delivery;
mod errors;

pub use config::*;
pub use dedup_cache::*;
pub use delivery::*;
pub use errors::*;
