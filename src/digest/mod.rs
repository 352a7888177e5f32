//! Compacted, randomly accessible history of heap snapshots.
//!
//! This module handles:
//! - Pruned snapshot records
//! - The digest file layout and its crash-safe writer
//! - Building a digest from an event stream, with cooperative cancellation
//! - Reading snapshots by index or by time

pub mod builder;
pub mod format;
pub mod reader;
pub mod snapshot;

pub use builder::{build_digest, DigestOptions, DigestSummary};
pub use reader::DigestReader;
pub use snapshot::Snapshot;
