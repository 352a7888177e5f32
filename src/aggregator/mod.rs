//! Aggregation of allocation events into live sets and summaries.
//!
//! This module transforms decoded event streams into:
//! - Live bytes per allocation site (the reducer)
//! - Periodic samples on a fixed time grid (replay)
//! - Top-N consumer summaries and heap history

pub mod history;
pub mod live_set;
pub mod replay;
pub mod top_n;

// Re-export main types and functions
pub use history::{HeapHistory, HistoryArrays, TimeSlice};
pub use live_set::{LiveSet, LiveSetReducer};
pub use replay::{replay, Boundary, ReplayOutcome};
pub use top_n::top_n;
