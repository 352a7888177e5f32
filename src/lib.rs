//! heapflow
//!
//! Analysis of sampled heap allocation traces. A sampler writes two streams
//! next to a base path: `<base>.hpm` (stack metadata) and `<base>.hpd`
//! (allocation and free events). This crate decodes them, builds a
//! randomly-accessible digest of periodic heap snapshots (`<base>.hpc`) and
//! turns snapshots into flame graphs, usage graphs and comparisons.
//!
//! ## Getting Started
//!
//! ```bash
//! heapflow digest ./run --interval 10
//! heapflow graph ./run --at 30 --at 120 -o growth.dot
//! ```
//!
//! Or from code:
//!
//! ```ignore
//! let mut reader = heapflow::ProfileReader::open("run")?;
//! reader.make_digest(&Default::default(), None)?;
//! let graph = reader.compare_at(&[30.0, 120.0], &Default::default())?;
//! ```

pub mod aggregator;
pub mod codec;
pub mod commands;
pub mod digest;
pub mod flamegraph;
pub mod graph;
pub mod output;
pub mod reader;
pub mod trace;
pub mod utils;

pub use reader::{ProfileReader, TimePlot};
