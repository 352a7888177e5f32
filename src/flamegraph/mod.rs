//! Flame graph output for a single snapshot.
//!
//! Snapshots are flattened into collapsed stacks, which are either written
//! as text for external viewers or drawn directly as an SVG.

pub mod collapsed;
pub mod generator;

pub use collapsed::{build_collapsed_stacks, write_collapsed, CollapsedStack, OTHER_LABEL};
pub use generator::{generate_flamegraph, generate_text_summary, FlamegraphConfig};
