//! Usage graphs and their comparison.
//!
//! This module handles:
//! - Building a call graph from one snapshot
//! - Merging, thresholding and chain-collapsing several graphs
//! - Presentation scales and dot output for the merged graph

pub mod compare;
pub mod dot;
pub mod presentation;
pub mod usage;

pub use compare::{
    compare, CompareOptions, GraphEdge, GraphNode, NodeId, NodeSize, SimplifiedGraph,
    PROGRAM_ROOT,
};
pub use dot::write_dot;
pub use usage::UsageGraph;
