//! Call graph of one snapshot: local and cumulative usage per source line,
//! and the bytes flowing along each caller → callee edge.

use crate::digest::Snapshot;
use crate::trace::{SourceLocation, StackResolver};
use crate::utils::error::GraphError;
use log::debug;
use std::collections::HashMap;

/// Usage graph of a single snapshot
///
/// **Public** - input to the comparator and renderers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageGraph {
    /// Bytes allocated exactly at each location
    pub node_local_usage: HashMap<SourceLocation, u64>,

    /// Bytes allocated at or below each location
    pub node_cumulative_usage: HashMap<SourceLocation, u64>,

    /// Bytes flowing from caller to callee
    pub edge_usage: HashMap<(SourceLocation, SourceLocation), u64>,

    /// Every byte in the snapshot, resolved or not
    pub total_usage: u64,
}

impl UsageGraph {
    /// Build the graph of `snapshot`, resolving stacks through `resolver`
    ///
    /// # Errors
    /// * `GraphError::Decode` - a stack record could not be decoded
    pub fn build<S>(snapshot: &Snapshot, resolver: &mut S) -> Result<Self, GraphError>
    where
        S: StackResolver + ?Sized,
    {
        let mut graph = Self::default();
        let mut unresolved = 0u64;

        for (&trace_id, &bytes) in &snapshot.usage {
            match resolver.resolve(trace_id)? {
                Some(stack) => graph.add_stack(stack, bytes),
                None => {
                    graph.total_usage += bytes;
                    unresolved += bytes;
                }
            }
        }

        debug!(
            "Usage graph at {:.1}s: {} nodes, {} edges, {} of {} bytes unresolved",
            snapshot.relative_time,
            graph.node_cumulative_usage.len(),
            graph.edge_usage.len(),
            unresolved,
            graph.total_usage
        );
        Ok(graph)
    }

    /// Attribute `bytes` to a root-first stack
    pub fn add_stack(&mut self, stack: &[SourceLocation], bytes: u64) {
        self.total_usage += bytes;
        for (position, location) in stack.iter().enumerate() {
            *self
                .node_cumulative_usage
                .entry(location.clone())
                .or_insert(0) += bytes;
            match stack.get(position + 1) {
                Some(callee) => {
                    *self
                        .edge_usage
                        .entry((location.clone(), callee.clone()))
                        .or_insert(0) += bytes;
                }
                None => {
                    *self.node_local_usage.entry(location.clone()).or_insert(0) += bytes;
                }
            }
        }
    }

    /// Bytes that landed on some node
    pub fn resolved_usage(&self) -> u64 {
        self.node_local_usage.values().sum()
    }

    pub fn local_usage(&self, location: &SourceLocation) -> u64 {
        self.node_local_usage.get(location).copied().unwrap_or(0)
    }

    pub fn cumulative_usage(&self, location: &SourceLocation) -> u64 {
        self.node_cumulative_usage.get(location).copied().unwrap_or(0)
    }
}
