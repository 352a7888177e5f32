//! Merging several usage graphs into one simplified graph for display.
//!
//! The graphs are usually the same program at several points in time. The
//! result keeps the nodes and edges that matter in at least one of them,
//! gives the graph a single entry point, and fuses boring call chains into
//! single nodes.

use super::presentation::{edge_color, font_size, node_color, MIN_FONT_SIZE};
use super::usage::UsageGraph;
use crate::trace::SourceLocation;
use crate::utils::config::{
    COLLAPSE_LOCAL_FRACTION, DEFAULT_MIN_EDGE_FRACTION, DEFAULT_MIN_NODE_FRACTION,
};
use crate::utils::error::{check_fraction, ArgumentError};
use log::debug;
use serde::Serialize;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Stable handle of a node in a [`SimplifiedGraph`]
pub type NodeId = usize;

/// Label of the node added above multiple roots
pub const PROGRAM_ROOT: &str = "Program Root";

/// Thresholds and switches for [`compare`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompareOptions {
    /// Keep a node if its cumulative usage reaches this fraction of the total in some graph
    pub min_node_fraction: f64,

    /// Keep an edge if it carries this fraction of its source's cumulative usage in some graph
    pub min_edge_fraction: f64,

    /// Fuse non-branching chains of nodes with negligible local usage
    pub collapse: bool,

    /// Scale node fonts by local usage; otherwise every node gets the minimum font
    pub size_by_local_usage: bool,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            min_node_fraction: DEFAULT_MIN_NODE_FRACTION,
            min_edge_fraction: DEFAULT_MIN_EDGE_FRACTION,
            collapse: true,
            size_by_local_usage: true,
        }
    }
}

impl CompareOptions {
    pub fn validate(&self) -> Result<(), ArgumentError> {
        check_fraction("min_node_fraction", self.min_node_fraction)?;
        check_fraction("min_edge_fraction", self.min_edge_fraction)
    }
}

/// Usage of one node in one input graph
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NodeSize {
    pub cumulative: u64,
    pub local: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub id: NodeId,

    /// Source lines fused into this node, caller first
    pub labels: Vec<SourceLocation>,

    /// One entry per input graph
    pub sizes: Vec<NodeSize>,

    pub synthetic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphEdge {
    pub source: NodeId,
    pub target: NodeId,

    /// Bytes along the edge, one entry per input graph
    pub weights: Vec<u64>,
}

/// Result of [`compare`]: the merged graph ready for a renderer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimplifiedGraph {
    /// Total usage of each input graph
    pub total_usage: Vec<u64>,

    /// Surviving nodes ordered by id
    pub nodes: Vec<GraphNode>,

    /// Surviving edges ordered by `(source, target)`
    pub edges: Vec<GraphEdge>,

    /// Every node fused away by collapsing, mapped to the node that absorbed it
    pub merge_map: BTreeMap<NodeId, NodeId>,

    pub min_edge_fraction: f64,
    pub size_by_local_usage: bool,
}

/// Arena entry; `redirect` points at itself until the node is merged away
#[derive(Debug, Clone)]
struct Slot {
    labels: Vec<SourceLocation>,
    sizes: Vec<NodeSize>,
    synthetic: bool,
    redirect: NodeId,
}

struct Arena {
    slots: Vec<Slot>,
}

impl Arena {
    fn find(&self, mut id: NodeId) -> NodeId {
        while self.slots[id].redirect != id {
            id = self.slots[id].redirect;
        }
        id
    }

    fn is_canonical(&self, id: NodeId) -> bool {
        self.slots[id].redirect == id
    }
}

fn fraction(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Merge `graphs` into one simplified graph
///
/// **Public** - main entry point for graph comparison
///
/// # Arguments
/// * `graphs` - Usage graphs, conventionally successive points in time
/// * `options` - Thresholds and collapsing switch
///
/// # Errors
/// * `ArgumentError::InvalidArgument` - a threshold lies outside `[0, 1]`
///
/// # Algorithm
/// 1. Keep nodes whose cumulative fraction reaches the node threshold in some graph
/// 2. Keep edges between kept nodes whose fraction of the source's cumulative
///    usage reaches the edge threshold in some graph (a source with no
///    cumulative usage counts as fraction 1)
/// 3. Add a synthetic root above the kept nodes if more than one has no
///    kept incoming edge
/// 4. Repeatedly fuse a node with negligible local usage into its only
///    callee when that callee has no other caller
/// 5. Re-key edges through the merge map, taking the element-wise maximum
///    of colliding weights and dropping self-edges
/// 6. Drop edges below the edge threshold in every graph, measured against
///    the (possibly fused) source
pub fn compare(
    graphs: &[UsageGraph],
    options: &CompareOptions,
) -> Result<SimplifiedGraph, ArgumentError> {
    options.validate()?;
    let graph_count = graphs.len();
    let total_usage: Vec<u64> = graphs.iter().map(|graph| graph.total_usage).collect();

    // 1. Node selection, in location order so ids are deterministic
    let mut candidates: BTreeMap<&SourceLocation, Vec<NodeSize>> = BTreeMap::new();
    for (position, graph) in graphs.iter().enumerate() {
        for (location, &cumulative) in &graph.node_cumulative_usage {
            let sizes = candidates
                .entry(location)
                .or_insert_with(|| vec![NodeSize::default(); graph_count]);
            sizes[position] = NodeSize {
                cumulative,
                local: graph.local_usage(location),
            };
        }
    }

    let mut arena = Arena { slots: Vec::new() };
    let mut ids: HashMap<&SourceLocation, NodeId> = HashMap::new();
    for (location, sizes) in candidates {
        let significant = sizes.iter().zip(&total_usage).any(|(size, &total)| {
            size.cumulative as f64 >= options.min_node_fraction * total as f64
        });
        if significant {
            let id = arena.slots.len();
            ids.insert(location, id);
            arena.slots.push(Slot {
                labels: vec![location.clone()],
                sizes,
                synthetic: false,
                redirect: id,
            });
        }
    }

    // 2. Edge selection; weights hold every graph's value once the edge is kept
    let mut edge_weights: BTreeMap<(NodeId, NodeId), (Vec<u64>, bool)> = BTreeMap::new();
    for (position, graph) in graphs.iter().enumerate() {
        for ((src, dst), &weight) in &graph.edge_usage {
            let (Some(&source), Some(&target)) = (ids.get(src), ids.get(dst)) else {
                continue;
            };
            if source == target {
                continue;
            }
            let source_cumulative = arena.slots[source].sizes[position].cumulative;
            let weight_fraction = if source_cumulative == 0 {
                1.0
            } else {
                weight as f64 / source_cumulative as f64
            };

            let entry = edge_weights
                .entry((source, target))
                .or_insert_with(|| (vec![0; graph_count], false));
            entry.0[position] = weight;
            entry.1 |= weight_fraction >= options.min_edge_fraction;
        }
    }
    let mut edges: BTreeMap<(NodeId, NodeId), Vec<u64>> = edge_weights
        .into_iter()
        .filter(|(_, (_, kept))| *kept)
        .map(|(key, (weights, _))| (key, weights))
        .collect();

    // 3. Synthetic root
    let has_caller: BTreeSet<NodeId> = edges.keys().map(|&(_, target)| target).collect();
    let roots: Vec<NodeId> = (0..arena.slots.len())
        .filter(|id| !has_caller.contains(id))
        .collect();
    if roots.len() > 1 {
        let root = arena.slots.len();
        arena.slots.push(Slot {
            labels: vec![SourceLocation::new(PROGRAM_ROOT, 0)],
            sizes: total_usage
                .iter()
                .map(|&total| NodeSize {
                    cumulative: total,
                    local: 0,
                })
                .collect(),
            synthetic: true,
            redirect: root,
        });
        for &child in &roots {
            let weights = arena.slots[child]
                .sizes
                .iter()
                .map(|size| size.cumulative)
                .collect();
            edges.insert((root, child), weights);
        }
        debug!("Added synthetic root above {} nodes", roots.len());
    }

    // 4. Chain collapsing
    if options.collapse {
        collapse_chains(&mut arena, edges.keys().copied());
    }

    // 5. Re-key edges onto surviving nodes
    let mut merged_edges: BTreeMap<(NodeId, NodeId), Vec<u64>> = BTreeMap::new();
    for ((source, target), weights) in edges {
        let key = (arena.find(source), arena.find(target));
        if key.0 == key.1 {
            continue;
        }
        match merged_edges.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(weights);
            }
            Entry::Occupied(mut slot) => {
                for (current, candidate) in slot.get_mut().iter_mut().zip(weights) {
                    *current = (*current).max(candidate);
                }
            }
        }
    }

    // 6. Re-check edge thresholds against the fused sources
    let edges: Vec<GraphEdge> = merged_edges
        .into_iter()
        .filter(|((source, _), weights)| {
            let sizes = &arena.slots[*source].sizes;
            weights
                .iter()
                .zip(sizes)
                .any(|(&weight, size)| {
                    fraction(weight, size.cumulative) >= options.min_edge_fraction
                })
        })
        .map(|((source, target), weights)| GraphEdge {
            source,
            target,
            weights,
        })
        .collect();

    let merge_map: BTreeMap<NodeId, NodeId> = (0..arena.slots.len())
        .filter(|&id| !arena.is_canonical(id))
        .map(|id| (id, arena.find(id)))
        .collect();

    let nodes: Vec<GraphNode> = arena
        .slots
        .into_iter()
        .enumerate()
        .filter(|(id, slot)| slot.redirect == *id)
        .map(|(id, slot)| GraphNode {
            id,
            labels: slot.labels,
            sizes: slot.sizes,
            synthetic: slot.synthetic,
        })
        .collect();

    debug!(
        "Compared {} graphs: {} nodes, {} edges, {} merged away",
        graph_count,
        nodes.len(),
        edges.len(),
        merge_map.len()
    );

    Ok(SimplifiedGraph {
        total_usage,
        nodes,
        edges,
        merge_map,
        min_edge_fraction: options.min_edge_fraction,
        size_by_local_usage: options.size_by_local_usage,
    })
}

/// Fuse chains until no candidate is left. Each merge removes one live node,
/// so this terminates.
fn collapse_chains(arena: &mut Arena, edges: impl Iterator<Item = (NodeId, NodeId)>) {
    let count = arena.slots.len();
    let mut outgoing: Vec<BTreeSet<NodeId>> = vec![BTreeSet::new(); count];
    let mut incoming: Vec<BTreeSet<NodeId>> = vec![BTreeSet::new(); count];
    for (source, target) in edges {
        outgoing[source].insert(target);
        incoming[target].insert(source);
    }

    let boring = |slot: &Slot| {
        slot.sizes
            .iter()
            .all(|size| fraction(size.local, size.cumulative) < COLLAPSE_LOCAL_FRACTION)
    };

    let mut merges = 0usize;
    let mut changed = true;
    while changed {
        changed = false;
        for parent in 0..count {
            if !arena.is_canonical(parent) || !boring(&arena.slots[parent]) {
                continue;
            }
            if outgoing[parent].len() != 1 {
                continue;
            }
            let Some(&child) = outgoing[parent].iter().next() else {
                continue;
            };
            if child == parent || incoming[child].len() != 1 {
                continue;
            }

            // Fold the parent into the child
            let parent_slot = arena.slots[parent].clone();
            let child_slot = &mut arena.slots[child];
            let mut labels = parent_slot.labels;
            labels.append(&mut child_slot.labels);
            child_slot.labels = labels;
            for (size, absorbed) in child_slot.sizes.iter_mut().zip(&parent_slot.sizes) {
                size.local += absorbed.local;
            }
            child_slot.synthetic |= parent_slot.synthetic;
            arena.slots[parent].redirect = child;

            // Rewire the parent's callers to the child
            incoming[child].remove(&parent);
            for caller in std::mem::take(&mut incoming[parent]) {
                outgoing[caller].remove(&parent);
                if caller != child {
                    outgoing[caller].insert(child);
                    incoming[child].insert(caller);
                }
            }
            outgoing[parent].clear();
            outgoing[child].remove(&parent);

            merges += 1;
            changed = true;
        }
    }
    debug!("Collapsed {} chain links", merges);
}

impl SimplifiedGraph {
    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes
            .binary_search_by_key(&id, |node| node.id)
            .ok()
            .map(|index| &self.nodes[index])
    }

    /// The surviving node that now carries `location`
    pub fn node_for(&self, location: &SourceLocation) -> Option<&GraphNode> {
        self.nodes
            .iter()
            .find(|node| node.labels.contains(location))
    }

    /// Canonical id after following the merge map
    pub fn canonical(&self, id: NodeId) -> NodeId {
        self.merge_map.get(&id).copied().unwrap_or(id)
    }

    /// Cumulative usage of `node` as a fraction of each graph's total
    pub fn cumulative_fractions(&self, node: &GraphNode) -> Vec<f64> {
        node.sizes
            .iter()
            .zip(&self.total_usage)
            .map(|(size, &total)| fraction(size.cumulative, total))
            .collect()
    }

    /// Font size: largest local fraction across graphs, or the minimum when
    /// sizing by usage is off
    pub fn font_size(&self, node: &GraphNode) -> u32 {
        if !self.size_by_local_usage {
            return MIN_FONT_SIZE;
        }
        let largest = node
            .sizes
            .iter()
            .zip(&self.total_usage)
            .map(|(size, &total)| fraction(size.local, total))
            .fold(0.0, f64::max);
        font_size(largest)
    }

    /// One fill colour per graph, keyed by cumulative fraction
    pub fn node_colors(&self, node: &GraphNode) -> Vec<String> {
        self.cumulative_fractions(node)
            .into_iter()
            .map(node_color)
            .collect()
    }

    /// Largest fraction of the source's cumulative usage the edge carries
    pub fn edge_fraction(&self, edge: &GraphEdge) -> f64 {
        let Some(source) = self.node(edge.source) else {
            return 0.0;
        };
        edge.weights
            .iter()
            .zip(&source.sizes)
            .map(|(&weight, size)| fraction(weight, size.cumulative))
            .fold(0.0, f64::max)
    }

    pub fn edge_color(&self, edge: &GraphEdge) -> String {
        edge_color(self.edge_fraction(edge), self.min_edge_fraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn loc(name: &str) -> SourceLocation {
        SourceLocation::new(name, 1)
    }

    /// Stacks written as `caller;callee` paths
    fn graph(stacks: &[(&str, u64)]) -> UsageGraph {
        let mut graph = UsageGraph::default();
        for &(path, bytes) in stacks {
            let stack: Vec<SourceLocation> = path.split(';').map(loc).collect();
            graph.add_stack(&stack, bytes);
        }
        graph
    }

    #[test]
    fn test_rejects_out_of_range_thresholds() {
        let options = CompareOptions {
            min_node_fraction: 1.5,
            ..CompareOptions::default()
        };
        assert!(compare(&[], &options).is_err());
        let options = CompareOptions {
            min_edge_fraction: -0.1,
            ..CompareOptions::default()
        };
        assert!(compare(&[], &options).is_err());
    }

    #[test]
    fn test_small_nodes_dropped_unless_big_somewhere() {
        let early = graph(&[("main;big", 990), ("main;small", 10)]);
        let late = graph(&[("main;big", 500), ("main;small", 500)]);
        let options = CompareOptions {
            min_node_fraction: 0.05,
            collapse: false,
            ..CompareOptions::default()
        };

        let only_early = compare(std::slice::from_ref(&early), &options).unwrap();
        assert!(only_early.node_for(&loc("small")).is_none());

        let both = compare(&[early, late], &options).unwrap();
        let small = both.node_for(&loc("small")).unwrap();
        assert_eq!(
            small.sizes,
            vec![
                NodeSize { cumulative: 10, local: 10 },
                NodeSize { cumulative: 500, local: 500 }
            ]
        );
    }

    #[test]
    fn test_synthetic_root_over_multiple_roots() {
        let g = graph(&[("thread_a;work", 60), ("thread_b;work", 40)]);
        let options = CompareOptions {
            collapse: false,
            ..CompareOptions::default()
        };
        let result = compare(&[g], &options).unwrap();

        let root = result.nodes.iter().find(|node| node.synthetic).unwrap();
        assert_eq!(root.labels, vec![SourceLocation::new(PROGRAM_ROOT, 0)]);
        assert_eq!(root.sizes, vec![NodeSize { cumulative: 100, local: 0 }]);

        let root_edges: Vec<&GraphEdge> =
            result.edges.iter().filter(|edge| edge.source == root.id).collect();
        assert_eq!(root_edges.len(), 2);
        let weights: BTreeSet<u64> = root_edges.iter().map(|edge| edge.weights[0]).collect();
        assert_eq!(weights, BTreeSet::from([40, 60]));
    }

    #[test]
    fn test_single_root_needs_no_synthetic_node() {
        let g = graph(&[("main;a", 60), ("main;b", 40)]);
        let result = compare(&[g], &CompareOptions::default()).unwrap();
        assert!(result.nodes.iter().all(|node| !node.synthetic));
    }

    #[test]
    fn test_chain_collapses_into_callee() {
        let g = graph(&[("main;parse;alloc", 100)]);
        let result = compare(&[g], &CompareOptions::default()).unwrap();

        assert_eq!(result.nodes.len(), 1);
        assert_eq!(result.nodes[0].labels, vec![loc("main"), loc("parse"), loc("alloc")]);
        assert_eq!(result.nodes[0].sizes, vec![NodeSize { cumulative: 100, local: 100 }]);
        assert!(result.edges.is_empty());
        assert_eq!(result.merge_map.len(), 2);
        for (&merged, &target) in &result.merge_map {
            assert_eq!(result.canonical(merged), target);
            assert_eq!(target, result.nodes[0].id);
        }
    }

    #[test]
    fn test_lone_chain_folds_to_one_node_across_graphs() {
        let early = graph(&[("x;y;z", 400)]);
        let late = graph(&[("x;y;z", 900)]);
        let result = compare(&[early, late], &CompareOptions::default()).unwrap();

        // The leaf has no other caller, so the whole chain ends up in it, callers first
        assert_eq!(result.nodes.len(), 1);
        assert_eq!(result.nodes[0].labels, vec![loc("x"), loc("y"), loc("z")]);
        assert_eq!(
            result.nodes[0].sizes,
            vec![
                NodeSize { cumulative: 400, local: 400 },
                NodeSize { cumulative: 900, local: 900 },
            ]
        );
        assert!(result.edges.is_empty());
    }

    #[test]
    fn test_node_with_local_usage_is_not_collapsed() {
        let g = graph(&[("main", 50), ("main;alloc", 50)]);
        let result = compare(&[g], &CompareOptions::default()).unwrap();
        assert_eq!(result.nodes.len(), 2);
        assert_eq!(result.edges.len(), 1);
    }

    #[test]
    fn test_edges_below_threshold_everywhere_are_dropped() {
        // main -> tiny carries 2% of main
        let g = graph(&[("main;big", 98), ("main;tiny", 2)]);
        let options = CompareOptions {
            min_node_fraction: 0.0,
            min_edge_fraction: 0.05,
            collapse: false,
            ..CompareOptions::default()
        };
        let result = compare(&[g], &options).unwrap();
        assert!(result.node_for(&loc("tiny")).is_some());
        assert_eq!(result.edges.len(), 2);
        // tiny becomes a second root, attached to the synthetic root at 2%
        let root = result.nodes.iter().find(|node| node.synthetic).unwrap();
        assert!(result
            .edges
            .iter()
            .all(|edge| !(edge.source == root.id && edge.weights == vec![2])));
    }

    #[test]
    fn test_presentation_accessors() {
        let g = graph(&[("main", 50), ("main;alloc", 50)]);
        let result = compare(&[g], &CompareOptions::default()).unwrap();
        let main = result.node_for(&loc("main")).unwrap();
        assert_eq!(result.cumulative_fractions(main), vec![1.0]);
        assert_eq!(result.node_colors(main), vec![node_color(1.0)]);
        assert_eq!(result.font_size(main), font_size(0.5));

        let edge = &result.edges[0];
        assert_eq!(result.edge_fraction(edge), 0.5);
        assert_eq!(result.edge_color(edge), "#000000");

        let unsized_result = compare(
            &[graph(&[("main", 50)])],
            &CompareOptions {
                size_by_local_usage: false,
                ..CompareOptions::default()
            },
        )
        .unwrap();
        assert_eq!(unsized_result.font_size(&unsized_result.nodes[0]), MIN_FONT_SIZE);
    }
}
