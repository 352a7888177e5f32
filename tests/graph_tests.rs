mod common;

use common::{stack, write_trace};
use heapflow::digest::DigestOptions;
use heapflow::graph::{write_dot, CompareOptions, PROGRAM_ROOT};
use heapflow::trace::SourceLocation;
use heapflow::utils::ProfileError;
use heapflow::ProfileReader;
use pretty_assertions::assert_eq;
use std::path::Path;

fn loc(text: &str) -> SourceLocation {
    text.parse().unwrap()
}

/// `x -> y -> z` carries most of the heap and `w -> z` the rest. Snapshot 1
/// holds 1000/500 bytes on the two stacks, snapshot 2 holds 3000/100.
fn chain_reader(dir: &Path) -> ProfileReader {
    let base = write_trace(
        dir,
        "chain",
        &[
            stack(&["x.py:1", "y.py:2", "z.py:3"]),
            stack(&["w.py:4", "z.py:3"]),
        ],
        &[
            (100, 1, 1000),
            (200, 2, 500),
            (1500, 1, 2000),
            (1600, 2, -400),
        ],
    );
    let mut reader = ProfileReader::open(base).unwrap();
    reader
        .make_digest(&DigestOptions::new(1.0, 0.0).unwrap(), None)
        .unwrap();
    reader
}

#[test]
fn test_usage_graph_from_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let mut reader = chain_reader(dir.path());

    let graph = reader.usage_graph_at(1.0).unwrap();
    assert_eq!(graph.total_usage, 1500);
    assert_eq!(graph.cumulative_usage(&loc("z.py:3")), 1500);
    assert_eq!(graph.local_usage(&loc("z.py:3")), 1500);
    assert_eq!(graph.cumulative_usage(&loc("x.py:1")), 1000);
    assert_eq!(graph.local_usage(&loc("x.py:1")), 0);
    assert_eq!(graph.edge_usage[&(loc("y.py:2"), loc("z.py:3"))], 1000);
    assert_eq!(graph.edge_usage[&(loc("w.py:4"), loc("z.py:3"))], 500);
}

#[test]
fn test_chain_collapses_into_callee_with_shared_edge_weights() {
    let dir = tempfile::tempdir().unwrap();
    let mut reader = chain_reader(dir.path());

    let graph = reader
        .compare_at(&[1.0, 2.0], &CompareOptions::default())
        .unwrap();
    assert_eq!(graph.total_usage, vec![1500, 3100]);

    // x folded into y; z has two callers so the chain stops there
    let fused = graph.node_for(&loc("x.py:1")).unwrap();
    assert_eq!(fused.labels, vec![loc("x.py:1"), loc("y.py:2")]);
    assert_eq!(fused.sizes.iter().map(|s| s.local).collect::<Vec<_>>(), vec![0, 0]);
    assert_eq!(
        fused.sizes.iter().map(|s| s.cumulative).collect::<Vec<_>>(),
        vec![1000, 3000]
    );

    let z = graph.node_for(&loc("z.py:3")).unwrap();
    assert_eq!(z.labels, vec![loc("z.py:3")]);
    let into_z: Vec<_> = graph.edges.iter().filter(|e| e.target == z.id).collect();
    assert_eq!(into_z.len(), 2);

    let chain_edge = into_z.iter().find(|e| e.source == fused.id).unwrap();
    assert_eq!(chain_edge.weights, vec![1000, 3000]);
    assert_eq!(chain_edge.weights.iter().max(), Some(&3000));

    let x_id = graph
        .merge_map
        .keys()
        .copied()
        .find(|&id| graph.canonical(id) == fused.id)
        .unwrap();
    assert_ne!(x_id, fused.id);
}

#[test]
fn test_two_roots_get_a_program_root() {
    let dir = tempfile::tempdir().unwrap();
    let mut reader = chain_reader(dir.path());

    let graph = reader
        .compare_at(&[1.0, 2.0], &CompareOptions::default())
        .unwrap();
    let root = graph.nodes.iter().find(|n| n.synthetic).unwrap();
    assert_eq!(root.labels, vec![SourceLocation::new(PROGRAM_ROOT, 0)]);
    assert_eq!(
        root.sizes.iter().map(|s| s.cumulative).collect::<Vec<_>>(),
        vec![1500, 3100]
    );
    assert_eq!(graph.edges.iter().filter(|e| e.source == root.id).count(), 2);
}

#[test]
fn test_no_collapse_keeps_every_node() {
    let dir = tempfile::tempdir().unwrap();
    let mut reader = chain_reader(dir.path());

    let options = CompareOptions {
        collapse: false,
        ..CompareOptions::default()
    };
    let graph = reader.compare_at(&[1.0, 2.0], &options).unwrap();
    assert!(graph.merge_map.is_empty());
    // w, x, y, z and the synthetic root
    assert_eq!(graph.nodes.len(), 5);
    assert!(graph.nodes.iter().all(|n| n.labels.len() == 1));
}

#[test]
fn test_small_node_is_dropped_below_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let mut reader = chain_reader(dir.path());

    // w carries 100 of 3100 bytes at t=2, about 3%
    let options = CompareOptions {
        min_node_fraction: 0.05,
        collapse: false,
        ..CompareOptions::default()
    };
    let late = reader.compare_at(&[2.0], &options).unwrap();
    assert!(late.node_for(&loc("w.py:4")).is_none());

    // At t=1 it holds a third of the heap, so comparing both keeps it
    let both = reader.compare_at(&[1.0, 2.0], &options).unwrap();
    assert!(both.node_for(&loc("w.py:4")).is_some());
}

#[test]
fn test_dot_output_of_comparison() {
    let dir = tempfile::tempdir().unwrap();
    let mut reader = chain_reader(dir.path());
    let graph = reader
        .compare_at(&[1.0, 2.0], &CompareOptions::default())
        .unwrap();

    let mut out = Vec::new();
    write_dot(&graph, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert!(text.starts_with("digraph {"));
    assert!(text.contains("x.py:1"));
    assert!(text.contains("y.py:2"));
    assert!(text.contains(PROGRAM_ROOT));
    assert_eq!(text.matches(" -> ").count(), graph.edges.len());
}

#[test]
fn test_bad_thresholds_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut reader = chain_reader(dir.path());
    let options = CompareOptions {
        min_edge_fraction: -0.1,
        ..CompareOptions::default()
    };
    assert!(reader.compare_at(&[1.0], &options).is_err());
}

#[test]
fn test_compare_needs_at_least_one_time() {
    let dir = tempfile::tempdir().unwrap();
    let mut reader = chain_reader(dir.path());
    assert!(matches!(
        reader.compare_at(&[], &CompareOptions::default()),
        Err(ProfileError::Argument(_))
    ));
}
