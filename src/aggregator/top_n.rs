//! Bounded top-N selection over a live set.

use super::live_set::LiveSet;
use crate::trace::{TraceId, UNKNOWN_TRACE};
use log::debug;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

/// Select the `n` largest-magnitude entries of `live`
///
/// **Public** - main entry point for history summaries
///
/// # Arguments
/// * `live` - Live bytes per trace id
/// * `n` - Number of entries to keep
///
/// # Returns
/// The selected entries plus a residual under id 0 holding
/// `total - selected`, clamped at zero. Equal magnitudes go to the lower id.
///
/// # Algorithm
/// A min-heap of at most `n` keys `(|bytes|, Reverse(id))`; each candidate
/// replaces the heap minimum if it sorts above it. O(M log N).
pub fn top_n(live: &LiveSet, n: usize) -> BTreeMap<TraceId, i64> {
    let mut heap: BinaryHeap<Reverse<(u64, Reverse<TraceId>)>> = BinaryHeap::with_capacity(n + 1);

    for (&trace_id, &bytes) in live {
        if trace_id == UNKNOWN_TRACE || n == 0 {
            continue;
        }
        let key = (bytes.unsigned_abs(), Reverse(trace_id));
        if heap.len() < n {
            heap.push(Reverse(key));
        } else if heap.peek().is_some_and(|Reverse(smallest)| key > *smallest) {
            heap.pop();
            heap.push(Reverse(key));
        }
    }

    let mut result: BTreeMap<TraceId, i64> = heap
        .into_iter()
        .map(|Reverse((_, Reverse(trace_id)))| (trace_id, live[&trace_id]))
        .collect();

    let total: i64 = live.values().sum();
    let selected: i64 = result.values().sum();
    let residual = (total - selected).max(0);
    if total - selected < 0 {
        debug!(
            "Clamping negative top-{} residual {} to zero",
            n,
            total - selected
        );
    }
    result.insert(UNKNOWN_TRACE, residual);
    result
}
