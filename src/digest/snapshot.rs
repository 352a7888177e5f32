//! Pruned, non-negative snapshots of a live set.

use crate::aggregator::LiveSet;
use crate::codec::{put_varint, read_varint};
use crate::trace::{TraceId, UNKNOWN_TRACE};
use crate::utils::error::DecodeError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Read;

/// Heap usage per trace id at one point in time
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Snapshot {
    /// Seconds since the start of the trace
    pub relative_time: f64,

    /// Bytes per trace id. Id 0 holds bytes whose attribution was pruned
    /// or was never known. Zero-byte entries are never stored.
    pub usage: BTreeMap<TraceId, u64>,
}

impl Snapshot {
    /// Build a snapshot from a live set, folding small entries into id 0
    ///
    /// **Public** - used by the digest builder
    ///
    /// # Arguments
    /// * `relative_time` - Seconds since the start of the trace
    /// * `live` - Live set, possibly with negative estimates
    /// * `precision` - Fraction of the total that may lose its attribution
    ///
    /// # Algorithm
    /// 1. Negative estimates are netted into id 0, which is clamped at zero
    /// 2. Positive entries are sorted ascending by `(bytes, id)`
    /// 3. The longest prefix whose sum stays within `precision * total` is
    ///    moved into id 0
    pub fn from_live_set(relative_time: f64, live: &LiveSet, precision: f64) -> Self {
        let mut unknown: i64 = 0;
        let mut entries: Vec<(u64, TraceId)> = Vec::with_capacity(live.len());
        for (&trace_id, &bytes) in live {
            if trace_id == UNKNOWN_TRACE || bytes < 0 {
                unknown += bytes;
            } else if bytes > 0 {
                entries.push((bytes as u64, trace_id));
            }
        }
        let mut unknown = unknown.max(0) as u64;

        let total = unknown + entries.iter().map(|&(bytes, _)| bytes).sum::<u64>();
        let budget = precision * total as f64;

        entries.sort_unstable();
        let mut folded = 0u64;
        let mut keep_from = 0;
        for &(bytes, _) in &entries {
            if (folded + bytes) as f64 > budget {
                break;
            }
            folded += bytes;
            keep_from += 1;
        }
        unknown += folded;

        let mut usage: BTreeMap<TraceId, u64> = entries[keep_from..]
            .iter()
            .map(|&(bytes, trace_id)| (trace_id, bytes))
            .collect();
        if unknown > 0 {
            usage.insert(UNKNOWN_TRACE, unknown);
        }

        Self {
            relative_time,
            usage,
        }
    }

    /// Sum of all entries, attributed or not
    pub fn total_usage(&self) -> u64 {
        self.usage.values().sum()
    }

    /// Bytes with no usable attribution
    pub fn unknown_usage(&self) -> u64 {
        self.usage.get(&UNKNOWN_TRACE).copied().unwrap_or(0)
    }

    /// Append the on-disk record: entry count, then `(trace id, bytes)` pairs
    pub fn encode(&self, buf: &mut Vec<u8>) {
        put_varint(buf, self.usage.len() as u64);
        for (&trace_id, &bytes) in &self.usage {
            put_varint(buf, trace_id);
            put_varint(buf, bytes);
        }
    }

    /// Read one record written by [`encode`](Self::encode)
    pub fn decode<R: Read>(src: &mut R, relative_time: f64) -> Result<Self, DecodeError> {
        let count = read_varint(src, "snapshot record")?;
        let mut usage = BTreeMap::new();
        for _ in 0..count {
            let trace_id = read_varint(src, "snapshot entry")?;
            let bytes = read_varint(src, "snapshot entry")?;
            if bytes > 0 {
                *usage.entry(trace_id).or_insert(0) += bytes;
            }
        }
        Ok(Self {
            relative_time,
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn live(entries: &[(TraceId, i64)]) -> LiveSet {
        entries.iter().copied().collect()
    }

    #[test]
    fn test_prune_folds_smallest_within_budget() {
        // total 1000, budget 50: 10 + 30 fit, 60 would not
        let set = live(&[(1, 10), (2, 30), (3, 60), (4, 900)]);
        let snapshot = Snapshot::from_live_set(5.0, &set, 0.05);
        assert_eq!(snapshot.usage, BTreeMap::from([(0, 40), (3, 60), (4, 900)]));
        assert_eq!(snapshot.total_usage(), 1000);
        assert_eq!(snapshot.unknown_usage(), 40);
    }

    #[test]
    fn test_zero_precision_keeps_everything() {
        let set = live(&[(1, 10), (2, 30)]);
        let snapshot = Snapshot::from_live_set(0.0, &set, 0.0);
        assert_eq!(snapshot.usage, BTreeMap::from([(1, 10), (2, 30)]));
    }

    #[test]
    fn test_negative_estimates_net_into_unknown() {
        let set = live(&[(0, 5), (1, 100), (2, -20)]);
        let snapshot = Snapshot::from_live_set(0.0, &set, 0.0);
        assert_eq!(snapshot.usage, BTreeMap::from([(1, 100)]));

        let set = live(&[(0, 50), (1, 100), (2, -20)]);
        let snapshot = Snapshot::from_live_set(0.0, &set, 0.0);
        assert_eq!(snapshot.usage, BTreeMap::from([(0, 30), (1, 100)]));
    }

    #[test]
    fn test_equal_sizes_fold_lower_id_first() {
        let set = live(&[(7, 10), (3, 10), (5, 80)]);
        let snapshot = Snapshot::from_live_set(0.0, &set, 0.15);
        assert_eq!(snapshot.usage, BTreeMap::from([(0, 10), (5, 80), (7, 10)]));
    }

    #[test]
    fn test_record_decodes() {
        let set = live(&[(1, 10), (300, 70_000)]);
        let snapshot = Snapshot::from_live_set(2.0, &set, 0.0);
        let mut buf = Vec::new();
        snapshot.encode(&mut buf);

        let decoded = Snapshot::decode(&mut Cursor::new(&buf), 2.0).unwrap();
        assert_eq!(decoded, snapshot);

        buf.pop();
        assert!(matches!(
            Snapshot::decode(&mut Cursor::new(&buf), 2.0),
            Err(DecodeError::TruncatedRead { .. })
        ));
    }
}
