//! Heap size over time with the top consumers at each point.

use super::replay::{replay, Boundary};
use super::top_n::top_n;
use crate::trace::{AllocationEvent, TraceId};
use crate::utils::error::{ArgumentError, DecodeError, DigestError};
use log::info;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// The heap at one point on the history grid
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSlice {
    /// Absolute time in seconds since the epoch
    pub timestamp: f64,

    /// Estimated live bytes
    pub est_total_size: i64,

    /// Top consumers by trace id; id 0 holds everything else
    pub top_items: BTreeMap<TraceId, i64>,
}

/// A sequence of [`TimeSlice`]s at a fixed granularity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeapHistory {
    pub granularity: f64,
    pub history: Vec<TimeSlice>,
}

/// Columns ready for a stacked plot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryArrays {
    /// Seconds since the first slice
    pub times: Vec<f64>,
    /// One series per trace id, parallel to `times`, biggest peak first
    pub series: Vec<Vec<i64>>,
    /// Trace id of each series
    pub trace_ids: Vec<TraceId>,
}

impl HeapHistory {
    /// Replay `events` and record a slice every `granularity` seconds
    ///
    /// **Public** - main entry point for history
    ///
    /// # Arguments
    /// * `events` - Event stream in timestamp order
    /// * `initial_ms` - Start of the trace, from the metadata header
    /// * `granularity` - Seconds between slices
    /// * `top_n` - Consumers to keep per slice
    ///
    /// # Errors
    /// * `DigestError::Argument` - `granularity` does not round to at least 1ms
    /// * `DigestError::Decode` - the event stream is corrupt
    pub fn make<I>(
        events: I,
        initial_ms: u64,
        granularity: f64,
        top_n_items: usize,
    ) -> Result<Self, DigestError>
    where
        I: IntoIterator<Item = Result<AllocationEvent, DecodeError>>,
    {
        let interval_ms = interval_millis("granularity", granularity)?;
        let mut history = Vec::new();

        let outcome = replay(events, initial_ms, interval_ms, None, |boundary: Boundary<'_>| {
            // The last slice is stamped with the last event rather than the grid
            let time_ms = if boundary.is_final {
                boundary.reducer.max_timestamp_ms().unwrap_or(initial_ms)
            } else {
                boundary.time_ms
            };
            history.push(TimeSlice {
                timestamp: time_ms as f64 / 1000.0,
                est_total_size: boundary.reducer.total_bytes(),
                top_items: top_n(boundary.reducer.live_set(), top_n_items),
            });
            Ok::<(), DigestError>(())
        })?;

        info!(
            "Built heap history of {} slices from {} events",
            history.len(),
            outcome.events
        );
        Ok(Self {
            granularity,
            history,
        })
    }

    /// Trace ids that appear in any slice, excluding the residual bucket
    pub fn trace_ids(&self) -> Vec<TraceId> {
        let mut ids: Vec<TraceId> = self
            .history
            .iter()
            .flat_map(|slice| slice.top_items.keys().copied())
            .filter(|&id| id != 0)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Convert to plot columns. A trace missing from a slice's top items
    /// contributes zero there.
    pub fn as_arrays(&self) -> HistoryArrays {
        let Some(first) = self.history.first() else {
            return HistoryArrays {
                times: Vec::new(),
                series: Vec::new(),
                trace_ids: Vec::new(),
            };
        };

        let times: Vec<f64> = self
            .history
            .iter()
            .map(|slice| slice.timestamp - first.timestamp)
            .collect();

        let mut columns: HashMap<TraceId, Vec<i64>> = HashMap::new();
        for (position, slice) in self.history.iter().enumerate() {
            for (&trace_id, &bytes) in &slice.top_items {
                columns
                    .entry(trace_id)
                    .or_insert_with(|| vec![0; times.len()])[position] = bytes;
            }
        }

        let mut ranked: Vec<(i64, TraceId, Vec<i64>)> = columns
            .into_iter()
            .map(|(trace_id, data)| {
                let peak = data.iter().copied().max().unwrap_or(0);
                (peak, trace_id, data)
            })
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        let (series, trace_ids) = ranked
            .into_iter()
            .map(|(_, trace_id, data)| (data, trace_id))
            .unzip();
        HistoryArrays {
            times,
            series,
            trace_ids,
        }
    }
}

/// Convert a positive duration in seconds to whole millis
pub(crate) fn interval_millis(name: &str, seconds: f64) -> Result<u64, ArgumentError> {
    let millis = (seconds * 1000.0).round();
    if !seconds.is_finite() || millis < 1.0 {
        return Err(ArgumentError::new(format!(
            "{} must be at least 1ms, got {}s",
            name, seconds
        )));
    }
    Ok(millis as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn event(
        timestamp_ms: u64,
        trace_id: TraceId,
        size: i64,
    ) -> Result<AllocationEvent, DecodeError> {
        Ok(AllocationEvent {
            timestamp_ms,
            trace_id,
            size,
            scale_factor: 1.0,
        })
    }

    fn sample_history() -> HeapHistory {
        let events = vec![
            event(10_000, 1, 100),
            event(10_500, 2, 300),
            event(11_200, 3, 50),
            event(11_900, 2, -300),
        ];
        HeapHistory::make(events, 10_000, 1.0, 1).unwrap()
    }

    #[test]
    fn test_slices_on_grid() {
        let history = sample_history();
        let stamps: Vec<f64> = history.history.iter().map(|s| s.timestamp).collect();
        assert_eq!(stamps, vec![10.0, 11.0, 11.9]);

        let totals: Vec<i64> = history.history.iter().map(|s| s.est_total_size).collect();
        assert_eq!(totals, vec![100, 400, 150]);

        assert_eq!(history.history[1].top_items, BTreeMap::from([(0, 100), (2, 300)]));
        assert_eq!(history.history[2].top_items, BTreeMap::from([(0, 50), (1, 100)]));
    }

    #[test]
    fn test_as_arrays_sorted_by_peak() {
        let arrays = sample_history().as_arrays();
        assert_eq!(arrays.trace_ids, vec![2, 0, 1]);
        assert_eq!(arrays.series[0], vec![0, 300, 0]);
        assert_eq!(arrays.series[2], vec![100, 0, 100]);
        assert_eq!(arrays.times.len(), 3);
        assert!((arrays.times[2] - 1.9).abs() < 1e-9);
    }

    #[test]
    fn test_trace_ids_skip_residual() {
        assert_eq!(sample_history().trace_ids(), vec![1, 2]);
    }

    #[test]
    fn test_invalid_granularity() {
        assert!(matches!(
            HeapHistory::make(Vec::new(), 0, 0.0, 3),
            Err(DigestError::Argument(_))
        ));
        assert!(matches!(
            HeapHistory::make(Vec::new(), 0, f64::NAN, 3),
            Err(DigestError::Argument(_))
        ));
    }
}
