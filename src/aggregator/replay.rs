//! Replaying an event stream onto a fixed time grid.
//!
//! Boundary `k` sits at `initial + k * interval`. Before an event later than
//! the next boundary is applied, the reducer state is emitted once for every
//! boundary the event skips over; after the stream ends one final state is
//! emitted. The digest builder and heap history both sample the heap this way.

use super::live_set::LiveSetReducer;
use crate::trace::AllocationEvent;
use crate::utils::config::PROGRESS_EVERY_EVENTS;
use crate::utils::error::DecodeError;
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};

/// One emitted grid point
pub struct Boundary<'a> {
    /// Position on the grid, starting at 0
    pub index: usize,
    /// Absolute time of the grid point in millis
    pub time_ms: u64,
    /// Reducer state as of the last event at or before `time_ms`
    pub reducer: &'a LiveSetReducer,
    /// No event was applied since the previous emission
    pub unchanged: bool,
    /// Emitted after the stream ended
    pub is_final: bool,
}

/// How a replay ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayOutcome {
    pub events: u64,
    pub boundaries: usize,
    /// Cancellation was observed before the final emission
    pub interrupted: bool,
}

fn cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
}

/// Drive `events` through a [`LiveSetReducer`], calling `emit` at each grid point
///
/// **Public** - shared by the digest builder and heap history
///
/// # Arguments
/// * `events` - Event stream in timestamp order
/// * `initial_ms` - Time of boundary 0
/// * `interval_ms` - Grid spacing, must be nonzero
/// * `cancel` - Polled before each emission and every few thousand events
/// * `emit` - Called once per grid point; its error aborts the replay
///
/// # Errors
/// The first decode error from `events` or error from `emit`.
pub fn replay<I, F, E>(
    events: I,
    initial_ms: u64,
    interval_ms: u64,
    cancel: Option<&AtomicBool>,
    mut emit: F,
) -> Result<ReplayOutcome, E>
where
    I: IntoIterator<Item = Result<AllocationEvent, DecodeError>>,
    F: FnMut(Boundary<'_>) -> Result<(), E>,
    E: From<DecodeError>,
{
    debug_assert!(interval_ms > 0);
    let interval_ms = interval_ms.max(1);

    let mut reducer = LiveSetReducer::new();
    let mut index = 0usize;
    let mut next_boundary = initial_ms;
    let mut dirty = true;
    let mut events_seen = 0u64;

    let interrupted = |events_seen: u64, index: usize| {
        warn!(
            "Replay interrupted after {} events and {} boundaries",
            events_seen, index
        );
        ReplayOutcome {
            events: events_seen,
            boundaries: index,
            interrupted: true,
        }
    };

    for event in events {
        let event = event?;

        while event.timestamp_ms > next_boundary {
            if cancelled(cancel) {
                return Ok(interrupted(events_seen, index));
            }
            emit(Boundary {
                index,
                time_ms: next_boundary,
                reducer: &reducer,
                unchanged: !dirty,
                is_final: false,
            })?;
            dirty = false;
            index += 1;
            next_boundary = next_boundary.saturating_add(interval_ms);
        }

        reducer.apply(&event);
        dirty = true;
        events_seen += 1;

        if events_seen % PROGRESS_EVERY_EVENTS as u64 == 0 {
            debug!(
                "Replayed {} events spanning {:.1}s",
                events_seen,
                event.timestamp_ms.saturating_sub(initial_ms) as f64 / 1000.0
            );
            if cancelled(cancel) {
                return Ok(interrupted(events_seen, index));
            }
        }
    }

    if cancelled(cancel) {
        return Ok(interrupted(events_seen, index));
    }
    emit(Boundary {
        index,
        time_ms: next_boundary,
        reducer: &reducer,
        unchanged: !dirty,
        is_final: true,
    })?;

    Ok(ReplayOutcome {
        events: events_seen,
        boundaries: index + 1,
        interrupted: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(timestamp_ms: u64, trace_id: u64, size: i64) -> Result<AllocationEvent, DecodeError> {
        Ok(AllocationEvent {
            timestamp_ms,
            trace_id,
            size,
            scale_factor: 1.0,
        })
    }

    type Emitted = Vec<(usize, u64, i64, bool, bool)>;

    fn run(
        events: Vec<Result<AllocationEvent, DecodeError>>,
        cancel: Option<&AtomicBool>,
    ) -> (Emitted, ReplayOutcome) {
        let mut emitted = Vec::new();
        let record = |b: Boundary<'_>| -> Result<(), DecodeError> {
            emitted.push((b.index, b.time_ms, b.reducer.total_bytes(), b.unchanged, b.is_final));
            Ok(())
        };
        let outcome = replay(events, 1_000, 100, cancel, record).unwrap();
        (emitted, outcome)
    }

    #[test]
    fn test_gap_repeats_state_for_each_skipped_boundary() {
        let (emitted, outcome) = run(
            vec![event(1_000, 1, 10), event(1_050, 1, 5), event(1_350, 2, 7)],
            None,
        );
        assert_eq!(
            emitted,
            vec![
                (0, 1_000, 10, false, false),
                (1, 1_100, 15, false, false),
                (2, 1_200, 15, true, false),
                (3, 1_300, 15, true, false),
                (4, 1_400, 22, false, true),
            ]
        );
        assert_eq!(outcome.boundaries, 5);
        assert_eq!(outcome.events, 3);
        assert!(!outcome.interrupted);
    }

    #[test]
    fn test_empty_stream_emits_final_only() {
        let (emitted, outcome) = run(Vec::new(), None);
        assert_eq!(emitted, vec![(0, 1_000, 0, false, true)]);
        assert_eq!(outcome.boundaries, 1);
    }

    #[test]
    fn test_cancelled_before_start_emits_nothing() {
        let flag = AtomicBool::new(true);
        let (emitted, outcome) = run(vec![event(1_500, 1, 1)], Some(&flag));
        assert!(emitted.is_empty());
        assert!(outcome.interrupted);
    }

    #[test]
    fn test_emit_error_aborts() {
        let result = replay(vec![event(1_200, 1, 1)], 1_000, 100, None, |_b: Boundary<'_>| {
            Err(DecodeError::VarintOverflow)
        });
        assert!(matches!(result, Err(DecodeError::VarintOverflow)));
    }
}
