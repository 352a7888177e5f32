//! Folding allocation events into "live bytes per allocation site".

use crate::trace::{AllocationEvent, TraceId};
use crate::utils::error::DecodeError;
use std::collections::HashMap;
use std::ops::RangeInclusive;

/// Estimated live bytes per trace id. Entries that net to zero are removed.
pub type LiveSet = HashMap<TraceId, i64>;

/// Streaming reducer over an ordered event sequence
///
/// **Public** - used by the digest builder, heap history and window queries
#[derive(Debug, Clone, Default)]
pub struct LiveSetReducer {
    live: LiveSet,
    max_timestamp_ms: Option<u64>,
    events_applied: u64,
}

impl LiveSetReducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event in the order given
    pub fn apply(&mut self, event: &AllocationEvent) {
        let estimate = event.estimated_bytes();
        let entry = self.live.entry(event.trace_id).or_insert(0);
        *entry += estimate;
        if *entry == 0 {
            self.live.remove(&event.trace_id);
        }

        self.max_timestamp_ms = Some(
            self.max_timestamp_ms
                .map_or(event.timestamp_ms, |seen| seen.max(event.timestamp_ms)),
        );
        self.events_applied += 1;
    }

    /// Live set built from the events whose timestamps fall in `window` (millis)
    ///
    /// # Errors
    /// Propagates the first decode error from `events`.
    pub fn from_window<I>(events: I, window: RangeInclusive<u64>) -> Result<Self, DecodeError>
    where
        I: IntoIterator<Item = Result<AllocationEvent, DecodeError>>,
    {
        let mut reducer = Self::new();
        for event in events {
            let event = event?;
            if event.timestamp_ms > *window.end() {
                // Timestamps never go backwards within a stream
                break;
            }
            if window.contains(&event.timestamp_ms) {
                reducer.apply(&event);
            }
        }
        Ok(reducer)
    }

    /// Live set as of `relative_secs` after `initial_ms`
    pub fn at_time<I>(events: I, initial_ms: u64, relative_secs: f64) -> Result<Self, DecodeError>
    where
        I: IntoIterator<Item = Result<AllocationEvent, DecodeError>>,
    {
        let offset_ms = (relative_secs.max(0.0) * 1000.0).round() as u64;
        Self::from_window(events, 0..=initial_ms.saturating_add(offset_ms))
    }

    pub fn live_set(&self) -> &LiveSet {
        &self.live
    }

    pub fn into_live_set(self) -> LiveSet {
        self.live
    }

    /// Sum of all live estimates
    pub fn total_bytes(&self) -> i64 {
        self.live.values().sum()
    }

    pub fn max_timestamp_ms(&self) -> Option<u64> {
        self.max_timestamp_ms
    }

    pub fn events_applied(&self) -> u64 {
        self.events_applied
    }
}
