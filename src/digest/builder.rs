//! Building a digest by replaying the full event stream.

use super::format::DigestWriter;
use super::snapshot::Snapshot;
use crate::aggregator::history::interval_millis;
use crate::aggregator::{replay, Boundary};
use crate::trace::AllocationEvent;
use crate::utils::config::{DEFAULT_DIGEST_INTERVAL_SECS, DEFAULT_DIGEST_PRECISION};
use crate::utils::error::{ArgumentError, DecodeError, DigestError};
use log::{info, warn};
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::AtomicBool;

/// Parameters of a digest build
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DigestOptions {
    /// Seconds between snapshots
    pub interval: f64,

    /// Fraction of each snapshot's total that pruning may move into id 0
    pub precision: f64,
}

impl Default for DigestOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_DIGEST_INTERVAL_SECS,
            precision: DEFAULT_DIGEST_PRECISION,
        }
    }
}

impl DigestOptions {
    pub fn new(interval: f64, precision: f64) -> Result<Self, ArgumentError> {
        let options = Self {
            interval,
            precision,
        };
        options.validate()?;
        Ok(options)
    }

    /// Check `interval > 0` (at least 1ms) and `precision` in `[0, 1)`
    pub fn validate(&self) -> Result<(), ArgumentError> {
        interval_millis("interval", self.interval)?;
        if !(0.0..1.0).contains(&self.precision) {
            return Err(ArgumentError::new(format!(
                "precision must be in [0, 1), got {}",
                self.precision
            )));
        }
        Ok(())
    }

    pub fn interval_ms(&self) -> Result<u64, ArgumentError> {
        interval_millis("interval", self.interval)
    }
}

/// What a digest build produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DigestSummary {
    /// Events replayed
    pub events: u64,

    /// Snapshots committed to the digest
    pub snapshots: u64,

    /// Distinct snapshot records written; gaps reuse records
    pub records: u64,

    /// Digest file size in bytes
    pub bytes_written: u64,

    /// The build stopped early on request. The digest holds every snapshot
    /// committed before that point.
    pub interrupted: bool,
}

/// Replay `events` into a new digest at `path`
///
/// **Public** - main entry point for digest construction
///
/// # Arguments
/// * `events` - Event stream in timestamp order
/// * `initial_ms` - Trace start, from the metadata header
/// * `options` - Interval and precision
/// * `path` - Digest file; an existing file is replaced
/// * `cancel` - Set from another thread or a signal handler to stop early
///
/// # Returns
/// A summary; `interrupted` is set if `cancel` was observed
///
/// # Errors
/// * `DigestError::Argument` - invalid options, checked before anything is written
/// * `DigestError::Decode` - the event stream is corrupt
/// * `DigestError::Io` - writing the digest failed
pub fn build_digest<I>(
    events: I,
    initial_ms: u64,
    options: &DigestOptions,
    path: &Path,
    cancel: Option<&AtomicBool>,
) -> Result<DigestSummary, DigestError>
where
    I: IntoIterator<Item = Result<AllocationEvent, DecodeError>>,
{
    options.validate()?;
    let interval_ms = options.interval_ms()?;
    info!(
        "Building digest {} (interval {}s, precision {})",
        path.display(),
        options.interval,
        options.precision
    );

    let mut writer = DigestWriter::create(path, initial_ms, interval_ms)?;
    let mut records = 0u64;
    let mut record = Vec::new();

    let commit = |boundary: Boundary<'_>| -> Result<(), DigestError> {
        if boundary.unchanged && writer.repeat_last()? {
            return Ok(());
        }
        let relative_time = boundary.index as f64 * options.interval;
        let snapshot =
            Snapshot::from_live_set(relative_time, boundary.reducer.live_set(), options.precision);
        record.clear();
        snapshot.encode(&mut record);
        writer.append(&record)?;
        records += 1;
        Ok(())
    };
    let outcome = replay(events, initial_ms, interval_ms, cancel, commit)?;

    let bytes_written = writer.len();
    let snapshots = writer.finish()?;
    let summary = DigestSummary {
        events: outcome.events,
        snapshots,
        records,
        bytes_written,
        interrupted: outcome.interrupted,
    };

    if summary.interrupted {
        warn!(
            "Digest interrupted; kept {} snapshots from {} events",
            summary.snapshots, summary.events
        );
    } else {
        info!(
            "Digest complete: {} events, {} snapshots, {} records, {} bytes",
            summary.events, summary.snapshots, summary.records, summary.bytes_written
        );
    }
    Ok(summary)
}
