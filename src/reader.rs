//! High-level access to a recorded heap trace.
//!
//! A trace lives next to a base path: `<base>.hpm` holds the stack metadata,
//! `<base>.hpd` the event stream and `<base>.hpc` the digest, once built.
//! [`ProfileReader`] ties the three together and answers questions in terms
//! of snapshots, graphs and plots.

use crate::aggregator::{HeapHistory, LiveSetReducer};
use crate::digest::{build_digest, DigestOptions, DigestReader, DigestSummary, Snapshot};
use crate::flamegraph::{
    build_collapsed_stacks, generate_flamegraph, write_collapsed, FlamegraphConfig,
};
use crate::graph::{compare, CompareOptions, SimplifiedGraph, UsageGraph};
use crate::trace::{
    CallStack, EventReader, MetadataHeader, SamplingConfig, SourceLocation, TraceId, TraceStore,
};
use crate::utils::config::{DIGEST_EXTENSION, EVENTS_EXTENSION, METADATA_EXTENSION};
use crate::utils::error::{ArgumentError, DecodeError, DigestError, ProfileError};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

/// Usage over time, overall and at chosen source lines.
///
/// `times` and `total_usage` are parallel; `lines[k]` is parallel to `times`
/// and belongs to `labels[k]`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TimePlot {
    /// Relative times, in seconds
    pub times: Vec<f64>,
    pub total_usage: Vec<u64>,
    pub lines: Vec<Vec<u64>>,
    pub labels: Vec<String>,
}

/// Reader over one trace and its digest
#[derive(Debug)]
pub struct ProfileReader {
    base: PathBuf,
    store: TraceStore,
    digest: Option<DigestReader>,
}

/// `<base>.<ext>`, keeping any dots already in the base name
fn with_suffix(base: &Path, extension: &str) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

impl ProfileReader {
    /// Open the trace at `base`, along with its digest if one exists
    ///
    /// **Public** - main entry point for analysis
    ///
    /// # Errors
    /// * `DecodeError` - the metadata file is missing or its header is unreadable.
    ///   A missing or broken digest is not an error; see [`Self::has_digest`].
    pub fn open(base: impl AsRef<Path>) -> Result<Self, DecodeError> {
        let base = base.as_ref().to_path_buf();
        info!("Opening trace {}", base.display());

        let store = TraceStore::open(&with_suffix(&base, METADATA_EXTENSION))?;
        let mut reader = Self {
            base,
            store,
            digest: None,
        };
        reader.reopen_digest();
        Ok(reader)
    }

    pub fn metadata_path(&self) -> PathBuf {
        with_suffix(&self.base, METADATA_EXTENSION)
    }

    pub fn events_path(&self) -> PathBuf {
        with_suffix(&self.base, EVENTS_EXTENSION)
    }

    pub fn digest_path(&self) -> PathBuf {
        with_suffix(&self.base, DIGEST_EXTENSION)
    }

    fn reopen_digest(&mut self) {
        let path = self.digest_path();
        self.digest = match DigestReader::open(&path) {
            Ok(digest) => Some(digest),
            Err(e) => {
                debug!("No usable digest: {}", e);
                None
            }
        };
    }

    fn digest(&mut self) -> Result<&mut DigestReader, DigestError> {
        let path = self.digest_path();
        self.digest.as_mut().ok_or_else(|| {
            DigestError::Unavailable(format!(
                "{} not found; build it with `heapflow digest`",
                path.display()
            ))
        })
    }

    pub fn has_digest(&self) -> bool {
        self.digest.is_some()
    }

    /// Build (or rebuild) the digest from the event stream.
    ///
    /// Any existing digest is replaced. The digest is reopened afterwards
    /// whether the build finished, was cancelled or failed part way, so an
    /// interrupted build still leaves its committed snapshots readable.
    pub fn make_digest(
        &mut self,
        options: &DigestOptions,
        cancel: Option<&AtomicBool>,
    ) -> Result<DigestSummary, DigestError> {
        self.digest = None;
        let initial_ms = self.store.header().initial_ms;
        let path = self.digest_path();

        let result = self
            .events()
            .map_err(DigestError::from)
            .and_then(|events| build_digest(events, initial_ms, options, &path, cancel));

        self.reopen_digest();
        if let Err(e) = &result {
            warn!("Digest build failed: {}", e);
        }
        result
    }

    /// A fresh pass over the event stream
    pub fn events(&self) -> Result<EventReader, DecodeError> {
        EventReader::open(&self.events_path(), self.store.header())
    }

    pub fn header(&self) -> &MetadataHeader {
        self.store.header()
    }

    /// Trace start, in seconds since the epoch
    pub fn initial_time(&self) -> f64 {
        self.store.header().initial_time()
    }

    pub fn initial_datetime(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.store.header().initial_ms)
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
    }

    /// Relative time of the last snapshot
    pub fn elapsed_time(&mut self) -> Result<f64, DigestError> {
        Ok(self.digest()?.last_relative_time())
    }

    /// Time of the last snapshot, in seconds since the epoch
    pub fn final_time(&mut self) -> Result<f64, DigestError> {
        Ok(self.initial_time() + self.elapsed_time()?)
    }

    pub fn snapshot_interval(&mut self) -> Result<f64, DigestError> {
        Ok(self.digest()?.interval())
    }

    pub fn sampling_config(&self) -> &SamplingConfig {
        self.store.sampling_config()
    }

    /// Number of snapshots in the digest, zero when there is none
    pub fn snapshot_count(&self) -> usize {
        self.digest.as_ref().map_or(0, DigestReader::len)
    }

    pub fn snapshot(&mut self, index: usize) -> Result<Snapshot, DigestError> {
        self.digest()?.snapshot(index)
    }

    /// The snapshot at or just before `relative_time`, clamped to the digest
    pub fn snapshot_at(&mut self, relative_time: f64) -> Result<Snapshot, DigestError> {
        self.digest()?.snapshot_at(relative_time)
    }

    /// Every snapshot in order
    pub fn snapshots(&mut self) -> Result<Vec<Snapshot>, DigestError> {
        let digest = self.digest()?;
        (0..digest.len()).map(|index| digest.snapshot(index)).collect()
    }

    /// The stack for `trace_id`, or `None` if it is unknown
    pub fn resolve(&mut self, trace_id: TraceId) -> Result<Option<&CallStack>, DecodeError> {
        self.store.resolve(trace_id)
    }

    /// Decode every stack up front
    pub fn warm_cache(&mut self) -> Result<(), DecodeError> {
        self.store.warm_cache()
    }

    pub fn trace_store(&mut self) -> &mut TraceStore {
        &mut self.store
    }

    /// Live set at `relative_time`, computed from the raw events rather than the digest
    pub fn live_set_at(&self, relative_time: f64) -> Result<LiveSetReducer, DecodeError> {
        LiveSetReducer::at_time(self.events()?, self.store.header().initial_ms, relative_time)
    }

    /// Top consumers over time, replayed from the raw events
    pub fn history(&self, granularity: f64, top_n: usize) -> Result<HeapHistory, DigestError> {
        HeapHistory::make(
            self.events()?,
            self.store.header().initial_ms,
            granularity,
            top_n,
        )
    }

    pub fn usage_graph(&mut self, snapshot: &Snapshot) -> Result<UsageGraph, ProfileError> {
        Ok(UsageGraph::build(snapshot, &mut self.store)?)
    }

    pub fn usage_graph_at(&mut self, relative_time: f64) -> Result<UsageGraph, ProfileError> {
        let snapshot = self.snapshot_at(relative_time)?;
        self.usage_graph(&snapshot)
    }

    /// Compare the usage graphs at several relative times
    ///
    /// # Errors
    /// * `ProfileError::Argument` - no times given or thresholds out of range
    /// * `ProfileError::Digest` - no digest
    pub fn compare_at(
        &mut self,
        relative_times: &[f64],
        options: &CompareOptions,
    ) -> Result<SimplifiedGraph, ProfileError> {
        if relative_times.is_empty() {
            return Err(ArgumentError::new("at least one time is required").into());
        }
        options.validate()?;
        let graphs = relative_times
            .iter()
            .map(|&t| self.usage_graph_at(t))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(compare(&graphs, options)?)
    }

    /// Usage at `locations` without building a full graph.
    ///
    /// With `cumulative`, a stack counts toward every listed location it
    /// passes through (once per stack, however often the location recurs).
    /// Otherwise only its allocation site counts.
    ///
    /// # Returns
    /// Usage parallel to `locations`, and the snapshot's total usage
    pub fn fast_get_usage(
        &mut self,
        snapshot: &Snapshot,
        locations: &[SourceLocation],
        cumulative: bool,
    ) -> Result<(Vec<u64>, u64), DecodeError> {
        let mut usage = vec![0u64; locations.len()];
        let mut total = 0u64;

        for (&trace_id, &bytes) in &snapshot.usage {
            total += bytes;
            let Some(stack) = self.store.resolve(trace_id)? else {
                continue;
            };
            for (slot, location) in usage.iter_mut().zip(locations) {
                let hit = if cumulative {
                    stack.contains(location)
                } else {
                    stack.last() == Some(location)
                };
                if hit {
                    *slot += bytes;
                }
            }
        }
        Ok((usage, total))
    }

    /// Total usage per snapshot plus cumulative usage at each labelled line.
    /// Labels come out sorted.
    pub fn time_plot(
        &mut self,
        lines: &BTreeMap<String, SourceLocation>,
    ) -> Result<TimePlot, ProfileError> {
        let locations: Vec<SourceLocation> = lines.values().cloned().collect();
        let mut plot = TimePlot {
            labels: lines.keys().cloned().collect(),
            lines: vec![Vec::new(); locations.len()],
            ..TimePlot::default()
        };

        for snapshot in self.snapshots()? {
            let (usage, total) = self.fast_get_usage(&snapshot, &locations, true)?;
            plot.times.push(snapshot.relative_time);
            plot.total_usage.push(total);
            for (series, value) in plot.lines.iter_mut().zip(usage) {
                series.push(value);
            }
        }
        Ok(plot)
    }

    /// Write `snapshot` as collapsed stacks
    pub fn flame_graph<W: Write>(
        &mut self,
        snapshot: &Snapshot,
        out: &mut W,
    ) -> Result<(), ProfileError> {
        let (stacks, other) = build_collapsed_stacks(snapshot, &mut self.store)?;
        write_collapsed(&stacks, other, out)?;
        Ok(())
    }

    /// Render `snapshot` as an SVG flame graph
    pub fn flame_graph_svg(
        &mut self,
        snapshot: &Snapshot,
        config: &FlamegraphConfig,
    ) -> Result<String, ProfileError> {
        let (stacks, other) = build_collapsed_stacks(snapshot, &mut self.store)?;
        Ok(generate_flamegraph(&stacks, other, Some(config))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_keeps_dots() {
        assert_eq!(
            with_suffix(Path::new("/tmp/run.2024"), METADATA_EXTENSION),
            PathBuf::from("/tmp/run.2024.hpm")
        );
    }

    #[test]
    fn test_open_missing_trace_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ProfileReader::open(dir.path().join("absent")).is_err());
    }
}
