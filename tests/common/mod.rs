#![allow(dead_code)]

use heapflow::trace::{EventWriter, MetadataWriter, SamplingConfig, SourceLocation, TraceId};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

pub const START_MS: u64 = 1_700_000_000_000;

/// Stack from `file:line` frames, root first
pub fn stack(frames: &[&str]) -> Vec<SourceLocation> {
    frames
        .iter()
        .map(|frame| frame.parse().unwrap())
        .collect()
}

/// Write `<dir>/<name>.hpm` and `.hpd` with every allocation sampled.
///
/// Events are `(millis after START_MS, trace id, size)`.
pub fn write_trace(
    dir: &Path,
    name: &str,
    stacks: &[Vec<SourceLocation>],
    events: &[(u64, TraceId, i64)],
) -> PathBuf {
    write_sampled_trace(dir, name, &SamplingConfig::always(), stacks, events)
}

pub fn write_sampled_trace(
    dir: &Path,
    name: &str,
    sampling: &SamplingConfig,
    stacks: &[Vec<SourceLocation>],
    events: &[(u64, TraceId, i64)],
) -> PathBuf {
    let base = dir.join(name);

    let hpm = BufWriter::new(File::create(dir.join(format!("{}.hpm", name))).unwrap());
    let mut metadata = MetadataWriter::new(hpm, START_MS, sampling).unwrap();
    for frames in stacks {
        metadata.write_stack(frames).unwrap();
    }
    metadata.finish().unwrap();

    let hpd = BufWriter::new(File::create(dir.join(format!("{}.hpd", name))).unwrap());
    let mut writer = EventWriter::new(hpd, START_MS);
    for &(offset_ms, trace_id, size) in events {
        writer.write_event(START_MS + offset_ms, trace_id, size).unwrap();
    }
    writer.finish().unwrap();

    base
}

/// Two allocation sites under `main.py:1`, with a five second quiet gap
///
/// Grid at one second: snapshot 0 is empty, 1 holds the first two
/// allocations, 2..=5 are identical and 6 is the end of the stream.
pub fn gap_trace(dir: &Path) -> PathBuf {
    write_trace(
        dir,
        "gap",
        &[
            stack(&["main.py:1", "a.py:10"]),
            stack(&["main.py:1", "b.py:20"]),
        ],
        &[
            (100, 1, 1000),
            (500, 2, 500),
            (1500, 1, 1000),
            (5200, 2, -500),
            (5300, 1, 10),
        ],
    )
}
