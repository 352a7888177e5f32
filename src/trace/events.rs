//! Event stream decoding.
//!
//! Each record is `(delta millis, trace id, zig-zag size)`. Timestamps
//! accumulate from the initial time in the metadata header, and every event
//! carries the scale factor of its size class so consumers never need the
//! sampling configuration themselves.

use super::metadata::MetadataHeader;
use super::sampling::SamplingConfig;
use super::schema::AllocationEvent;
use crate::codec::{read_varint, read_varint_or_eof, read_zigzag};
use crate::utils::error::DecodeError;
use log::debug;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Streaming iterator over the events of a trace.
///
/// Yields `Err` at most once; after a decode error the iterator is finished.
pub struct EventReader<R = BufReader<File>> {
    source: R,
    sampling: SamplingConfig,
    last_ms: u64,
    done: bool,
}

impl EventReader {
    /// Open an event file whose timestamps start at the header's initial time
    ///
    /// **Public** - used by the digest builder and history replay
    pub fn open(path: &Path, header: &MetadataHeader) -> Result<Self, DecodeError> {
        debug!("Opening event stream {}", path.display());
        let file = File::open(path)?;
        Ok(Self::from_reader(
            BufReader::new(file),
            header.initial_ms,
            header.sampling.clone(),
        ))
    }
}

impl<R: Read> EventReader<R> {
    pub fn from_reader(source: R, initial_ms: u64, sampling: SamplingConfig) -> Self {
        Self {
            source,
            sampling,
            last_ms: initial_ms,
            done: false,
        }
    }

    fn read_event(&mut self) -> Result<Option<AllocationEvent>, DecodeError> {
        let Some(delta) = read_varint_or_eof(&mut self.source, "event record")? else {
            return Ok(None);
        };
        let trace_id = read_varint(&mut self.source, "event record")?;
        let size = read_zigzag(&mut self.source, "event record")?;
        let scale_factor = self.sampling.checked_scale_factor(size)?;

        self.last_ms = self.last_ms.saturating_add(delta);
        Ok(Some(AllocationEvent {
            timestamp_ms: self.last_ms,
            trace_id,
            size,
            scale_factor,
        }))
    }
}

impl<R: Read> Iterator for EventReader<R> {
    type Item = Result<AllocationEvent, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_event() {
            Ok(Some(event)) => Some(Ok(event)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
