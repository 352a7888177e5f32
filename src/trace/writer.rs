//! Encoders for the metadata and event streams.
//!
//! The profiler that produces traces lives outside this crate; these writers
//! emit the same layout so traces can be synthesized for tests and tooling.

use super::sampling::{encode_probability, SamplingConfig};
use super::schema::{SourceLocation, TraceId};
use crate::codec::{put_fixed32, put_fixed64, put_length_prefixed, put_varint, put_zigzag};
use std::io::{self, Write};

/// Writes a metadata stream: header first, then one record per stack
pub struct MetadataWriter<W: Write> {
    out: W,
    next_id: TraceId,
    buf: Vec<u8>,
}

impl<W: Write> MetadataWriter<W> {
    /// Write the header and return a writer positioned for the first stack
    pub fn new(mut out: W, initial_ms: u64, sampling: &SamplingConfig) -> io::Result<Self> {
        let mut buf = Vec::new();
        put_fixed64(&mut buf, initial_ms);
        put_varint(&mut buf, sampling.ranges().len() as u64);
        for range in sampling.ranges() {
            put_fixed32(&mut buf, range.upper_bound);
            put_fixed64(&mut buf, encode_probability(range.probability));
        }
        out.write_all(&buf)?;

        Ok(Self {
            out,
            next_id: 1,
            buf,
        })
    }

    /// Append a root-first stack and return the id it was assigned
    pub fn write_stack(&mut self, stack: &[SourceLocation]) -> io::Result<TraceId> {
        self.buf.clear();
        put_varint(&mut self.buf, stack.len() as u64);
        for frame in stack.iter().rev() {
            put_length_prefixed(&mut self.buf, frame.file.as_bytes());
            put_varint(&mut self.buf, frame.line);
        }
        self.out.write_all(&self.buf)?;

        let id = self.next_id;
        self.next_id += 1;
        Ok(id)
    }

    /// Flush and hand back the underlying writer
    pub fn finish(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Writes an event stream as timestamp deltas from the metadata header's
/// initial time
pub struct EventWriter<W: Write> {
    out: W,
    last_ms: u64,
    buf: Vec<u8>,
}

impl<W: Write> EventWriter<W> {
    pub fn new(out: W, initial_ms: u64) -> Self {
        Self {
            out,
            last_ms: initial_ms,
            buf: Vec::with_capacity(32),
        }
    }

    /// Append one event.
    ///
    /// # Errors
    /// * `InvalidInput` - `timestamp_ms` is earlier than the previous event;
    ///   deltas are unsigned so time can only move forward
    pub fn write_event(
        &mut self,
        timestamp_ms: u64,
        trace_id: TraceId,
        size: i64,
    ) -> io::Result<()> {
        let delta = timestamp_ms.checked_sub(self.last_ms).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "event at {}ms precedes the previous event at {}ms",
                    timestamp_ms, self.last_ms
                ),
            )
        })?;

        self.buf.clear();
        put_varint(&mut self.buf, delta);
        put_varint(&mut self.buf, trace_id);
        put_zigzag(&mut self.buf, size);
        self.out.write_all(&self.buf)?;
        self.last_ms = timestamp_ms;
        Ok(())
    }

    pub fn finish(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_written_leaf_first() {
        let mut writer = MetadataWriter::new(Vec::new(), 0, &SamplingConfig::always()).unwrap();
        let id = writer
            .write_stack(&[SourceLocation::new("a", 1), SourceLocation::new("b", 2)])
            .unwrap();
        assert_eq!(id, 1);
        let bytes = writer.finish().unwrap();

        // fixed64 time, zero ranges, then: 2 frames, "b" line 2, "a" line 1
        assert_eq!(&bytes[9..], &[2, 1, b'b', 2, 1, b'a', 1]);
    }

    #[test]
    fn test_events_rejects_time_going_backwards() {
        let mut writer = EventWriter::new(Vec::new(), 100);
        writer.write_event(150, 1, -3).unwrap();
        let err = writer.write_event(149, 1, 3).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(writer.finish().unwrap(), vec![50, 1, 5]);
    }
}
