//! Metadata stream decoding and the lazily-filled stack store.
//!
//! The metadata stream starts with a header (initial timestamp and sampling
//! configuration) and continues with one record per distinct call stack.
//! The sampler appends stacks as it first sees them, so trace id `n` is the
//! `n`-th record. Stacks are stored allocation-site first.

use super::sampling::{decode_probability, SamplingConfig};
use super::schema::{CallStack, SourceLocation, TraceId, UNKNOWN_TRACE};
use crate::codec::{
    read_fixed32, read_fixed64, read_length_prefixed, read_varint, read_varint_or_eof,
    CountingReader,
};
use crate::utils::error::DecodeError;
use log::{debug, warn};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Decoded metadata header
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataHeader {
    /// Milliseconds since the epoch at which tracing started
    pub initial_ms: u64,
    pub sampling: SamplingConfig,
}

impl MetadataHeader {
    /// Initial time in seconds since the epoch
    pub fn initial_time(&self) -> f64 {
        self.initial_ms as f64 / 1000.0
    }
}

/// Read the header at the start of a metadata stream
///
/// # Errors
/// * `DecodeError::TruncatedRead` - the stream ends inside the header
/// * `DecodeError::InvalidHeader` - the stored sampling configuration is invalid
pub fn read_header<R: Read>(src: &mut R) -> Result<MetadataHeader, DecodeError> {
    let initial_ms = read_fixed64(src, "metadata header")?;
    let count = read_varint(src, "metadata header")?;

    let mut ranges = Vec::new();
    for _ in 0..count {
        let upper_bound = read_fixed32(src, "sampling range")?;
        let probability = decode_probability(read_fixed64(src, "sampling range")?);
        ranges.push((upper_bound, probability));
    }

    Ok(MetadataHeader {
        initial_ms,
        sampling: SamplingConfig::new(ranges)?,
    })
}

/// Read one stack record, returning `None` at a clean end of stream.
///
/// The returned stack is root first.
pub fn read_stack<R: Read>(src: &mut R) -> Result<Option<CallStack>, DecodeError> {
    let Some(frame_count) = read_varint_or_eof(src, "stack record")? else {
        return Ok(None);
    };

    let mut stack = CallStack::new();
    for _ in 0..frame_count {
        let file = read_length_prefixed(src, "stack frame")?;
        let line = read_varint(src, "stack frame")?;
        stack.push(SourceLocation::new(
            String::from_utf8_lossy(&file).into_owned(),
            line,
        ));
    }
    stack.reverse();
    Ok(Some(stack))
}

/// Anything that can map a trace id to its call stack.
///
/// Graph construction is written against this trait so it can run over an
/// on-disk [`TraceStore`] or an in-memory table.
pub trait StackResolver {
    /// Look up a stack. `Ok(None)` means the id is unknown, which is not an error.
    fn resolve(&mut self, trace_id: TraceId) -> Result<Option<&CallStack>, DecodeError>;
}

impl StackResolver for HashMap<TraceId, CallStack> {
    fn resolve(&mut self, trace_id: TraceId) -> Result<Option<&CallStack>, DecodeError> {
        Ok(self.get(&trace_id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum StreamState {
    Open,
    Exhausted,
    /// A record was cut short; everything after it is unreadable
    Failed { context: &'static str },
}

/// Stack store backed by a metadata stream.
///
/// Stacks are decoded on demand and kept forever, so each record is parsed
/// at most once no matter how many graphs are built from the same trace.
/// The underlying reader is owned by the store and released when it drops.
#[derive(Debug)]
pub struct TraceStore<R = BufReader<File>> {
    header: MetadataHeader,
    source: CountingReader<R>,
    stacks: Vec<CallStack>,
    state: StreamState,
}

impl TraceStore {
    /// Open a metadata file and decode its header
    ///
    /// **Public** - main entry point for stack resolution
    ///
    /// # Errors
    /// * `DecodeError::Io` - the file cannot be opened
    /// * `DecodeError::TruncatedRead` / `InvalidHeader` - the header is unreadable
    pub fn open(path: &Path) -> Result<Self, DecodeError> {
        debug!("Opening metadata stream {}", path.display());
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }
}

impl<R: Read> TraceStore<R> {
    pub fn from_reader(reader: R) -> Result<Self, DecodeError> {
        let mut source = CountingReader::new(reader);
        let header = read_header(&mut source)?;
        Ok(Self {
            header,
            source,
            stacks: Vec::new(),
            state: StreamState::Open,
        })
    }

    pub fn header(&self) -> &MetadataHeader {
        &self.header
    }

    pub fn sampling_config(&self) -> &SamplingConfig {
        &self.header.sampling
    }

    /// Bytes of the metadata stream consumed so far, header included
    pub fn raw_bytes_seen(&self) -> u64 {
        self.source.count()
    }

    /// Number of stacks decoded so far
    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    /// Whether the whole stream has been decoded
    pub fn is_exhausted(&self) -> bool {
        self.state == StreamState::Exhausted
    }

    /// Decoded stacks paired with their ids, in id order
    pub fn stacks(&self) -> impl Iterator<Item = (TraceId, &CallStack)> {
        self.stacks
            .iter()
            .enumerate()
            .map(|(index, stack)| (index as TraceId + 1, stack))
    }

    /// Decode every remaining stack
    pub fn warm_cache(&mut self) -> Result<(), DecodeError> {
        while self.decode_next()? {}
        debug!(
            "Decoded {} stacks from {} metadata bytes",
            self.stacks.len(),
            self.raw_bytes_seen()
        );
        Ok(())
    }

    /// Resolve `trace_id`, decoding forward through the stream as needed.
    ///
    /// Id 0 and ids past the end of a fully-read stream resolve to `None`.
    ///
    /// # Errors
    /// * `DecodeError::TruncatedRead` - a record needed for this id is incomplete.
    ///   Later calls that need to read past that point fail the same way.
    pub fn resolve(&mut self, trace_id: TraceId) -> Result<Option<&CallStack>, DecodeError> {
        if trace_id == UNKNOWN_TRACE {
            return Ok(None);
        }
        let index = usize::try_from(trace_id - 1).unwrap_or(usize::MAX);
        while self.stacks.len() <= index {
            if !self.decode_next()? {
                break;
            }
        }
        Ok(self.stacks.get(index))
    }

    /// Decode one more stack into the cache. Returns `false` once the stream is exhausted.
    fn decode_next(&mut self) -> Result<bool, DecodeError> {
        match self.state {
            StreamState::Exhausted => return Ok(false),
            StreamState::Failed { context } => return Err(DecodeError::TruncatedRead { context }),
            StreamState::Open => {}
        }

        match read_stack(&mut self.source) {
            Ok(Some(stack)) => {
                self.stacks.push(stack);
                Ok(true)
            }
            Ok(None) => {
                self.state = StreamState::Exhausted;
                Ok(false)
            }
            Err(DecodeError::TruncatedRead { context }) => {
                warn!(
                    "Metadata stream truncated after {} stacks ({} bytes)",
                    self.stacks.len(),
                    self.raw_bytes_seen()
                );
                self.state = StreamState::Failed { context };
                Err(DecodeError::TruncatedRead { context })
            }
            Err(e) => Err(e),
        }
    }
}

impl<R: Read> StackResolver for TraceStore<R> {
    fn resolve(&mut self, trace_id: TraceId) -> Result<Option<&CallStack>, DecodeError> {
        TraceStore::resolve(self, trace_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::writer::MetadataWriter;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn loc(file: &str, line: u64) -> SourceLocation {
        SourceLocation::new(file, line)
    }

    fn sample_stream() -> Vec<u8> {
        let sampling = SamplingConfig::new([(128, 0.5)]).unwrap();
        let mut writer = MetadataWriter::new(Vec::new(), 1_000, &sampling).unwrap();
        writer.write_stack(&[loc("main.py", 1), loc("lib.py", 7)]).unwrap();
        writer.write_stack(&[loc("main.py", 2)]).unwrap();
        writer.finish().unwrap()
    }

    #[test]
    fn test_header_decodes() {
        let store = TraceStore::from_reader(Cursor::new(sample_stream())).unwrap();
        assert_eq!(store.header().initial_ms, 1_000);
        assert_eq!(store.sampling_config().scale_factor(10), 2.0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_resolve_is_lazy_and_root_first() {
        let mut store = TraceStore::from_reader(Cursor::new(sample_stream())).unwrap();
        let header_bytes = store.raw_bytes_seen();

        let stack = store.resolve(1).unwrap().cloned();
        assert_eq!(stack, Some(vec![loc("main.py", 1), loc("lib.py", 7)]));
        assert_eq!(store.len(), 1);
        assert!(store.raw_bytes_seen() > header_bytes);

        assert_eq!(store.resolve(2).unwrap().cloned(), Some(vec![loc("main.py", 2)]));
        assert!(!store.is_exhausted());
    }

    #[test]
    fn test_unknown_ids_resolve_to_none() {
        let mut store = TraceStore::from_reader(Cursor::new(sample_stream())).unwrap();
        assert_eq!(store.resolve(0).unwrap(), None);
        assert_eq!(store.resolve(3).unwrap(), None);
        assert!(store.is_exhausted());
        // Cached ids keep resolving after exhaustion
        assert!(store.resolve(1).unwrap().is_some());
    }

    #[test]
    fn test_warm_cache_decodes_everything() {
        let mut store = TraceStore::from_reader(Cursor::new(sample_stream())).unwrap();
        store.warm_cache().unwrap();
        assert_eq!(store.len(), 2);
        let ids: Vec<TraceId> = store.stacks().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_truncated_record_is_sticky() {
        let mut bytes = sample_stream();
        bytes.pop();
        let mut store = TraceStore::from_reader(Cursor::new(bytes)).unwrap();

        assert!(store.resolve(1).unwrap().is_some());
        assert!(matches!(
            store.resolve(2),
            Err(DecodeError::TruncatedRead { .. })
        ));
        assert!(matches!(
            store.warm_cache(),
            Err(DecodeError::TruncatedRead { .. })
        ));
        assert!(store.resolve(1).unwrap().is_some());
    }

    #[test]
    fn test_truncated_header() {
        let bytes = sample_stream()[..5].to_vec();
        assert!(matches!(
            TraceStore::from_reader(Cursor::new(bytes)),
            Err(DecodeError::TruncatedRead { .. })
        ));
    }

    #[test]
    fn test_hash_map_resolver() {
        let mut table: HashMap<TraceId, CallStack> = HashMap::new();
        table.insert(4, vec![loc("a.py", 1)]);
        assert!(StackResolver::resolve(&mut table, 4).unwrap().is_some());
        assert!(StackResolver::resolve(&mut table, 5).unwrap().is_none());
    }
}
