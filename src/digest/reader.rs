//! Random access to the snapshots of a digest file.

use super::format::{read_offsets, DigestHeader, BLOCK_LEN};
use super::snapshot::Snapshot;
use crate::utils::config::DIGEST_FIRST_BLOCK_POSITION;
use crate::utils::error::{ArgumentError, DigestError};
use log::debug;
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::Path;

/// Open digest with its offset table loaded
///
/// **Public** - main entry point for reading digests
#[derive(Debug)]
pub struct DigestReader {
    source: BufReader<File>,
    header: DigestHeader,
    offsets: Vec<u64>,
}

impl DigestReader {
    /// Open `path` and load the committed offset table.
    ///
    /// # Errors
    /// * `DigestError::Unavailable` - the file is missing, is not a digest, or
    ///   its offset table points outside the file. Rebuilding fixes all three.
    pub fn open(path: &Path) -> Result<Self, DigestError> {
        let unavailable =
            |reason: String| DigestError::Unavailable(format!("{}: {}", path.display(), reason));

        let file = File::open(path).map_err(|e| unavailable(e.to_string()))?;
        let file_len = file
            .metadata()
            .map_err(|e| unavailable(e.to_string()))?
            .len();
        let mut source = BufReader::new(file);

        let header = DigestHeader::read(&mut source).map_err(|e| unavailable(e.to_string()))?;
        if header.interval_ms == 0 {
            return Err(unavailable("zero snapshot interval".to_string()));
        }
        // Every committed snapshot owns an 8-byte slot, so a larger count is corrupt
        if header.count.saturating_mul(8) > file_len {
            return Err(unavailable(format!(
                "count {} does not fit in {} bytes",
                header.count, file_len
            )));
        }
        let offsets =
            read_offsets(&mut source, header.count).map_err(|e| unavailable(e.to_string()))?;

        let data_start = DIGEST_FIRST_BLOCK_POSITION + BLOCK_LEN;
        if let Some(bad) = offsets
            .iter()
            .find(|&&offset| offset < data_start || offset >= file_len)
        {
            return Err(unavailable(format!("snapshot offset {} out of range", bad)));
        }

        debug!(
            "Opened digest {} with {} snapshots",
            path.display(),
            offsets.len()
        );
        Ok(Self {
            source,
            header,
            offsets,
        })
    }

    pub fn initial_ms(&self) -> u64 {
        self.header.initial_ms
    }

    pub fn interval_ms(&self) -> u64 {
        self.header.interval_ms
    }

    /// Seconds between snapshots
    pub fn interval(&self) -> f64 {
        self.header.interval_ms as f64 / 1000.0
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Relative time of snapshot `index`
    pub fn relative_time(&self, index: usize) -> f64 {
        (index as u64).saturating_mul(self.header.interval_ms) as f64 / 1000.0
    }

    /// Relative time of the last snapshot, or 0 for an empty digest
    pub fn last_relative_time(&self) -> f64 {
        self.relative_time(self.len().saturating_sub(1))
    }

    /// Index of the snapshot at or before `relative_time`, clamped to the
    /// digest's range. `None` only for an empty digest.
    pub fn index_at(&self, relative_time: f64) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        // Whole millis, so a snapshot's own time never rounds down to its predecessor
        let millis = (relative_time * 1000.0).round();
        let index = if millis.is_nan() || millis <= 0.0 {
            0
        } else {
            (millis as u64 / self.header.interval_ms).min(usize::MAX as u64) as usize
        };
        Some(index.min(self.len() - 1))
    }

    /// Load snapshot `index`
    ///
    /// # Errors
    /// * `DigestError::Argument` - `index` is past the end
    /// * `DigestError::Unavailable` - the record does not parse
    pub fn snapshot(&mut self, index: usize) -> Result<Snapshot, DigestError> {
        let offset = *self.offsets.get(index).ok_or_else(|| {
            ArgumentError::new(format!(
                "snapshot {} requested from a digest of {}",
                index,
                self.offsets.len()
            ))
        })?;

        self.source.seek(SeekFrom::Start(offset))?;
        let relative_time = self.relative_time(index);
        Snapshot::decode(&mut self.source, relative_time)
            .map_err(|e| DigestError::Unavailable(format!("snapshot {}: {}", index, e)))
    }

    /// Load the snapshot at or before `relative_time`
    pub fn snapshot_at(&mut self, relative_time: f64) -> Result<Snapshot, DigestError> {
        let index = self
            .index_at(relative_time)
            .ok_or_else(|| ArgumentError::new("digest has no snapshots"))?;
        self.snapshot(index)
    }
}
