//! On-disk layout of the digest file.
//!
//! ```text
//! 0   magic "HPDG"
//! 4   fixed64 initial time (ms)
//! 12  fixed64 interval (ms)
//! 20  fixed64 committed snapshot count
//! 28  offset block: fixed64 next block position (0 = none), 512 fixed64 slots
//! ... snapshot records and further offset blocks, in append order
//! ```
//!
//! A snapshot is committed by writing its record, then its offset slot, then
//! the count word. A reader trusts only the first `count` slots, so a file
//! cut off at any point between commits is still a complete digest.

use crate::codec::{put_fixed64, read_fixed64};
use crate::utils::config::{
    DIGEST_COUNT_POSITION, DIGEST_FIRST_BLOCK_POSITION, DIGEST_MAGIC, OFFSETS_PER_BLOCK,
};
use crate::utils::error::DecodeError;
use log::debug;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Size of one offset block in bytes
pub const BLOCK_LEN: u64 = 8 + 8 * OFFSETS_PER_BLOCK as u64;

/// Fixed fields at the start of a digest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigestHeader {
    pub initial_ms: u64,
    pub interval_ms: u64,
    pub count: u64,
}

impl DigestHeader {
    pub fn read<R: Read>(src: &mut R) -> Result<Self, DecodeError> {
        let mut magic = [0u8; 4];
        src.read_exact(&mut magic)
            .map_err(|_| DecodeError::TruncatedRead { context: "digest magic" })?;
        if &magic != DIGEST_MAGIC {
            return Err(DecodeError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                "not a digest file",
            )));
        }
        Ok(Self {
            initial_ms: read_fixed64(src, "digest header")?,
            interval_ms: read_fixed64(src, "digest header")?,
            count: read_fixed64(src, "digest header")?,
        })
    }
}

/// Append-only writer that keeps the file a valid digest after every commit
///
/// **Public** - used by the digest builder
#[derive(Debug)]
pub struct DigestWriter {
    file: File,
    blocks: Vec<u64>,
    count: u64,
    end: u64,
    last_record: Option<u64>,
}

impl DigestWriter {
    /// Create (or truncate) `path` and write an empty digest
    pub fn create(path: &Path, initial_ms: u64, interval_ms: u64) -> io::Result<Self> {
        let mut file = File::create(path)?;

        let mut buf = Vec::with_capacity((DIGEST_FIRST_BLOCK_POSITION + BLOCK_LEN) as usize);
        buf.extend_from_slice(DIGEST_MAGIC);
        put_fixed64(&mut buf, initial_ms);
        put_fixed64(&mut buf, interval_ms);
        put_fixed64(&mut buf, 0);
        buf.resize((DIGEST_FIRST_BLOCK_POSITION + BLOCK_LEN) as usize, 0);
        file.write_all(&buf)?;

        debug!("Created digest {}", path.display());
        Ok(Self {
            file,
            blocks: vec![DIGEST_FIRST_BLOCK_POSITION],
            count: 0,
            end: buf.len() as u64,
            last_record: None,
        })
    }

    /// Number of committed snapshots
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Current file length
    pub fn len(&self) -> u64 {
        self.end
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Append an encoded snapshot record and commit it
    pub fn append(&mut self, record: &[u8]) -> io::Result<()> {
        let offset = self.end;
        self.write_at(offset, record)?;
        self.end += record.len() as u64;
        self.last_record = Some(offset);
        self.commit(offset)
    }

    /// Commit another snapshot that reuses the previous record.
    ///
    /// Returns `false` if nothing has been appended yet.
    pub fn repeat_last(&mut self) -> io::Result<bool> {
        match self.last_record {
            Some(offset) => self.commit(offset).map(|_| true),
            None => Ok(false),
        }
    }

    /// Flush everything to stable storage
    pub fn finish(self) -> io::Result<u64> {
        self.file.sync_data()?;
        Ok(self.count)
    }

    fn commit(&mut self, offset: u64) -> io::Result<()> {
        let block = (self.count / OFFSETS_PER_BLOCK as u64) as usize;
        let slot = self.count % OFFSETS_PER_BLOCK as u64;

        if block == self.blocks.len() {
            let position = self.end;
            self.write_at(position, &vec![0u8; BLOCK_LEN as usize])?;
            self.end += BLOCK_LEN;
            let previous = self.blocks[self.blocks.len() - 1];
            self.write_at(previous, &position.to_be_bytes())?;
            self.blocks.push(position);
        }

        self.write_at(self.blocks[block] + 8 + 8 * slot, &offset.to_be_bytes())?;
        self.write_at(DIGEST_COUNT_POSITION, &(self.count + 1).to_be_bytes())?;
        self.count += 1;
        Ok(())
    }

    fn write_at(&mut self, position: u64, bytes: &[u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(position))?;
        self.file.write_all(bytes)
    }
}

/// Read the first `count` record offsets by walking the block chain
pub fn read_offsets<R: Read + Seek>(src: &mut R, count: u64) -> Result<Vec<u64>, DecodeError> {
    let mut offsets = Vec::with_capacity(count.min(1 << 20) as usize);
    let mut block = DIGEST_FIRST_BLOCK_POSITION;

    while (offsets.len() as u64) < count {
        if block == 0 {
            return Err(DecodeError::TruncatedRead { context: "digest offset chain" });
        }
        src.seek(SeekFrom::Start(block))?;
        let next = read_fixed64(src, "digest offset block")?;
        let wanted = (count - offsets.len() as u64).min(OFFSETS_PER_BLOCK as u64);
        for _ in 0..wanted {
            offsets.push(read_fixed64(src, "digest offset block")?);
        }
        block = next;
    }
    Ok(offsets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    #[test]
    fn test_offsets_span_blocks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.hpc");
        let mut writer = DigestWriter::create(&path, 5, 10).unwrap();

        let total = OFFSETS_PER_BLOCK as u64 + 3;
        for i in 0..total {
            if i % 2 == 1 {
                assert!(writer.repeat_last().unwrap());
            } else {
                writer.append(&[1, 1, (i % 100) as u8]).unwrap();
            }
        }
        assert_eq!(writer.finish().unwrap(), total);

        let bytes = std::fs::read(&path).unwrap();
        let mut src = Cursor::new(bytes);
        let header = DigestHeader::read(&mut src).unwrap();
        assert_eq!(header, DigestHeader { initial_ms: 5, interval_ms: 10, count: total });

        let offsets = read_offsets(&mut src, header.count).unwrap();
        assert_eq!(offsets.len() as u64, total);
        assert_eq!(offsets[0], DIGEST_FIRST_BLOCK_POSITION + BLOCK_LEN);
        assert_eq!(offsets[0], offsets[1]);
        assert_ne!(offsets[1], offsets[2]);
    }

    #[test]
    fn test_repeat_without_record() {
        let dir = tempdir().unwrap();
        let mut writer = DigestWriter::create(&dir.path().join("t.hpc"), 0, 1).unwrap();
        assert!(!writer.repeat_last().unwrap());
        assert!(writer.is_empty());
    }

    #[test]
    fn test_bad_magic() {
        let mut src = Cursor::new(b"NOPE0000000000000000000000000000".to_vec());
        assert!(DigestHeader::read(&mut src).is_err());
    }
}
