//! Primitive wire encoding shared by the trace and digest formats.
//!
//! This module handles:
//! - Big-endian Fixed32/Fixed64
//! - LEB128-style varints and zig-zag signed varints
//! - Length-prefixed byte strings
//! - Counting how many bytes a reader has consumed

pub mod varint;

use std::io::{self, Read};

pub use varint::{
    put_fixed32, put_fixed64, put_length_prefixed, put_varint, put_zigzag, read_fixed32,
    read_fixed64, read_length_prefixed, read_varint, read_varint_or_eof, read_zigzag,
};

/// Reader adapter that tallies the bytes pulled through it
#[derive(Debug)]
pub struct CountingReader<R> {
    inner: R,
    count: u64,
}

impl<R: Read> CountingReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, count: 0 }
    }

    /// Bytes consumed so far
    pub fn count(&self) -> u64 {
        self.count
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        self.count += read as u64;
        Ok(read)
    }
}
