//! Fixed-width and variable-length integer primitives.
//!
//! Fixed32/Fixed64 are big-endian. Varints are little-endian base-128 with
//! the high bit of each byte flagging continuation. Signed values go through
//! zig-zag first so small negative deltas stay short.

use crate::utils::config::MAX_VARINT_LEN;
use crate::utils::error::DecodeError;
use std::io::{self, ErrorKind, Read};

/// Read a single byte, returning `None` at a clean end of stream
fn read_byte<R: Read>(src: &mut R) -> io::Result<Option<u8>> {
    let mut byte = [0u8; 1];
    loop {
        match src.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

fn read_array<R: Read, const N: usize>(
    src: &mut R,
    context: &'static str,
) -> Result<[u8; N], DecodeError> {
    let mut buf = [0u8; N];
    src.read_exact(&mut buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => DecodeError::TruncatedRead { context },
        _ => DecodeError::Io(e),
    })?;
    Ok(buf)
}

/// Read a big-endian u32
pub fn read_fixed32<R: Read>(src: &mut R, context: &'static str) -> Result<u32, DecodeError> {
    Ok(u32::from_be_bytes(read_array::<R, 4>(src, context)?))
}

/// Read a big-endian u64
pub fn read_fixed64<R: Read>(src: &mut R, context: &'static str) -> Result<u64, DecodeError> {
    Ok(u64::from_be_bytes(read_array::<R, 8>(src, context)?))
}

/// Read a varint that may legitimately be absent.
///
/// Returns `Ok(None)` when the stream is exhausted before the first byte,
/// which is how record readers detect a clean end of stream. Running out of
/// bytes after the first one is a [`DecodeError::TruncatedRead`].
pub fn read_varint_or_eof<R: Read>(
    src: &mut R,
    context: &'static str,
) -> Result<Option<u64>, DecodeError> {
    let mut result = 0u64;
    for index in 0..MAX_VARINT_LEN {
        let byte = match read_byte(src)? {
            Some(byte) => byte,
            None if index == 0 => return Ok(None),
            None => return Err(DecodeError::TruncatedRead { context }),
        };
        // The tenth byte only has room for the top bit of a u64
        if index == MAX_VARINT_LEN - 1 && byte > 1 {
            return Err(DecodeError::VarintOverflow);
        }
        result |= u64::from(byte & 0x7F) << (7 * index);
        if byte & 0x80 == 0 {
            return Ok(Some(result));
        }
    }
    Err(DecodeError::VarintOverflow)
}

/// Read a varint that must be present
pub fn read_varint<R: Read>(src: &mut R, context: &'static str) -> Result<u64, DecodeError> {
    read_varint_or_eof(src, context)?.ok_or(DecodeError::TruncatedRead { context })
}

/// Read a zig-zag encoded signed varint
pub fn read_zigzag<R: Read>(src: &mut R, context: &'static str) -> Result<i64, DecodeError> {
    Ok(zigzag_decode(read_varint(src, context)?))
}

/// Read a varint length followed by that many bytes
pub fn read_length_prefixed<R: Read>(
    src: &mut R,
    context: &'static str,
) -> Result<Vec<u8>, DecodeError> {
    let len = read_varint(src, context)?;
    let mut bytes = Vec::new();
    let read = src.by_ref().take(len).read_to_end(&mut bytes)?;
    if (read as u64) < len {
        return Err(DecodeError::TruncatedRead { context });
    }
    Ok(bytes)
}

pub fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

pub fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

pub fn put_fixed32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_be_bytes());
}

pub fn put_fixed64(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_be_bytes());
}

pub fn put_varint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

pub fn put_zigzag(buf: &mut Vec<u8>, value: i64) {
    put_varint(buf, zigzag_encode(value));
}

pub fn put_length_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) {
    put_varint(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn varint_bytes(value: u64) -> Vec<u8> {
        let mut buf = Vec::new();
        put_varint(&mut buf, value);
        buf
    }

    #[test]
    fn test_varint_known_encodings() {
        assert_eq!(varint_bytes(0), vec![0x00]);
        assert_eq!(varint_bytes(1), vec![0x01]);
        assert_eq!(varint_bytes(127), vec![0x7F]);
        assert_eq!(varint_bytes(128), vec![0x80, 0x01]);
        assert_eq!(varint_bytes(300), vec![0xAC, 0x02]);
        assert_eq!(varint_bytes(u64::MAX).len(), MAX_VARINT_LEN);
    }

    #[test]
    fn test_varint_max_value_decodes() {
        let mut src = Cursor::new(varint_bytes(u64::MAX));
        assert_eq!(read_varint(&mut src, "test").unwrap(), u64::MAX);
    }

    #[test]
    fn test_varint_clean_eof_is_none() {
        let mut src = Cursor::new(Vec::<u8>::new());
        assert!(read_varint_or_eof(&mut src, "test").unwrap().is_none());
    }

    #[test]
    fn test_varint_truncated_mid_value() {
        let mut src = Cursor::new(vec![0x80u8, 0x80]);
        assert!(matches!(
            read_varint_or_eof(&mut src, "test"),
            Err(DecodeError::TruncatedRead { .. })
        ));
    }

    #[test]
    fn test_varint_overflow() {
        let mut src = Cursor::new(vec![0xFFu8; 11]);
        assert!(matches!(
            read_varint(&mut src, "test"),
            Err(DecodeError::VarintOverflow)
        ));
    }

    #[test]
    fn test_fixed_width_is_big_endian() {
        let mut buf = Vec::new();
        put_fixed32(&mut buf, 0x0102_0304);
        put_fixed64(&mut buf, 0x0102_0304_0506_0708);
        assert_eq!(&buf[..4], &[1, 2, 3, 4]);

        let mut src = Cursor::new(buf);
        assert_eq!(read_fixed32(&mut src, "test").unwrap(), 0x0102_0304);
        assert_eq!(read_fixed64(&mut src, "test").unwrap(), 0x0102_0304_0506_0708);
    }

    #[test]
    fn test_fixed_truncated() {
        let mut src = Cursor::new(vec![0u8; 3]);
        assert!(matches!(
            read_fixed32(&mut src, "test"),
            Err(DecodeError::TruncatedRead { .. })
        ));
        let mut src = Cursor::new(vec![0u8; 7]);
        assert!(matches!(
            read_fixed64(&mut src, "test"),
            Err(DecodeError::TruncatedRead { .. })
        ));
    }

    #[test]
    fn test_zigzag_keeps_small_magnitudes_small() {
        assert_eq!(zigzag_encode(0), 0);
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
        assert_eq!(zigzag_encode(-2), 3);
        for value in [i64::MIN, -100, -1, 0, 1, 100, i64::MAX] {
            assert_eq!(zigzag_decode(zigzag_encode(value)), value);
        }
    }

    #[test]
    fn test_length_prefixed_truncated() {
        let mut buf = Vec::new();
        put_varint(&mut buf, 10);
        buf.extend_from_slice(b"abc");
        let mut src = Cursor::new(buf);
        assert!(matches!(
            read_length_prefixed(&mut src, "test"),
            Err(DecodeError::TruncatedRead { .. })
        ));
    }
}
