//! Bit-level input for the BZip2 stream format.
//!
//! BZip2 packs its fields MSB-first: the first bit of the stream is the most
//! significant bit of the first byte, and multi-bit fields are read with
//! their high bit first. This is the opposite ordering from DEFLATE-family
//! formats.
//!
//! [`BitReader`] keeps a 64-bit accumulator and a count of live bits. It
//! refills one source byte at a time so that [`BitReader::bytes_consumed`]
//! is always the exact number of bytes the decoder has logically taken from
//! the source — split-aware readers derive compressed-stream positions from
//! that count, so speculative multi-byte refills are not an option here.
//! Callers that want fewer syscalls wrap the source in a `BufReader`.
//!
//! # Example
//!
//! ```
//! use bzsplit_core::bitstream::BitReader;
//! use std::io::Cursor;
//!
//! let mut reader = BitReader::new(Cursor::new(vec![0xB5, 0x01]));
//! assert_eq!(reader.read_bits(4).unwrap(), 0xB);
//! assert_eq!(reader.read_bits(4).unwrap(), 0x5);
//! assert_eq!(reader.bytes_consumed(), 1);
//! ```

use crate::error::{BzError, Result};
use std::io::{ErrorKind, Read};

/// Largest bit count a single [`BitReader::read_bits`] call accepts.
///
/// 48 covers the widest field in the stream (the block and end-of-stream
/// markers); with at most 47 live bits before a refill, the next byte always
/// fits in the 64-bit accumulator.
pub const MAX_READ_BITS: u32 = 48;

/// An MSB-first bit reader over any `Read` implementation.
#[derive(Debug)]
pub struct BitReader<R> {
    /// Underlying reader.
    inner: R,
    /// Bit accumulator; the next bit to emit is bit `live - 1`.
    buf: u64,
    /// Number of valid low bits in `buf`.
    live: u32,
    /// Bytes pulled from `inner` so far.
    consumed: u64,
}

impl<R: Read> BitReader<R> {
    /// Create a new `BitReader` wrapping the given reader.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: 0,
            live: 0,
            consumed: 0,
        }
    }

    /// Get a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Consume this `BitReader` and return the underlying reader.
    ///
    /// Buffered bits are discarded.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Number of bytes pulled from the source so far.
    pub fn bytes_consumed(&self) -> u64 {
        self.consumed
    }

    /// Number of bits already pulled from the source but not yet read.
    pub fn live_bits(&self) -> u32 {
        self.live
    }

    /// Pull one byte from the source into the accumulator.
    #[inline]
    fn fill_byte(&mut self) -> Result<()> {
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => return Err(BzError::UnexpectedEof),
                Ok(_) => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.buf = (self.buf << 8) | u64::from(byte[0]);
        self.live += 8;
        self.consumed += 1;
        Ok(())
    }

    /// Read `count` bits (1..=48), MSB-first.
    ///
    /// Fails with [`BzError::UnexpectedEof`] if the source ends while more
    /// bits are required.
    #[inline]
    pub fn read_bits(&mut self, count: u32) -> Result<u64> {
        debug_assert!(count >= 1 && count <= MAX_READ_BITS);

        while self.live < count {
            self.fill_byte()?;
        }

        self.live -= count;
        Ok((self.buf >> self.live) & ((1u64 << count) - 1))
    }

    /// Read a single bit.
    #[inline]
    pub fn read_bit(&mut self) -> Result<bool> {
        Ok(self.read_bits(1)? != 0)
    }

    /// Read eight bits as a byte value.
    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bits(8)? as u8)
    }

    /// Read a big-endian 32-bit integer.
    #[inline]
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(self.read_bits(32)? as u32)
    }

    /// Discard buffered bits up to the next byte boundary of the source.
    ///
    /// A BZip2 member is padded to a whole byte after its combined CRC;
    /// this drops that padding before the next member's magic is read.
    pub fn align_to_byte(&mut self) {
        self.live -= self.live % 8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_msb_first_single_bits() {
        // 0b10110101
        let mut reader = BitReader::new(Cursor::new(vec![0xB5]));
        let expect = [1, 0, 1, 1, 0, 1, 0, 1];
        for bit in expect {
            assert_eq!(reader.read_bits(1).unwrap(), bit);
        }
    }

    #[test]
    fn test_multi_byte_field() {
        let mut reader = BitReader::new(Cursor::new(vec![0xFF, 0x00, 0xAB]));
        assert_eq!(reader.read_bits(4).unwrap(), 0xF);
        // crosses the first byte boundary
        assert_eq!(reader.read_bits(8).unwrap(), 0xF0);
        assert_eq!(reader.read_bits(12).unwrap(), 0x0AB);
    }

    #[test]
    fn test_wide_field() {
        let data = vec![0x31, 0x41, 0x59, 0x26, 0x53, 0x59, 0x80];
        let mut reader = BitReader::new(Cursor::new(data));
        assert_eq!(reader.read_bits(48).unwrap(), 0x314159265359);
        assert!(reader.read_bit().unwrap());
    }

    #[test]
    fn test_unaligned_wide_field() {
        // one leading bit, then the 48-bit marker
        let value: u64 = 0x314159265359;
        let shifted = (1u64 << 48) | value; // 49 bits: '1' + marker
        let mut bytes = Vec::new();
        let padded = shifted << 7; // 56 bits total
        for i in (0..7).rev() {
            bytes.push(((padded >> (8 * i)) & 0xFF) as u8);
        }
        let mut reader = BitReader::new(Cursor::new(bytes));
        assert!(reader.read_bit().unwrap());
        assert_eq!(reader.read_bits(48).unwrap(), value);
    }

    #[test]
    fn test_read_u8_u32() {
        let mut reader = BitReader::new(Cursor::new(vec![0x12, 0x34, 0x56, 0x78, 0x9A]));
        assert_eq!(reader.read_u8().unwrap(), 0x12);
        assert_eq!(reader.read_u32().unwrap(), 0x3456789A);
    }

    #[test]
    fn test_bytes_consumed_tracks_refills_only() {
        let mut reader = BitReader::new(Cursor::new(vec![0xAA, 0xBB, 0xCC]));
        assert_eq!(reader.bytes_consumed(), 0);
        reader.read_bits(3).unwrap();
        assert_eq!(reader.bytes_consumed(), 1);
        assert_eq!(reader.live_bits(), 5);
        reader.read_bits(12).unwrap();
        assert_eq!(reader.bytes_consumed(), 2);
        assert_eq!(reader.live_bits(), 1);
    }

    #[test]
    fn test_align_to_byte() {
        let mut reader = BitReader::new(Cursor::new(vec![0xFF, 0xAA]));
        reader.read_bits(3).unwrap();
        reader.align_to_byte();
        assert_eq!(reader.read_u8().unwrap(), 0xAA);
    }

    #[test]
    fn test_eof_mid_field() {
        let mut reader = BitReader::new(Cursor::new(vec![0xFF]));
        reader.read_bits(6).unwrap();
        // 2 live bits left, asking for 8 must fail
        assert!(matches!(
            reader.read_bits(8),
            Err(BzError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_eof_on_empty() {
        let mut reader = BitReader::new(Cursor::new(Vec::<u8>::new()));
        assert!(matches!(reader.read_bit(), Err(BzError::UnexpectedEof)));
    }
}
