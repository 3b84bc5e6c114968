//! The top-level decoder: stream framing, the per-byte output state
//! machine, CRC enforcement, and block-boundary position reporting.
//!
//! A [`BzDecoder`] runs in one of two modes. [`ReadMode::Continuous`]
//! decodes an ordinary stream front to back — stream header, blocks,
//! end-of-stream footer — and keeps going across concatenated members.
//! [`ReadMode::ByBlock`] instead hunts for the next 48-bit block marker,
//! decodes exactly one block, and then reports where in the compressed
//! source the following block begins; split-based readers use that to
//! decide whether the next block still falls inside their assigned range.

use crate::block::Block;
use crate::ibwt::{self, Cursor};
use crate::scan::{ScanOutcome, scan_for_any};
use crate::{BLOCK_MAGIC, EOS_MAGIC, MARKER_BITS};
use bzsplit_core::bitstream::BitReader;
use bzsplit_core::crc::Crc32;
use bzsplit_core::error::{BzError, Result};
use std::io::{self, Read};

/// How the decoder positions itself in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Decode a whole stream (header, blocks, footer), concatenated
    /// members included. Reads never yield [`ReadEvent::BlockEnd`].
    Continuous,
    /// Resynchronize to block markers and surface every block boundary
    /// together with its compressed-stream position.
    ByBlock,
}

/// Outcome of a single-byte read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEvent {
    /// One decompressed byte.
    Byte(u8),
    /// A block finished (by-block mode only); the reported position now
    /// points at the next block marker, or at the end-of-stream marker
    /// when no block follows.
    BlockEnd,
    /// No more data; repeats on further reads.
    StreamEnd,
}

/// Outcome of a bulk read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// This many bytes were written into the buffer.
    Read(usize),
    /// The current block ended before any byte could be produced
    /// (by-block mode only).
    BlockEnd,
    /// No more data.
    StreamEnd,
}

/// Compressed-source positions as a split reader sees them.
///
/// `reported` only moves at block boundaries (set from marker-scan
/// results), never mid-block; `base` accounts for bytes the caller
/// consumed before handing the stream over (the stripped `BZ` magic).
#[derive(Debug, Default)]
struct PositionTracker {
    reported: u64,
    base: u64,
}

impl PositionTracker {
    fn advance_to(&mut self, offset: u64) {
        if offset > self.reported {
            self.reported = offset;
        }
    }

    fn adjust(&mut self, n: u64) {
        self.base += n;
    }

    fn get(&self) -> u64 {
        self.base + self.reported
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Parse the next block (or stream footer).
    StartBlock,
    /// Emit the next literal byte of the walk.
    EmitByte,
    /// Decide whether the just-emitted byte closed a run of four.
    CheckRun,
    /// Emit one pending run-tail byte per call.
    EmitTail,
    /// Terminal; reads return [`ReadEvent::StreamEnd`].
    Eof,
}

/// A streaming BZip2 decoder.
///
/// The caller is expected to have stripped the two `BZ` magic bytes; call
/// [`BzDecoder::adjust_reported_bytes`] with their count if reported
/// positions should include them. The decoder owns its block buffers
/// (about 4.5 MB once a maximum-size block has been seen), reuses them
/// across blocks, and frees them on [`BzDecoder::close`].
#[derive(Debug)]
pub struct BzDecoder<R> {
    bits: BitReader<R>,
    mode: ReadMode,
    state: State,
    closed: bool,
    /// Uncompressed block size limit in 100k units, from the stream header.
    /// By-block mode parses no header and guards at the format maximum.
    block_size_100k: usize,
    block: Block,
    cursor: Cursor,
    block_crc: Crc32,
    combined_crc: u32,
    position: PositionTracker,
    pending: Option<ReadEvent>,
}

impl<R: Read> BzDecoder<R> {
    /// Create a decoder over a byte source positioned after the `BZ` magic.
    ///
    /// In continuous mode this parses the `h` + block-size header and fails
    /// with [`BzError::BadStreamHeader`] if it is absent. In by-block mode
    /// it scans forward to the first block marker; a source with no marker
    /// yields a decoder whose first read returns [`ReadEvent::StreamEnd`].
    pub fn new(inner: R, mode: ReadMode) -> Result<Self> {
        let mut decoder = Self {
            bits: BitReader::new(inner),
            mode,
            state: State::StartBlock,
            closed: false,
            block_size_100k: 9,
            block: Block::new(),
            cursor: Cursor::new(),
            block_crc: Crc32::new(),
            combined_crc: 0,
            position: PositionTracker::default(),
            pending: None,
        };
        match mode {
            ReadMode::Continuous => decoder.read_stream_header()?,
            ReadMode::ByBlock => {
                if !decoder.resync()? {
                    decoder.state = State::Eof;
                }
            }
        }
        Ok(decoder)
    }

    /// Read one byte, or a block/stream boundary event.
    ///
    /// Any error is fatal: the decoder moves to its terminal state and
    /// subsequent reads return [`ReadEvent::StreamEnd`]. Bytes already
    /// handed out are never rolled back.
    pub fn read_byte(&mut self) -> Result<ReadEvent> {
        if self.closed {
            return Err(BzError::invalid_argument("decoder used after close"));
        }
        if let Some(event) = self.pending.take() {
            return Ok(event);
        }
        match self.read_byte_inner() {
            Ok(event) => Ok(event),
            Err(e) => {
                self.state = State::Eof;
                Err(e)
            }
        }
    }

    /// Fill `buf` with as many bytes as the current block provides.
    ///
    /// Returns [`ReadStatus::BlockEnd`] only when the block boundary was
    /// hit before any byte was produced; a partial fill returns
    /// `Read(n)` and the boundary event is delivered by the next call.
    pub fn read_into(&mut self, buf: &mut [u8]) -> Result<ReadStatus> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read_byte()? {
                ReadEvent::Byte(b) => {
                    buf[filled] = b;
                    filled += 1;
                }
                ReadEvent::BlockEnd => {
                    if filled == 0 {
                        return Ok(ReadStatus::BlockEnd);
                    }
                    self.pending = Some(ReadEvent::BlockEnd);
                    break;
                }
                ReadEvent::StreamEnd => {
                    if filled == 0 {
                        return Ok(ReadStatus::StreamEnd);
                    }
                    self.pending = Some(ReadEvent::StreamEnd);
                    break;
                }
            }
        }
        Ok(ReadStatus::Read(filled))
    }

    /// The compressed-source position as of the last block boundary.
    pub fn reported_bytes_consumed(&self) -> u64 {
        self.position.get()
    }

    /// Account for source bytes consumed before this decoder was attached
    /// (e.g. a stripped leading `BZ` magic).
    pub fn adjust_reported_bytes(&mut self, n: u64) {
        self.position.adjust(n);
    }

    /// Raw bytes pulled from the source so far.
    pub fn bytes_consumed(&self) -> u64 {
        self.bits.bytes_consumed()
    }

    /// Release the block buffers. Idempotent; reads after this fail with
    /// [`BzError::InvalidArgument`].
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.state = State::Eof;
        self.block.release();
    }

    fn read_byte_inner(&mut self) -> Result<ReadEvent> {
        loop {
            match self.state {
                State::Eof => return Ok(ReadEvent::StreamEnd),
                State::StartBlock => self.init_block()?,
                State::EmitByte | State::CheckRun | State::EmitTail => {
                    if let Some(byte) = self.step_block()? {
                        return Ok(ReadEvent::Byte(byte));
                    }
                    self.end_block()?;
                    match self.mode {
                        ReadMode::Continuous => self.state = State::StartBlock,
                        ReadMode::ByBlock => {
                            self.state = if self.resync()? {
                                State::StartBlock
                            } else {
                                State::Eof
                            };
                            return Ok(ReadEvent::BlockEnd);
                        }
                    }
                }
            }
        }
    }

    /// Advance the in-block state machine until it emits one byte, or
    /// `None` when the block is spent.
    fn step_block(&mut self) -> Result<Option<u8>> {
        loop {
            match self.state {
                State::EmitByte => {
                    if self.cursor.exhausted(&self.block) {
                        return Ok(None);
                    }
                    let byte = self.cursor.pull(&self.block)?;
                    self.cursor.note_literal(byte);
                    self.block_crc.update_byte(byte);
                    self.state = State::CheckRun;
                    return Ok(Some(byte));
                }
                State::CheckRun => {
                    if self.cursor.extend_run() {
                        // Four in a row: the next walked byte is a length.
                        let len = self.cursor.pull(&self.block)?;
                        self.cursor.start_tail(len);
                        self.state = State::EmitTail;
                    } else {
                        self.state = State::EmitByte;
                    }
                }
                State::EmitTail => match self.cursor.take_tail() {
                    Some(byte) => {
                        self.block_crc.update_byte(byte);
                        return Ok(Some(byte));
                    }
                    None => self.state = State::EmitByte,
                },
                _ => unreachable!("not inside a block"),
            }
        }
    }

    /// Position at and parse the next block body; in continuous mode this
    /// also recognizes the stream footer and member boundaries.
    fn init_block(&mut self) -> Result<()> {
        match self.mode {
            ReadMode::ByBlock => self.read_block_body(),
            ReadMode::Continuous => loop {
                let token = self.bits.read_bits(48)?;
                if token == BLOCK_MAGIC {
                    return self.read_block_body();
                }
                if token != EOS_MAGIC {
                    return Err(BzError::bad_block_header(token));
                }
                let stored = self.bits.read_u32()?;
                if stored != self.combined_crc {
                    return Err(BzError::crc_mismatch(stored, self.combined_crc));
                }
                if !self.next_member()? {
                    self.state = State::Eof;
                    return Ok(());
                }
            },
        }
    }

    fn read_block_body(&mut self) -> Result<()> {
        self.block.read_from(&mut self.bits, self.block_size_100k)?;
        let start = ibwt::build_transition(&mut self.block);
        self.cursor.reset(start, self.block.randomised);
        self.block_crc.reset();
        self.state = State::EmitByte;
        Ok(())
    }

    /// Verify the finished block's CRC and fold it into the combined CRC.
    fn end_block(&mut self) -> Result<()> {
        let computed = self.block_crc.value();
        if computed != self.block.stored_crc {
            return Err(BzError::crc_mismatch(self.block.stored_crc, computed));
        }
        self.combined_crc = self.combined_crc.rotate_left(1) ^ computed;
        Ok(())
    }

    /// Parse `h` + block-size digit.
    fn read_stream_header(&mut self) -> Result<()> {
        let version = self.bits.read_u8()?;
        if version != b'h' {
            return Err(BzError::bad_stream_header(format!(
                "expected version 'h', found {version:#04x}"
            )));
        }
        let digit = self.bits.read_u8()?;
        if !digit.is_ascii_digit() || digit == b'0' {
            return Err(BzError::bad_stream_header(format!(
                "bad block-size digit {digit:#04x}"
            )));
        }
        self.block_size_100k = usize::from(digit - b'0');
        Ok(())
    }

    /// After a member's footer, look for a concatenated `BZh` member.
    /// Clean end-of-source here is the normal end of the stream.
    fn next_member(&mut self) -> Result<bool> {
        self.bits.align_to_byte();
        let magic0 = match self.bits.read_u8() {
            Ok(b) => b,
            Err(BzError::UnexpectedEof) => return Ok(false),
            Err(e) => return Err(e),
        };
        let magic1 = self.bits.read_u8()?;
        if magic0 != b'B' || magic1 != b'Z' {
            return Err(BzError::bad_stream_header(format!(
                "expected BZ magic between members, found {magic0:#04x} {magic1:#04x}"
            )));
        }
        self.read_stream_header()?;
        self.combined_crc = 0;
        Ok(true)
    }

    /// Hunt for the next block marker and report where it begins.
    ///
    /// An end-of-stream marker found along the way reports its own offset —
    /// that is where the stream's data content ends, and the position a
    /// split reader's range bookkeeping wants — but the hunt keeps going,
    /// because a concatenated member's block may still follow. Only when
    /// not even an end-of-stream marker turned up does the reported
    /// position fall back to everything consumed.
    fn resync(&mut self) -> Result<bool> {
        let mut saw_eos = false;
        loop {
            match scan_for_any(&mut self.bits, &[BLOCK_MAGIC, EOS_MAGIC], MARKER_BITS)? {
                ScanOutcome::Found { pattern, start_byte } => {
                    self.position.advance_to(start_byte);
                    if pattern == BLOCK_MAGIC {
                        return Ok(true);
                    }
                    saw_eos = true;
                }
                ScanOutcome::NotFound { consumed } => {
                    if !saw_eos {
                        self.position.advance_to(consumed);
                    }
                    return Ok(false);
                }
            }
        }
    }
}

/// Decompress an entire stream (leading `BZ` magic already stripped).
pub fn decompress<R: Read>(inner: R) -> Result<Vec<u8>> {
    let mut decoder = BzDecoder::new(inner, ReadMode::Continuous)?;
    let mut out = Vec::new();
    let mut buf = [0u8; 32 * 1024];
    loop {
        match decoder.read_into(&mut buf)? {
            ReadStatus::Read(n) => out.extend_from_slice(&buf[..n]),
            ReadStatus::StreamEnd => return Ok(out),
            ReadStatus::BlockEnd => unreachable!("continuous mode"),
        }
    }
}

/// `std::io::Read` adapter over a continuous-mode [`BzDecoder`].
#[derive(Debug)]
pub struct BzReader<R> {
    decoder: BzDecoder<R>,
}

impl<R: Read> BzReader<R> {
    /// Wrap a byte source positioned after the `BZ` magic.
    pub fn new(inner: R) -> Result<Self> {
        Ok(Self {
            decoder: BzDecoder::new(inner, ReadMode::Continuous)?,
        })
    }

    /// Consume the adapter and return the decoder.
    pub fn into_decoder(self) -> BzDecoder<R> {
        self.decoder
    }
}

impl<R: Read> Read for BzReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.decoder.read_into(buf) {
            Ok(ReadStatus::Read(n)) => Ok(n),
            Ok(ReadStatus::StreamEnd) | Ok(ReadStatus::BlockEnd) => Ok(0),
            Err(BzError::Io(e)) => Err(e),
            Err(e) => Err(io::Error::new(io::ErrorKind::InvalidData, e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    // A well-formed empty stream: 'h', '9', end-of-stream marker,
    // combined CRC zero.
    const EMPTY_STREAM: &[u8] = &[
        0x68, 0x39, 0x17, 0x72, 0x45, 0x38, 0x50, 0x90, 0x00, 0x00, 0x00, 0x00,
    ];

    fn continuous(data: &[u8]) -> BzDecoder<Cursor<Vec<u8>>> {
        BzDecoder::new(Cursor::new(data.to_vec()), ReadMode::Continuous).unwrap()
    }

    #[test]
    fn test_empty_stream_continuous() {
        let mut decoder = continuous(EMPTY_STREAM);
        assert_eq!(decoder.read_byte().unwrap(), ReadEvent::StreamEnd);
        assert_eq!(decoder.read_byte().unwrap(), ReadEvent::StreamEnd);
    }

    #[test]
    fn test_empty_stream_byblock() {
        let mut decoder =
            BzDecoder::new(Cursor::new(EMPTY_STREAM.to_vec()), ReadMode::ByBlock).unwrap();
        assert_eq!(decoder.read_byte().unwrap(), ReadEvent::StreamEnd);
        // no block, but the end-of-stream marker sits right after the
        // two header bytes and its offset is what gets reported
        assert_eq!(decoder.reported_bytes_consumed(), 2);
    }

    #[test]
    fn test_byblock_no_marker_at_all() {
        // neither a block nor an end-of-stream marker: the reported
        // position falls back to everything consumed
        let garbage = vec![0u8; 32];
        let mut decoder =
            BzDecoder::new(Cursor::new(garbage), ReadMode::ByBlock).unwrap();
        assert_eq!(decoder.read_byte().unwrap(), ReadEvent::StreamEnd);
        assert_eq!(decoder.reported_bytes_consumed(), 32);
    }

    #[test]
    fn test_bad_stream_header() {
        assert!(matches!(
            BzDecoder::new(Cursor::new(b"x9".to_vec()), ReadMode::Continuous),
            Err(BzError::BadStreamHeader { .. })
        ));
        assert!(matches!(
            BzDecoder::new(Cursor::new(b"h0".to_vec()), ReadMode::Continuous),
            Err(BzError::BadStreamHeader { .. })
        ));
    }

    #[test]
    fn test_bad_block_token() {
        // valid header, then a token that is neither marker
        let mut data = vec![0x68, 0x31];
        data.extend_from_slice(&[0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC]);
        let mut decoder = continuous(&data);
        assert!(matches!(
            decoder.read_byte(),
            Err(BzError::BadBlockHeader { found: 0x123456789ABC })
        ));
        // fatal: the decoder is now terminal
        assert_eq!(decoder.read_byte().unwrap(), ReadEvent::StreamEnd);
    }

    #[test]
    fn test_empty_stream_bad_combined_crc() {
        let mut data = EMPTY_STREAM.to_vec();
        let n = data.len();
        data[n - 1] = 0x01;
        let mut decoder = continuous(&data);
        assert!(matches!(
            decoder.read_byte(),
            Err(BzError::CrcMismatch { .. })
        ));
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut decoder = continuous(EMPTY_STREAM);
        decoder.close();
        decoder.close();
        assert!(matches!(
            decoder.read_byte(),
            Err(BzError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_adjust_reported_bytes() {
        let mut decoder =
            BzDecoder::new(Cursor::new(EMPTY_STREAM.to_vec()), ReadMode::ByBlock).unwrap();
        let before = decoder.reported_bytes_consumed();
        decoder.adjust_reported_bytes(2);
        assert_eq!(decoder.reported_bytes_consumed(), before + 2);
    }

    #[test]
    fn test_truncated_header() {
        assert!(matches!(
            BzDecoder::new(Cursor::new(vec![0x68]), ReadMode::Continuous),
            Err(BzError::UnexpectedEof)
        ));
    }
}
