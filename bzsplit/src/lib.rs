//! Streaming BZip2 decompression for split-aware readers.
//!
//! This crate decodes the BZip2 block format from an arbitrary byte stream:
//! bit-granular unpacking, Huffman decoding over multi-table alphabets, the
//! inverse move-to-front transform, run-length expansion, the inverse
//! Burrows-Wheeler transform, optional block derandomization, and per-block
//! plus combined CRC verification.
//!
//! Beyond plain decompression it supports *by-block* reading: the decoder
//! resynchronizes to the next 48-bit block marker (which is not
//! byte-aligned) and reports, at block boundaries, how many bytes of the
//! underlying compressed stream a block boundary corresponds to. Split-based
//! parallel readers use those positions to hand exact compressed-byte ranges
//! to workers.
//!
//! # Example
//!
//! ```no_run
//! use bzsplit::{BzDecoder, ReadEvent, ReadMode};
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! # fn main() -> bzsplit_core::Result<()> {
//! // `new` expects the two `BZ` magic bytes to be stripped by the caller.
//! let file = BufReader::new(File::open("data.bz2.raw").unwrap());
//! let mut decoder = BzDecoder::new(file, ReadMode::ByBlock)?;
//! decoder.adjust_reported_bytes(2);
//! loop {
//!     match decoder.read_byte()? {
//!         ReadEvent::Byte(b) => print!("{}", b as char),
//!         ReadEvent::BlockEnd => {
//!             eprintln!("next block at byte {}", decoder.reported_bytes_consumed());
//!         }
//!         ReadEvent::StreamEnd => break,
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod block;
mod huffman;
mod ibwt;
mod rand;
mod scan;
mod stream;

pub use scan::{ScanOutcome, scan_for, scan_for_any};
pub use stream::{BzDecoder, BzReader, ReadEvent, ReadMode, ReadStatus, decompress};

/// 48-bit block-start marker (`pi` digits).
pub const BLOCK_MAGIC: u64 = 0x3141_5926_5359;

/// 48-bit end-of-stream marker (`sqrt(pi)` digits).
pub const EOS_MAGIC: u64 = 0x1772_4538_5090;

/// Width of the block-start and end-of-stream markers, in bits.
pub const MARKER_BITS: u32 = 48;

/// Uncompressed block size granularity; the header digit 1..=9 scales it.
pub const BASE_BLOCK_SIZE: usize = 100_000;

/// Maximum uncompressed block size (header digit 9).
pub const MAX_BLOCK_SIZE: usize = 9 * BASE_BLOCK_SIZE;

/// Number of symbols sharing one Huffman table selector.
pub const GROUP_SIZE: usize = 50;

/// Maximum number of Huffman tables per block.
pub const MAX_GROUPS: usize = 6;

/// Maximum Huffman alphabet size (256 byte values + the two run symbols).
pub const MAX_ALPHA_SIZE: usize = 258;

/// Maximum number of table selectors per block.
pub const MAX_SELECTORS: usize = 2 + MAX_BLOCK_SIZE / GROUP_SIZE;

/// Maximum Huffman code length the decode tables are sized for.
pub const MAX_CODE_LEN: usize = 23;
