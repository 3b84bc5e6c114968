//! # bzsplit Core
//!
//! Core components for the bzsplit decompressor.
//!
//! This crate provides the fundamental building blocks the BZip2 decoder is
//! assembled from:
//!
//! - [`bitstream`]: MSB-first bit-level input with exact consumed-byte
//!   accounting (split position reporting depends on it)
//! - [`crc`]: the BZip2 CRC-32 (big-endian 0x04C11DB7, not the zlib CRC)
//! - [`error`]: error types
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ L3: Split-aware surface                              │
//! │     by-block reading, position reporting, CLI        │
//! ├──────────────────────────────────────────────────────┤
//! │ L2: Codec                                            │
//! │     Huffman + MTF/RLE + inverse BWT (bzsplit crate)  │
//! ├──────────────────────────────────────────────────────┤
//! │ L1: BitStream (this crate)                           │
//! │     BitReader, CRC-32/BZIP2                          │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use bzsplit_core::bitstream::BitReader;
//! use bzsplit_core::crc::Crc32;
//! use std::io::Cursor;
//!
//! let mut reader = BitReader::new(Cursor::new(vec![0x31, 0x41]));
//! assert_eq!(reader.read_bits(12).unwrap(), 0x314);
//!
//! assert_eq!(Crc32::compute(b"123456789"), 0xFC891918);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bitstream;
pub mod crc;
pub mod error;

// Re-exports for convenience
pub use bitstream::BitReader;
pub use crc::Crc32;
pub use error::{BzError, Result};
