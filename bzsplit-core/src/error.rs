//! Error types for bzsplit operations.
//!
//! One enum covers every way a compressed stream can go wrong: I/O failures
//! from the underlying reader, malformed headers and coding tables, payload
//! corruption detected during the inverse transform, and checksum mismatches.
//! Every error is fatal to the decoder instance that raised it.

use std::io;
use thiserror::Error;

/// The main error type for bzsplit operations.
#[derive(Debug, Error)]
pub enum BzError {
    /// I/O error from the underlying reader.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The source ran out of bytes in the middle of a bit-level field.
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// The stream header (`h` + block-size digit) was missing or invalid.
    #[error("invalid stream header: {message}")]
    BadStreamHeader {
        /// Description of the header error.
        message: String,
    },

    /// A 48-bit token was neither the block-start nor the end-of-stream marker.
    #[error("invalid block header: {found:#014x}")]
    BadBlockHeader {
        /// The 48-bit token that was read.
        found: u64,
    },

    /// A Huffman coding table or selector list failed validation.
    #[error("malformed coding table: {message}")]
    TableMalformed {
        /// Description of the inconsistency.
        message: String,
    },

    /// The MTF+RLE decode tried to write past the declared block size.
    #[error("block overrun: decoded data exceeds {limit} bytes")]
    BlockOverrun {
        /// The block-size limit that was exceeded.
        limit: usize,
    },

    /// Payload corruption detected during the inverse transform.
    #[error("corrupted stream: {message}")]
    StreamCorrupted {
        /// Description of the corruption.
        message: String,
    },

    /// CRC checksum mismatch (block or combined).
    #[error("CRC mismatch: stored {expected:#010x}, computed {computed:#010x}")]
    CrcMismatch {
        /// Stored CRC value from the stream.
        expected: u32,
        /// CRC value computed from the decoded data.
        computed: u32,
    },

    /// A caller-supplied argument was out of range, or the decoder was
    /// used after `close()`.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the argument error.
        message: &'static str,
    },
}

/// Result type alias for bzsplit operations.
pub type Result<T> = std::result::Result<T, BzError>;

impl BzError {
    /// Create a stream-header error.
    pub fn bad_stream_header(message: impl Into<String>) -> Self {
        Self::BadStreamHeader {
            message: message.into(),
        }
    }

    /// Create a block-header error.
    pub fn bad_block_header(found: u64) -> Self {
        Self::BadBlockHeader { found }
    }

    /// Create a malformed-table error.
    pub fn table_malformed(message: impl Into<String>) -> Self {
        Self::TableMalformed {
            message: message.into(),
        }
    }

    /// Create a block-overrun error.
    pub fn block_overrun(limit: usize) -> Self {
        Self::BlockOverrun { limit }
    }

    /// Create a corrupted-stream error.
    pub fn stream_corrupted(message: impl Into<String>) -> Self {
        Self::StreamCorrupted {
            message: message.into(),
        }
    }

    /// Create a CRC mismatch error.
    pub fn crc_mismatch(expected: u32, computed: u32) -> Self {
        Self::CrcMismatch { expected, computed }
    }

    /// Create an invalid-argument error.
    pub fn invalid_argument(message: &'static str) -> Self {
        Self::InvalidArgument { message }
    }
}
