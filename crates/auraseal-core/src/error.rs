//! Shared error types for the packaging pipeline.

use thiserror::Error;

/// Codec errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// A bit sequence matched no valid code.
    #[error("corrupt bitstream: no code matches at bit offset {bit_offset}")]
    Corrupt {
        /// Bit offset where decoding failed.
        bit_offset: u64,
    },

    /// The bitstream ended before the expected number of symbols was decoded.
    #[error("truncated bitstream: decoded {decoded} of {expected} symbols")]
    Truncated {
        /// Symbols decoded before the stream ran out.
        decoded: u64,
        /// Symbols expected.
        expected: u64,
    },

    /// The code table is empty but symbols were requested.
    #[error("empty code table cannot decode {expected} symbols")]
    EmptyTable {
        /// Symbols expected.
        expected: u64,
    },

    /// A packed code-length nibble exceeds the maximum code length.
    #[error("invalid code length {length} for symbol {symbol}: maximum is {max}")]
    InvalidLength {
        /// Symbol with the invalid length.
        symbol: u8,
        /// The invalid length.
        length: u8,
        /// Maximum permitted length.
        max: u8,
    },

    /// The bit lengths do not describe a complete prefix code.
    #[error("bit lengths do not form a valid canonical code")]
    InvalidTable,
}

/// Part layout and partitioning errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartError {
    /// Raw bytes are too short to contain header and footer.
    #[error("truncated part: {len} bytes, need at least {min}")]
    Truncated {
        /// Bytes available.
        len: usize,
        /// Minimum required.
        min: usize,
    },

    /// Wire magic did not match.
    #[error("bad magic {found:02x?}")]
    BadMagic {
        /// Magic bytes found.
        found: [u8; 4],
    },

    /// Declared payload length disagrees with the bytes present.
    #[error("payload length {declared} disagrees with {actual} bytes present")]
    PayloadLengthMismatch {
        /// Length declared in the header.
        declared: usize,
        /// Bytes actually present between header and footer.
        actual: usize,
    },

    /// Payload exceeds the maximum part size.
    #[error("payload of {len} bytes exceeds maximum {max}")]
    PayloadTooLarge {
        /// Payload size.
        len: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// Part number is not valid for the declared total.
    #[error("part number {part_number} out of range for {total_parts} parts")]
    PartNumberOutOfRange {
        /// The offending part number.
        part_number: u8,
        /// Declared total parts.
        total_parts: u16,
    },

    /// The stream needs more parts than the format can number.
    #[error("component needs {needed} parts: maximum is {max}")]
    TooManyParts {
        /// Parts required to hold the stream.
        needed: usize,
        /// Maximum representable.
        max: usize,
    },

    /// The embedded code table does not describe a valid prefix code.
    #[error("invalid embedded code table: {source}")]
    InvalidCodeTable {
        /// Underlying codec error.
        #[source]
        source: CodecError,
    },

    /// The recovery block carries an unknown part kind.
    #[error("unknown part kind {value}")]
    InvalidKind {
        /// Kind byte found on the wire.
        value: u8,
    },

    /// SHA-512 digest tag of the payload does not match the footer.
    #[error("payload digest tag mismatch for part {part_number}")]
    ChecksumMismatch {
        /// Part whose payload failed the check.
        part_number: u8,
    },

    /// CRC-32 of the payload does not match the footer.
    #[error("payload crc mismatch for part {part_number}")]
    CrcMismatch {
        /// Part whose payload failed the check.
        part_number: u8,
    },

    /// Parts handed to `join` are not a contiguous run 0..total.
    #[error("non-contiguous part sequence: expected part {expected}, got {got}")]
    NonContiguous {
        /// Expected part number at this position.
        expected: u8,
        /// Part number found.
        got: u8,
    },

    /// Parts handed to `join` disagree on shared component metadata.
    #[error("parts disagree on component metadata: {field}")]
    MetadataMismatch {
        /// Name of the disagreeing field.
        field: &'static str,
    },

    /// No parts were provided where at least one is required.
    #[error("no parts provided")]
    Empty,
}

/// Composite error for the packaging pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PackageError {
    /// Codec failure.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Part layout failure.
    #[error(transparent)]
    Part(#[from] PartError),

    /// Erasure coding failure.
    #[error(transparent)]
    Erasure(#[from] crate::erasure::ErasureError),

    /// Component exceeds the configured size guard.
    #[error("component of {size} bytes exceeds maximum {max}")]
    ComponentTooLarge {
        /// Component size.
        size: u64,
        /// Configured maximum.
        max: u64,
    },

    /// Decompressed output length disagrees with the recorded size.
    #[error("decoded {got} bytes, header records {expected}")]
    SizeMismatch {
        /// Bytes produced by decoding.
        got: u64,
        /// Size recorded in the part headers.
        expected: u64,
    },

    /// Configuration is not usable.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Why the configuration was rejected.
        reason: String,
    },
}
