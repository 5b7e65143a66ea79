//! # Error Types
//!
//! Error handling for the wire protocol and serialization layers.
//!
//! This module defines all error variants that can occur while framing,
//! chunking, serializing, or exchanging messages over a connection.
//!
//! ## Error Categories
//! - **I/O Errors**: socket and file failures
//! - **Framing Errors**: corrupt size tags, truncated chunks, oversized packets
//! - **Codec Errors**: unknown type tags, malformed values, depth abuse
//! - **Envelope Errors**: compression and encryption failures
//! - **Connection Errors**: closed peers, timeouts, remote handler failures
//!
//! All errors implement `std::error::Error` for interoperability.

use std::io;
use thiserror::Error;

/// Primary error type for all protocol and serialization operations.
#[derive(Error, Debug)]
pub enum WireError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A size tag started but the stream ended before its terminator byte.
    #[error("size tag is incomplete")]
    IncompleteTag,

    /// A size tag is longer than a u64 can encode.
    #[error("size tag does not fit in 64 bits")]
    CorruptTag,

    /// A chunk stream ran out of data before the requested byte count.
    #[error("truncated chunk: expected {expected} bytes, only {available} available")]
    TruncatedChunk { expected: usize, available: usize },

    #[error("packet too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("unknown value type tag: {0:#04x}")]
    UnknownValueTag(u8),

    #[error("unknown message kind: {0:#04x}")]
    UnknownMessageKind(u8),

    /// A decoded integer payload exceeds the i64 range.
    #[error("integer payload of {0} bytes exceeds 64 bits")]
    IntOverflow(usize),

    /// Float payloads are always exactly eight bytes.
    #[error("float payload must be 8 bytes, got {0}")]
    BadFloatWidth(usize),

    #[error("invalid UTF-8 in string payload: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Nesting deeper than the decode limit; guards against stack abuse.
    #[error("value nesting exceeds maximum depth")]
    DepthLimit,

    #[error("unknown envelope flags: {0:#04x}")]
    UnknownEnvelopeFlags(u8),

    #[error("compression failed")]
    CompressionFailure,

    #[error("decompression failed")]
    DecompressionFailure,

    #[error("encryption failed")]
    EncryptionFailure,

    #[error("decryption failed")]
    DecryptionFailure,

    /// The envelope is encrypted but no key was supplied.
    #[error("payload is encrypted and no key was provided")]
    MissingKey,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("operation timed out")]
    Timeout,

    /// The remote handler reported a failure for a correlated request.
    #[error("remote error: {0}")]
    Remote(String),

    /// No handler is registered for the requested opcode.
    #[error("no handler registered for opcode: {0}")]
    UnknownOpcode(String),

    #[error("synchronization primitive poisoned")]
    LockPoisoned,

    #[error("configuration error: {0}")]
    ConfigError(String),
}

/// Type alias for Results using WireError
pub type Result<T> = std::result::Result<T, WireError>;
