//! # Size Tags
//!
//! Variable-length integer encoding used for every length prefix on the wire.
//!
//! The value is split into 7-bit groups, most significant group first. Every
//! byte except the last has the high bit clear; the terminator byte has the
//! high bit set. Zero encodes as a single `0x80` byte.
//!
//! ```text
//! 0        -> 80
//! 1        -> 81
//! 127      -> FF
//! 128      -> 01 80
//! 2^21     -> 01 00 00 80
//! ```
//!
//! Because only the terminator carries the high bit, a decoder can tell a
//! clean end-of-stream (nothing after a terminator) apart from a truncated
//! tag (continuation bytes with no terminator yet).

use crate::error::{Result, WireError};
use bytes::{BufMut, BytesMut};

/// Longest tag a u64 can produce: ceil(64 / 7) bytes.
pub const MAX_TAG_LEN: usize = 10;

/// Outcome of scanning a buffer for one size tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagScan {
    /// A full tag was present: the decoded value and the bytes consumed.
    Done { value: u64, consumed: usize },
    /// The buffer ended mid-tag; more bytes are needed.
    Incomplete,
}

/// Encode `value` as a size tag, appending to `buf`.
pub fn encode_into(buf: &mut BytesMut, value: u64) {
    if value == 0 {
        buf.put_u8(0x80);
        return;
    }
    let mut groups = [0u8; MAX_TAG_LEN];
    let mut n = 0;
    let mut rest = value;
    while rest != 0 {
        groups[n] = (rest & 0x7F) as u8;
        rest >>= 7;
        n += 1;
    }
    // groups are least-significant first; emit in reverse, marking the last.
    for i in (1..n).rev() {
        buf.put_u8(groups[i]);
    }
    buf.put_u8(groups[0] | 0x80);
}

/// Encode `value` as a standalone size tag.
pub fn encode(value: u64) -> BytesMut {
    let mut buf = BytesMut::with_capacity(MAX_TAG_LEN);
    encode_into(&mut buf, value);
    buf
}

/// Scan the front of `buf` for a size tag without consuming it.
///
/// Returns [`TagScan::Incomplete`] when the buffer holds a partial tag and
/// [`WireError::CorruptTag`] when the accumulated value overflows a u64.
pub fn scan(buf: &[u8]) -> Result<TagScan> {
    let mut value: u64 = 0;
    for (i, &byte) in buf.iter().enumerate() {
        if i >= MAX_TAG_LEN {
            return Err(WireError::CorruptTag);
        }
        value = value
            .checked_mul(1 << 7)
            .and_then(|v| v.checked_add(u64::from(byte & 0x7F)))
            .ok_or(WireError::CorruptTag)?;
        if byte & 0x80 != 0 {
            return Ok(TagScan::Done {
                value,
                consumed: i + 1,
            });
        }
    }
    if buf.len() >= MAX_TAG_LEN {
        return Err(WireError::CorruptTag);
    }
    Ok(TagScan::Incomplete)
}

/// Decode one size tag from the front of `buf`.
///
/// Unlike [`scan`], a partial tag here is an error: this form is for inputs
/// that are supposed to be complete.
pub fn decode(buf: &[u8]) -> Result<(u64, usize)> {
    match scan(buf)? {
        TagScan::Done { value, consumed } => Ok((value, consumed)),
        TagScan::Incomplete => Err(WireError::IncompleteTag),
    }
}
