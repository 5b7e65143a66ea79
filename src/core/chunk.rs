//! # Chunk Streams
//!
//! Utilities for reshaping sequences of byte chunks.
//!
//! Serialized data moves through this crate as a stream of [`Bytes`] chunks
//! whose sizes are an accident of where they came from (socket reads, file
//! reads, encoder output). This module reshapes such streams:
//!
//! - [`ChunkSource`] pulls an exact number of bytes across chunk boundaries,
//!   copying only when a request straddles chunks.
//! - [`reflow`] normalizes a stream into fixed-size chunks.
//! - [`frame`] / [`deframe`] prefix each chunk with its size tag and recover
//!   the original chunk boundaries after arbitrary re-chunking in transit.

use crate::core::tag;
use crate::error::{Result, WireError};
use bytes::{Buf, Bytes, BytesMut};

/// A cursor over a stream of byte chunks.
///
/// Holds at most one partially-consumed chunk; requests served entirely from
/// that chunk are zero-copy slices.
pub struct ChunkSource<I> {
    head: Bytes,
    rest: I,
}

impl ChunkSource<std::iter::Empty<Bytes>> {
    /// A source over a single already-materialized buffer.
    pub fn single(data: Bytes) -> Self {
        ChunkSource {
            head: data,
            rest: std::iter::empty(),
        }
    }
}

impl<I> ChunkSource<I>
where
    I: Iterator<Item = Bytes>,
{
    pub fn new(chunks: I) -> Self {
        ChunkSource {
            head: Bytes::new(),
            rest: chunks,
        }
    }

    /// A source with an initial chunk in front of the iterator.
    pub fn with_head(head: Bytes, chunks: I) -> Self {
        ChunkSource { head, rest: chunks }
    }

    /// Bytes currently buffered without pulling from the underlying iterator.
    pub fn buffered(&self) -> usize {
        self.head.len()
    }

    /// Pull chunks until at least `n` bytes are buffered.
    ///
    /// `n` may be an attacker-claimed length, so the buffer only ever grows
    /// to fit bytes that actually arrived, never to the claim up front.
    fn fill(&mut self, n: usize) -> Result<()> {
        if self.head.len() >= n {
            return Ok(());
        }
        let mut buf = BytesMut::from(&self.head[..]);
        while buf.len() < n {
            match self.rest.next() {
                Some(chunk) => buf.extend_from_slice(&chunk),
                None => {
                    self.head = buf.freeze();
                    return Err(WireError::TruncatedChunk {
                        expected: n,
                        available: self.head.len(),
                    });
                }
            }
        }
        self.head = buf.freeze();
        Ok(())
    }

    /// Extract exactly `n` bytes, concatenating across chunk boundaries.
    pub fn take(&mut self, n: usize) -> Result<Bytes> {
        if self.head.len() >= n {
            return Ok(self.head.split_to(n));
        }
        self.fill(n)?;
        Ok(self.head.split_to(n))
    }

    /// Next single byte, or `None` at a clean end of stream.
    fn next_byte(&mut self) -> Option<u8> {
        while self.head.is_empty() {
            match self.rest.next() {
                Some(chunk) => self.head = chunk,
                None => return None,
            }
        }
        let byte = self.head[0];
        self.head.advance(1);
        Some(byte)
    }

    /// Decode one size tag from the stream.
    ///
    /// `Ok(None)` means the stream ended cleanly at a tag boundary. A stream
    /// that ends mid-tag is [`WireError::IncompleteTag`].
    pub fn next_tag(&mut self) -> Result<Option<u64>> {
        let mut value: u64 = 0;
        let mut seen = 0usize;
        loop {
            let byte = match self.next_byte() {
                Some(b) => b,
                None if seen == 0 => return Ok(None),
                None => return Err(WireError::IncompleteTag),
            };
            seen += 1;
            if seen > tag::MAX_TAG_LEN {
                return Err(WireError::CorruptTag);
            }
            value = value
                .checked_mul(1 << 7)
                .and_then(|v| v.checked_add(u64::from(byte & 0x7F)))
                .ok_or(WireError::CorruptTag)?;
            if byte & 0x80 != 0 {
                return Ok(Some(value));
            }
        }
    }

    /// True when no bytes remain, buffered or upstream.
    pub fn is_exhausted(&mut self) -> bool {
        while self.head.is_empty() {
            match self.rest.next() {
                Some(chunk) => self.head = chunk,
                None => return true,
            }
        }
        false
    }

    /// Remaining data as a chunk stream: the buffered head followed by
    /// whatever the underlying iterator still holds.
    pub fn into_chunks(self) -> impl Iterator<Item = Bytes> {
        let head = if self.head.is_empty() {
            None
        } else {
            Some(self.head)
        };
        head.into_iter().chain(self.rest)
    }
}

/// Reflow a chunk stream into chunks of exactly `size` bytes.
///
/// The final chunk carries the remainder and may be shorter. An empty input
/// produces an empty output. `size` must be non-zero.
pub fn reflow<I>(chunks: I, size: usize) -> Reflow<I::IntoIter>
where
    I: IntoIterator<Item = Bytes>,
{
    assert!(size > 0, "reflow chunk size must be non-zero");
    Reflow {
        inner: chunks.into_iter(),
        acc: BytesMut::new(),
        size,
        done: false,
    }
}

pub struct Reflow<I> {
    inner: I,
    acc: BytesMut,
    size: usize,
    done: bool,
}

impl<I> Iterator for Reflow<I>
where
    I: Iterator<Item = Bytes>,
{
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        if self.done {
            return None;
        }
        while self.acc.len() < self.size {
            match self.inner.next() {
                Some(chunk) => self.acc.extend_from_slice(&chunk),
                None => {
                    self.done = true;
                    if self.acc.is_empty() {
                        return None;
                    }
                    return Some(self.acc.split().freeze());
                }
            }
        }
        Some(self.acc.split_to(self.size).freeze())
    }
}

/// Prefix every chunk with its size tag.
///
/// The tag and the chunk are yielded as separate items so that the chunk
/// bytes are never copied; [`deframe`] does not care how the framed stream
/// is re-chunked.
pub fn frame<I>(chunks: I) -> impl Iterator<Item = Bytes>
where
    I: IntoIterator<Item = Bytes>,
{
    chunks.into_iter().flat_map(|chunk| {
        let tag = tag::encode(chunk.len() as u64).freeze();
        [tag, chunk]
    })
}

/// Recover the chunk boundaries of a [`frame`]d stream.
///
/// Yields one item per original chunk. After the first error the iterator
/// fuses: a broken frame stream has no trustworthy continuation.
pub fn deframe<I>(source: ChunkSource<I>) -> Deframe<I>
where
    I: Iterator<Item = Bytes>,
{
    Deframe {
        source,
        failed: false,
    }
}

pub struct Deframe<I> {
    source: ChunkSource<I>,
    failed: bool,
}

impl<I> Iterator for Deframe<I>
where
    I: Iterator<Item = Bytes>,
{
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Result<Bytes>> {
        if self.failed {
            return None;
        }
        let len = match self.source.next_tag() {
            Ok(Some(len)) => len,
            Ok(None) => return None,
            Err(e) => {
                self.failed = true;
                return Some(Err(e));
            }
        };
        match self.source.take(len as usize) {
            Ok(chunk) => Some(Ok(chunk)),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
