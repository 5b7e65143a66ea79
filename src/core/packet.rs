//! # Packet
//!
//! The unit of transfer on the wire: an opaque payload behind a size tag.
//!
//! ## Wire Format
//! ```text
//! [size tag (1-10)] [payload (N)]
//! ```
//!
//! There are no magic bytes and no version octet; the size tag is the whole
//! header. The claimed size is validated against a maximum before any
//! allocation happens.

use crate::core::tag;
use crate::error::{Result, WireError};
use bytes::{Bytes, BytesMut};

/// Default cap on a single packet payload (16 MiB).
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// A length-prefixed byte packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub payload: Bytes,
}

impl Packet {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Packet {
            payload: payload.into(),
        }
    }

    /// Encode as `[size tag][payload]`.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(tag::MAX_TAG_LEN + self.payload.len());
        tag::encode_into(&mut buf, self.payload.len() as u64);
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }

    /// Decode a complete packet from a buffer.
    ///
    /// The buffer must hold exactly one packet; both truncated payloads and
    /// trailing bytes are rejected. Streams of packets go through the codec.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_bytes_limited(data, MAX_PAYLOAD_SIZE)
    }

    pub fn from_bytes_limited(data: &[u8], max_payload: usize) -> Result<Self> {
        let (size, consumed) = tag::decode(data)?;
        let size = usize::try_from(size).map_err(|_| WireError::OversizedPacket(usize::MAX))?;
        if size > max_payload {
            return Err(WireError::OversizedPacket(size));
        }
        let body = &data[consumed..];
        if body.len() < size {
            return Err(WireError::TruncatedChunk {
                expected: size,
                available: body.len(),
            });
        }
        if body.len() > size {
            return Err(WireError::TruncatedChunk {
                expected: 0,
                available: body.len() - size,
            });
        }
        Ok(Packet {
            payload: Bytes::copy_from_slice(body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_is_one_byte() {
        let p = Packet::new(Bytes::new());
        let bytes = p.to_bytes();
        assert_eq!(&bytes[..], &[0x80]);
        assert_eq!(Packet::from_bytes(&bytes).unwrap(), p);
    }

    #[test]
    fn roundtrip() {
        let p = Packet::new(Bytes::from_static(b"hello framing"));
        let decoded = Packet::from_bytes(&p.to_bytes()).unwrap();
        assert_eq!(decoded.payload, p.payload);
    }

    #[test]
    fn oversize_claim_rejected_before_read() {
        // A tag claiming 20 MiB followed by nothing like that much data.
        let mut buf = BytesMut::new();
        tag::encode_into(&mut buf, 20 * 1024 * 1024);
        buf.extend_from_slice(&[0xFF; 8]);
        match Packet::from_bytes(&buf) {
            Err(WireError::OversizedPacket(n)) => assert_eq!(n, 20 * 1024 * 1024),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn truncated_payload_rejected() {
        let mut buf = BytesMut::new();
        tag::encode_into(&mut buf, 10);
        buf.extend_from_slice(b"short");
        assert!(matches!(
            Packet::from_bytes(&buf),
            Err(WireError::TruncatedChunk {
                expected: 10,
                available: 5
            })
        ));
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut buf = BytesMut::from(&Packet::new(Bytes::from_static(b"whole")).to_bytes()[..]);
        buf.extend_from_slice(b"extra");
        assert!(matches!(
            Packet::from_bytes(&buf),
            Err(WireError::TruncatedChunk {
                expected: 0,
                available: 5
            })
        ));
    }

    #[test]
    fn empty_buffer_rejected() {
        assert!(matches!(
            Packet::from_bytes(&[]),
            Err(WireError::IncompleteTag)
        ));
    }
}
