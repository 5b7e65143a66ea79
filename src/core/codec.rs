//! # Packet Codec
//!
//! Tokio codec for streaming [`Packet`]s over any byte transport.
//!
//! Decoding is incremental: a partial size tag or a partial payload leaves
//! the buffer untouched and waits for more data. The claimed payload size is
//! checked against the configured maximum before the payload is buffered,
//! so a hostile peer cannot force a large allocation with a small write.

use crate::core::packet::{Packet, MAX_PAYLOAD_SIZE};
use crate::core::tag::{self, TagScan};
use crate::error::WireError;
use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

#[derive(Debug, Clone, Copy)]
pub struct PacketCodec {
    max_payload: usize,
}

impl PacketCodec {
    pub fn new(max_payload: usize) -> Self {
        PacketCodec { max_payload }
    }
}

impl Default for PacketCodec {
    fn default() -> Self {
        PacketCodec {
            max_payload: MAX_PAYLOAD_SIZE,
        }
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = WireError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>, WireError> {
        let (size, tag_len) = match tag::scan(src)? {
            TagScan::Done { value, consumed } => (value, consumed),
            TagScan::Incomplete => return Ok(None),
        };
        let size = usize::try_from(size).map_err(|_| WireError::OversizedPacket(usize::MAX))?;
        if size > self.max_payload {
            return Err(WireError::OversizedPacket(size));
        }
        if src.len() < tag_len + size {
            // Ask for the rest of the payload in one go.
            src.reserve(tag_len + size - src.len());
            return Ok(None);
        }
        src.advance(tag_len);
        let payload = src.split_to(size).freeze();
        Ok(Some(Packet { payload }))
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = WireError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), WireError> {
        if item.payload.len() > self.max_payload {
            return Err(WireError::OversizedPacket(item.payload.len()));
        }
        dst.reserve(tag::MAX_TAG_LEN + item.payload.len());
        tag::encode_into(dst, item.payload.len() as u64);
        dst.extend_from_slice(&item.payload);
        Ok(())
    }
}
