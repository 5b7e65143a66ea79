//! # Messages
//!
//! What travels inside a packet payload.
//!
//! ## Wire Format
//! One kind byte, then kind-specific fields. Variable-length fields are
//! "segments" (size tag + bytes); signatures reuse the size-tag encoding as
//! a plain integer codec.
//!
//! ```text
//! 01 [sig][opcode seg][payload seg]   Request
//! 02 [sig][payload seg]               Response
//! 03 [sig][reason seg]                Error
//! 04 [opcode seg][payload seg]        Notify
//! 05                                  Ping
//! 06                                  Pong
//! 07                                  Disconnect
//! ```
//!
//! The signature correlates a Response or Error with its Request; any number
//! of requests may be in flight on one connection at a time.

use crate::core::chunk::ChunkSource;
use crate::core::tag;
use crate::error::{Result, WireError};
use bytes::{Bytes, BytesMut};

const KIND_REQUEST: u8 = 0x01;
const KIND_RESPONSE: u8 = 0x02;
const KIND_ERROR: u8 = 0x03;
const KIND_NOTIFY: u8 = 0x04;
const KIND_PING: u8 = 0x05;
const KIND_PONG: u8 = 0x06;
const KIND_DISCONNECT: u8 = 0x07;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A correlated call: the peer must answer with the same signature.
    Request {
        signature: u64,
        opcode: String,
        payload: Bytes,
    },
    Response {
        signature: u64,
        payload: Bytes,
    },
    /// Handler failure travelling back to the caller.
    Error {
        signature: u64,
        reason: String,
    },
    /// Fire-and-forget: routed like a request, never answered.
    Notify {
        opcode: String,
        payload: Bytes,
    },
    Ping,
    Pong,
    Disconnect,
}

fn put_segment(buf: &mut BytesMut, bytes: &[u8]) {
    tag::encode_into(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

impl Message {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        match self {
            Message::Request {
                signature,
                opcode,
                payload,
            } => {
                buf.extend_from_slice(&[KIND_REQUEST]);
                tag::encode_into(&mut buf, *signature);
                put_segment(&mut buf, opcode.as_bytes());
                put_segment(&mut buf, payload);
            }
            Message::Response { signature, payload } => {
                buf.extend_from_slice(&[KIND_RESPONSE]);
                tag::encode_into(&mut buf, *signature);
                put_segment(&mut buf, payload);
            }
            Message::Error { signature, reason } => {
                buf.extend_from_slice(&[KIND_ERROR]);
                tag::encode_into(&mut buf, *signature);
                put_segment(&mut buf, reason.as_bytes());
            }
            Message::Notify { opcode, payload } => {
                buf.extend_from_slice(&[KIND_NOTIFY]);
                put_segment(&mut buf, opcode.as_bytes());
                put_segment(&mut buf, payload);
            }
            Message::Ping => buf.extend_from_slice(&[KIND_PING]),
            Message::Pong => buf.extend_from_slice(&[KIND_PONG]),
            Message::Disconnect => buf.extend_from_slice(&[KIND_DISCONNECT]),
        }
        buf.freeze()
    }

    pub fn decode(data: Bytes) -> Result<Message> {
        let mut src = ChunkSource::single(data);
        let kind = src.take(1)?[0];
        let msg = match kind {
            KIND_REQUEST => Message::Request {
                signature: take_signature(&mut src)?,
                opcode: take_string(&mut src)?,
                payload: take_segment(&mut src)?,
            },
            KIND_RESPONSE => Message::Response {
                signature: take_signature(&mut src)?,
                payload: take_segment(&mut src)?,
            },
            KIND_ERROR => Message::Error {
                signature: take_signature(&mut src)?,
                reason: take_string(&mut src)?,
            },
            KIND_NOTIFY => Message::Notify {
                opcode: take_string(&mut src)?,
                payload: take_segment(&mut src)?,
            },
            KIND_PING => Message::Ping,
            KIND_PONG => Message::Pong,
            KIND_DISCONNECT => Message::Disconnect,
            other => return Err(WireError::UnknownMessageKind(other)),
        };
        if !src.is_exhausted() {
            return Err(WireError::TruncatedChunk {
                expected: 0,
                available: src.buffered(),
            });
        }
        Ok(msg)
    }

    /// Signature of a Response or Error, if the message carries one the
    /// receiver should correlate against.
    pub fn reply_signature(&self) -> Option<u64> {
        match self {
            Message::Response { signature, .. } | Message::Error { signature, .. } => {
                Some(*signature)
            }
            _ => None,
        }
    }
}

fn take_signature<I: Iterator<Item = Bytes>>(src: &mut ChunkSource<I>) -> Result<u64> {
    src.next_tag()?.ok_or(WireError::IncompleteTag)
}

fn take_segment<I: Iterator<Item = Bytes>>(src: &mut ChunkSource<I>) -> Result<Bytes> {
    let len = take_signature(src)?;
    let len = usize::try_from(len).map_err(|_| WireError::OversizedPacket(usize::MAX))?;
    src.take(len)
}

fn take_string<I: Iterator<Item = Bytes>>(src: &mut ChunkSource<I>) -> Result<String> {
    let bytes = take_segment(src)?;
    Ok(String::from_utf8(bytes.to_vec())?)
}
