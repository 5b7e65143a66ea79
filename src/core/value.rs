//! # Value Codec
//!
//! Compact, self-delimiting binary encoding for a small tagged union of
//! wire values.
//!
//! ## Wire Format
//! Each value starts with one type-tag byte. `None`, `false` and `true` are
//! that byte alone; everything else follows with a size tag and a payload:
//!
//! ```text
//! 00                         none
//! 01 / 02                    false / true
//! 03 [tag][minimal i64 BE]   int (two's complement, no redundant bytes)
//! 04 [tag=8][f64 BE]         float
//! 05 [tag][bytes]            bytes
//! 06 [tag][utf-8]            str
//! 07 [tag][children...]      list (payload is concatenated child encodings)
//! ```
//!
//! Integers encode minimally: zero is an empty payload, and a leading byte
//! is only present when it carries sign or magnitude information. Decoding
//! tolerates non-minimal (sign-extended) forms.

use crate::error::{Result, WireError};
use crate::core::tag;
use bytes::{Buf, Bytes, BytesMut};

const TAG_NONE: u8 = 0x00;
const TAG_FALSE: u8 = 0x01;
const TAG_TRUE: u8 = 0x02;
const TAG_INT: u8 = 0x03;
const TAG_FLOAT: u8 = 0x04;
const TAG_BYTES: u8 = 0x05;
const TAG_STR: u8 = 0x06;
const TAG_LIST: u8 = 0x07;

/// Nesting limit for decoding; hostile input must not exhaust the stack.
pub const MAX_DEPTH: usize = 128;

/// A wire value: the tagged union the serializer works over.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Bytes(Bytes),
    Str(String),
    List(Vec<Value>),
}

impl Value {
    /// Encode into `buf`.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        match self {
            Value::None => buf.extend_from_slice(&[TAG_NONE]),
            Value::Bool(false) => buf.extend_from_slice(&[TAG_FALSE]),
            Value::Bool(true) => buf.extend_from_slice(&[TAG_TRUE]),
            Value::Int(n) => {
                let body = encode_int(*n);
                buf.extend_from_slice(&[TAG_INT]);
                tag::encode_into(buf, body.len() as u64);
                buf.extend_from_slice(&body);
            }
            Value::Float(f) => {
                buf.extend_from_slice(&[TAG_FLOAT]);
                tag::encode_into(buf, 8);
                buf.extend_from_slice(&f.to_be_bytes());
            }
            Value::Bytes(b) => {
                buf.extend_from_slice(&[TAG_BYTES]);
                tag::encode_into(buf, b.len() as u64);
                buf.extend_from_slice(b);
            }
            Value::Str(s) => {
                buf.extend_from_slice(&[TAG_STR]);
                tag::encode_into(buf, s.len() as u64);
                buf.extend_from_slice(s.as_bytes());
            }
            Value::List(items) => {
                let mut body = BytesMut::new();
                for item in items {
                    item.encode_into(&mut body);
                }
                buf.extend_from_slice(&[TAG_LIST]);
                tag::encode_into(buf, body.len() as u64);
                buf.extend_from_slice(&body);
            }
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode_into(&mut buf);
        buf.freeze()
    }

    /// Decode one value, consuming exactly its encoding from `data`.
    pub fn decode_from(data: &mut Bytes) -> Result<Value> {
        decode_at_depth(data, 0)
    }

    /// Decode a buffer that holds exactly one value.
    pub fn decode(data: &[u8]) -> Result<Value> {
        let mut buf = Bytes::copy_from_slice(data);
        let value = decode_at_depth(&mut buf, 0)?;
        if !buf.is_empty() {
            return Err(WireError::TruncatedChunk {
                expected: 0,
                available: buf.len(),
            });
        }
        Ok(value)
    }
}

/// Minimal two's-complement big-endian representation of `n`.
fn encode_int(n: i64) -> Vec<u8> {
    if n == 0 {
        return Vec::new();
    }
    let full = n.to_be_bytes();
    // Drop sign-extension bytes: a leading byte is redundant when it equals
    // the sign fill and the next byte already carries the sign bit.
    let fill = if n < 0 { 0xFF } else { 0x00 };
    let mut start = 0;
    while start < 7 && full[start] == fill && (full[start + 1] & 0x80) == (fill & 0x80) {
        start += 1;
    }
    full[start..].to_vec()
}

fn decode_int(body: &[u8]) -> Result<i64> {
    if body.is_empty() {
        return Ok(0);
    }
    if body.len() > 8 {
        return Err(WireError::IntOverflow(body.len()));
    }
    let fill = if body[0] & 0x80 != 0 { 0xFF } else { 0x00 };
    let mut full = [fill; 8];
    full[8 - body.len()..].copy_from_slice(body);
    Ok(i64::from_be_bytes(full))
}

fn decode_at_depth(data: &mut Bytes, depth: usize) -> Result<Value> {
    if depth > MAX_DEPTH {
        return Err(WireError::DepthLimit);
    }
    if data.is_empty() {
        return Err(WireError::TruncatedChunk {
            expected: 1,
            available: 0,
        });
    }
    let type_tag = data[0];
    data.advance(1);
    match type_tag {
        TAG_NONE => Ok(Value::None),
        TAG_FALSE => Ok(Value::Bool(false)),
        TAG_TRUE => Ok(Value::Bool(true)),
        TAG_INT => {
            let body = take_segment(data)?;
            Ok(Value::Int(decode_int(&body)?))
        }
        TAG_FLOAT => {
            let body = take_segment(data)?;
            if body.len() != 8 {
                return Err(WireError::BadFloatWidth(body.len()));
            }
            let mut be = [0u8; 8];
            be.copy_from_slice(&body);
            Ok(Value::Float(f64::from_be_bytes(be)))
        }
        TAG_BYTES => Ok(Value::Bytes(take_segment(data)?)),
        TAG_STR => {
            let body = take_segment(data)?;
            Ok(Value::Str(String::from_utf8(body.to_vec())?))
        }
        TAG_LIST => {
            let mut body = take_segment(data)?;
            let mut items = Vec::new();
            while !body.is_empty() {
                items.push(decode_at_depth(&mut body, depth + 1)?);
            }
            Ok(Value::List(items))
        }
        other => Err(WireError::UnknownValueTag(other)),
    }
}

/// Read a size tag and split off that many bytes.
fn take_segment(data: &mut Bytes) -> Result<Bytes> {
    let (len, consumed) = tag::decode(data)?;
    data.advance(consumed);
    let len = usize::try_from(len).map_err(|_| WireError::OversizedPacket(usize::MAX))?;
    if data.len() < len {
        return Err(WireError::TruncatedChunk {
            expected: len,
            available: data.len(),
        });
    }
    Ok(data.split_to(len))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(v: Value) {
        let encoded = v.encode();
        assert_eq!(Value::decode(&encoded).unwrap(), v);
    }

    #[test]
    fn scalars_roundtrip() {
        roundtrip(Value::None);
        roundtrip(Value::Bool(true));
        roundtrip(Value::Bool(false));
        roundtrip(Value::Float(0.0));
        roundtrip(Value::Float(-1234.5678));
        roundtrip(Value::Str(String::new()));
        roundtrip(Value::Str("héllo wörld".to_string()));
        roundtrip(Value::Bytes(Bytes::from_static(b"\x00\xFFraw")));
    }

    #[test]
    fn int_edge_values_roundtrip() {
        for n in [
            0i64,
            1,
            -1,
            127,
            128,
            -128,
            -129,
            255,
            256,
            i64::MAX,
            i64::MIN,
        ] {
            roundtrip(Value::Int(n));
        }
    }

    #[test]
    fn int_encoding_is_minimal() {
        assert!(encode_int(0).is_empty());
        assert_eq!(encode_int(1), vec![0x01]);
        assert_eq!(encode_int(-1), vec![0xFF]);
        assert_eq!(encode_int(127), vec![0x7F]);
        // 128 needs a sign byte to stay positive.
        assert_eq!(encode_int(128), vec![0x00, 0x80]);
        assert_eq!(encode_int(-128), vec![0x80]);
        assert_eq!(encode_int(i64::MIN), i64::MIN.to_be_bytes().to_vec());
    }

    #[test]
    fn non_minimal_int_still_decodes() {
        assert_eq!(decode_int(&[0x00, 0x00, 0x01]).unwrap(), 1);
        assert_eq!(decode_int(&[0xFF, 0xFF, 0xFF]).unwrap(), -1);
    }

    #[test]
    fn overlong_int_rejected() {
        let body = [0u8; 9];
        assert!(matches!(decode_int(&body), Err(WireError::IntOverflow(9))));
    }

    #[test]
    fn nested_lists_roundtrip() {
        roundtrip(Value::List(vec![
            Value::Int(1),
            Value::List(vec![Value::Str("inner".into()), Value::None]),
            Value::Bool(true),
            Value::List(vec![]),
        ]));
    }

    #[test]
    fn hostile_nesting_hits_depth_limit() {
        // Build MAX_DEPTH + 2 nested lists by wrapping from the inside out.
        let mut encoded = Value::None.encode().to_vec();
        for _ in 0..MAX_DEPTH + 2 {
            let mut outer = BytesMut::new();
            outer.extend_from_slice(&[TAG_LIST]);
            tag::encode_into(&mut outer, encoded.len() as u64);
            outer.extend_from_slice(&encoded);
            encoded = outer.to_vec();
        }
        assert!(matches!(
            Value::decode(&encoded),
            Err(WireError::DepthLimit)
        ));
    }

    #[test]
    fn unknown_tag_rejected() {
        assert!(matches!(
            Value::decode(&[0x42]),
            Err(WireError::UnknownValueTag(0x42))
        ));
    }

    #[test]
    fn trailing_garbage_rejected() {
        let mut encoded = Value::Int(7).encode().to_vec();
        encoded.push(0x00);
        assert!(Value::decode(&encoded).is_err());
    }

    #[test]
    fn float_width_enforced() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[TAG_FLOAT]);
        tag::encode_into(&mut buf, 4);
        buf.extend_from_slice(&[0, 0, 0, 0]);
        assert!(matches!(
            Value::decode(&buf),
            Err(WireError::BadFloatWidth(4))
        ));
    }

    #[test]
    fn nan_roundtrips_as_nan() {
        let encoded = Value::Float(f64::NAN).encode();
        match Value::decode(&encoded).unwrap() {
            Value::Float(f) => assert!(f.is_nan()),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
