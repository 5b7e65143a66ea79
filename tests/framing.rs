#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Edge-case tests for size tags, packets, and the streaming codec.

use bytes::{Bytes, BytesMut};
use chunkwire::core::codec::PacketCodec;
use chunkwire::core::packet::{Packet, MAX_PAYLOAD_SIZE};
use chunkwire::core::tag;
use chunkwire::error::WireError;
use tokio_util::codec::{Decoder, Encoder};

// ============================================================================
// SIZE TAG EDGE CASES
// ============================================================================

#[test]
fn tag_reference_vectors() {
    // Normative vectors for the wire format.
    let vectors: &[(u64, &[u8])] = &[
        (0, &[0x80]),
        (1, &[0x81]),
        (127, &[0xFF]),
        (128, &[0x01, 0x80]),
        (1 << 21, &[0x01, 0x00, 0x00, 0x80]),
    ];
    for &(value, bytes) in vectors {
        assert_eq!(&tag::encode(value)[..], bytes, "encode {value}");
        let (decoded, consumed) = tag::decode(bytes).expect("decode");
        assert_eq!(decoded, value);
        assert_eq!(consumed, bytes.len());
    }
}

#[test]
fn tag_exhaustive_two_byte_range() {
    // Everything representable in two tag bytes roundtrips.
    for value in 0u64..=16_383 {
        let bytes = tag::encode(value);
        assert!(bytes.len() <= 2);
        assert_eq!(tag::decode(&bytes).unwrap().0, value);
    }
}

// ============================================================================
// PACKET EDGE CASES
// ============================================================================

#[test]
fn packet_empty_payload() {
    let packet = Packet::new(Bytes::new());
    let bytes = packet.to_bytes();
    let decoded = Packet::from_bytes(&bytes).expect("should decode empty payload");
    assert_eq!(decoded.payload.len(), 0);
}

#[test]
fn packet_payload_exactly_max() {
    let payload = vec![0x7E; MAX_PAYLOAD_SIZE];
    let packet = Packet::new(Bytes::from(payload));
    let bytes = packet.to_bytes();
    let decoded = Packet::from_bytes(&bytes).expect("should decode max boundary");
    assert_eq!(decoded.payload.len(), MAX_PAYLOAD_SIZE);
}

#[test]
fn packet_payload_one_more_than_max_fails() {
    let packet = Packet::new(Bytes::from(vec![0xFF; MAX_PAYLOAD_SIZE + 1]));
    let bytes = packet.to_bytes();
    let result = Packet::from_bytes(&bytes);
    assert!(matches!(result, Err(WireError::OversizedPacket(_))));
}

#[test]
fn packet_oversized_claim_rejected() {
    // A header claiming 20 MiB with almost no data behind it.
    let mut bad = tag::encode(20 * 1024 * 1024);
    bad.extend_from_slice(&[0xFF; 10]);
    match Packet::from_bytes(&bad) {
        Err(WireError::OversizedPacket(n)) => assert_eq!(n, 20 * 1024 * 1024),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn packet_empty_buffer_rejected() {
    assert!(matches!(
        Packet::from_bytes(&[]),
        Err(WireError::IncompleteTag)
    ));
}

#[test]
fn packet_roundtrip_large_payload() {
    let large = vec![0x42; 5 * 1024 * 1024];
    let packet = Packet::new(Bytes::from(large.clone()));
    let decoded = Packet::from_bytes(&packet.to_bytes()).expect("roundtrip");
    assert_eq!(&decoded.payload[..], &large[..]);
}

// ============================================================================
// STREAMING CODEC
// ============================================================================

#[test]
fn codec_byte_at_a_time_delivery() {
    // Feed a packet one byte at a time; the decoder must never mis-frame.
    let mut codec = PacketCodec::default();
    let mut full = BytesMut::new();
    codec
        .encode(Packet::new(Bytes::from_static(b"drip fed payload")), &mut full)
        .unwrap();

    let mut buf = BytesMut::new();
    let mut decoded = None;
    for (i, &byte) in full.iter().enumerate() {
        buf.extend_from_slice(&[byte]);
        match codec.decode(&mut buf).unwrap() {
            Some(packet) => {
                assert_eq!(i, full.len() - 1, "decoded before the final byte");
                decoded = Some(packet);
            }
            None => assert!(i < full.len() - 1),
        }
    }
    assert_eq!(&decoded.unwrap().payload[..], b"drip fed payload");
}

#[test]
fn codec_many_packets_in_one_read() {
    let mut codec = PacketCodec::default();
    let mut buf = BytesMut::new();
    for i in 0..100u32 {
        let payload = i.to_be_bytes().repeat(i as usize % 7 + 1);
        codec.encode(Packet::new(Bytes::from(payload)), &mut buf).unwrap();
    }
    let mut count = 0;
    while let Some(packet) = codec.decode(&mut buf).unwrap() {
        assert!(!packet.payload.is_empty());
        count += 1;
    }
    assert_eq!(count, 100);
    assert!(buf.is_empty());
}

#[test]
fn codec_corrupt_tag_is_fatal() {
    let mut codec = PacketCodec::default();
    // Eleven continuation bytes cannot be a valid tag.
    let mut buf = BytesMut::from(&[0x7Fu8; 11][..]);
    assert!(matches!(
        codec.decode(&mut buf),
        Err(WireError::CorruptTag)
    ));
}

#[test]
fn codec_stress_sizes() {
    // Burst of packets across the size spectrum; no panics, exact framing.
    let mut codec = PacketCodec::default();
    let mut buf = BytesMut::new();
    for size in [0usize, 1, 64, 512, 4096, 65536, 1_048_576] {
        for _ in 0..50 {
            let p = Packet::new(Bytes::from(vec![0u8; size]));
            codec.encode(p, &mut buf).unwrap();
            let decoded = codec.decode(&mut buf).unwrap().expect("whole packet");
            assert_eq!(decoded.payload.len(), size);
            assert!(buf.is_empty());
        }
    }
}
