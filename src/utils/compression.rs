//! # Compression
//!
//! Optional compression for serialized envelopes, expressed as the level
//! scale the serializer exposes:
//!
//! | level | codec                 |
//! |-------|-----------------------|
//! | 0, 1  | none                  |
//! | 2     | LZ4 (fast)            |
//! | 3     | Zstd level 3 (strong) |
//! | 4     | Zstd level 19 (max)   |
//! | -1    | adaptive: sample entropy, skip incompressible data, LZ4 otherwise |
//!
//! Decompression enforces an output cap to stop decompression bombs.

use crate::core::packet::MAX_PAYLOAD_SIZE;
use crate::error::{Result, WireError};

/// Hard cap on decompressed output.
const MAX_DECOMPRESSION_SIZE: usize = MAX_PAYLOAD_SIZE;

/// Entropy above this (bits per byte) marks data as incompressible.
const MAX_USEFUL_ENTROPY: f64 = 6.5;

/// Bytes sampled for the adaptive entropy estimate.
const ENTROPY_SAMPLE: usize = 512;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Codec {
    Lz4,
    Zstd { level: i32 },
}

impl Codec {
    /// Map a serializer compression level to a codec choice.
    ///
    /// Levels 0/1 and the adaptive level return `None` here; the adaptive
    /// decision needs the data and lives in [`choose_adaptive`].
    pub fn for_level(level: i32) -> Result<Option<Codec>> {
        match level {
            -1 | 0 | 1 => Ok(None),
            2 => Ok(Some(Codec::Lz4)),
            3 => Ok(Some(Codec::Zstd { level: 3 })),
            4 => Ok(Some(Codec::Zstd { level: 19 })),
            other => Err(WireError::ConfigError(format!(
                "compression level out of range: {other} (expected -1..=4)"
            ))),
        }
    }
}

/// Shannon entropy of `data` in bits per byte (0.0 to 8.0).
fn entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut freq = [0u32; 256];
    for &byte in data {
        freq[byte as usize] += 1;
    }
    let len = data.len() as f64;
    let mut bits = 0.0;
    for &count in &freq {
        if count > 0 {
            let p = f64::from(count) / len;
            bits -= p * p.log2();
        }
    }
    bits
}

/// Adaptive codec choice: skip data that a byte-frequency sample says is
/// already close to random (encrypted, compressed, media).
pub fn choose_adaptive(data: &[u8], threshold_bytes: usize) -> Option<Codec> {
    if data.len() < threshold_bytes {
        return None;
    }
    let sample = &data[..data.len().min(ENTROPY_SAMPLE)];
    if entropy(sample) > MAX_USEFUL_ENTROPY {
        return None;
    }
    Some(Codec::Lz4)
}

/// Compress `data` with the given codec.
pub fn compress(data: &[u8], codec: Codec) -> Result<Vec<u8>> {
    match codec {
        Codec::Lz4 => Ok(lz4_flex::compress_prepend_size(data)),
        Codec::Zstd { level } => {
            let mut out = Vec::new();
            zstd::stream::copy_encode(data, &mut out, level)
                .map_err(|_| WireError::CompressionFailure)?;
            Ok(out)
        }
    }
}

/// Decompress `data`, refusing outputs beyond the size cap.
pub fn decompress(data: &[u8], codec: Codec) -> Result<Vec<u8>> {
    match codec {
        Codec::Lz4 => {
            // The claimed output size sits in the first four bytes; check it
            // before lz4_flex allocates anything.
            if data.len() < 4 {
                return Err(WireError::DecompressionFailure);
            }
            let claimed = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
            if claimed > MAX_DECOMPRESSION_SIZE {
                return Err(WireError::DecompressionFailure);
            }
            let out = lz4_flex::decompress_size_prepended(data)
                .map_err(|_| WireError::DecompressionFailure)?;
            if out.len() > MAX_DECOMPRESSION_SIZE {
                return Err(WireError::DecompressionFailure);
            }
            Ok(out)
        }
        Codec::Zstd { .. } => {
            use std::io::Read;
            let mut reader =
                zstd::stream::Decoder::new(data).map_err(|_| WireError::DecompressionFailure)?;
            let mut out = Vec::new();
            let mut buf = [0u8; 8192];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        out.extend_from_slice(&buf[..n]);
                        if out.len() > MAX_DECOMPRESSION_SIZE {
                            return Err(WireError::DecompressionFailure);
                        }
                    }
                    Err(_) => return Err(WireError::DecompressionFailure),
                }
            }
            Ok(out)
        }
    }
}
