//! # Utility Modules
//!
//! Supporting utilities for compression, envelope encryption, logging, and
//! timeouts.
//!
//! ## Components
//! - **Compression**: LZ4 and Zstd behind the serializer's level scale, with
//!   decompression size caps
//! - **Crypto**: XChaCha20-Poly1305 envelope sealing
//! - **Logging**: tracing subscriber setup from configuration
//! - **Timeout**: async deadline wrappers and default durations

pub mod compression;
pub mod crypto;
pub mod logging;
pub mod timeout;
