//! # Core Wire Components
//!
//! Size tags, chunk reshaping, packet framing, and the value codec.
//!
//! ## Components
//! - **tag**: variable-length size-tag integers, every length prefix on the wire
//! - **chunk**: exact-byte extraction, fixed-size reflow, frame/deframe
//! - **packet**: the length-prefixed transfer unit
//! - **codec**: tokio codec streaming packets over a byte transport
//! - **value**: the recursive tagged-union codec
//! - **serialization**: envelopes with optional compression and encryption
//!
//! ## Security
//! - Claimed sizes validated before allocation (16 MiB default cap)
//! - Decompression output capped against bombs
//! - Value decoding depth-limited against stack abuse

pub mod chunk;
pub mod codec;
pub mod packet;
pub mod serialization;
pub mod tag;
pub mod value;
