//! # Transport Layer
//!
//! Byte transports wrapped with the packet codec.

pub mod tcp;
