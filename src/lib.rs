//! # chunkwire
//!
//! Framed packet protocol with chunked serialization.
//!
//! The crate has four layers, bottom to top:
//!
//! - **[`core::tag`]**: variable-length size tags, the only length encoding
//!   on the wire
//! - **[`core::chunk`]**: reshaping byte-chunk streams: exact extraction,
//!   fixed-size reflow, frame/deframe
//! - **[`core::value`]** and **[`core::serialization`]**: a compact
//!   recursive codec for a small tagged union, wrapped in envelopes with
//!   optional compression and encryption
//! - **[`protocol`]**, **[`transport`]** and **[`service`]**:
//!   length-prefixed packets over TCP carrying signature-correlated
//!   request/response messages
//!
//! ## Quick start
//! ```no_run
//! use chunkwire::config::WireConfig;
//! use chunkwire::protocol::dispatcher::Dispatcher;
//! use chunkwire::service::Client;
//! use bytes::Bytes;
//! use std::sync::Arc;
//!
//! # async fn run() -> chunkwire::error::Result<()> {
//! let config = WireConfig::default();
//!
//! // Server side
//! let dispatcher = Arc::new(Dispatcher::new());
//! dispatcher.register("reverse", |payload| {
//!     Ok(payload.iter().rev().copied().collect())
//! })?;
//! tokio::spawn({
//!     let config = config.clone();
//!     async move {
//!         chunkwire::service::serve(&config.server, &config.wire, dispatcher).await
//!     }
//! });
//!
//! // Client side
//! let client = Client::connect(&config.client, config.wire.max_payload_size).await?;
//! let reply = client.call("reverse", Bytes::from_static(b"abc")).await?;
//! assert_eq!(&reply[..], b"cba");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use crate::core::packet::Packet;
pub use crate::core::serialization::{deserialize, serialize, SerializeOpts};
pub use crate::core::value::Value;
pub use crate::error::{Result, WireError};
pub use crate::protocol::message::Message;