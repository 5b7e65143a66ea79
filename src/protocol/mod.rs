//! # Protocol Layer
//!
//! Message types carried inside packets, and the handler registry that
//! routes inbound requests.

pub mod dispatcher;
pub mod message;
