//! # Service Layer
//!
//! The client with correlated calls and the dispatching server loop.

pub mod client;
pub mod server;

pub use client::Client;
pub use server::{serve, serve_listener, serve_with_shutdown};
