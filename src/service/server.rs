//! # Server
//!
//! Accept loop with per-connection tasks and graceful shutdown.
//!
//! Each connection gets its own task that decodes messages and routes
//! Requests and Notifies through the shared [`Dispatcher`]. Handler results
//! travel back as Response or Error messages under the request's signature;
//! Pings are answered with Pongs. On shutdown the listener stops accepting
//! and waits for live connections to drain, up to the configured grace
//! period.

use crate::config::{FramingConfig, ServerConfig};
use crate::core::packet::Packet;
use crate::error::Result;
use crate::protocol::dispatcher::Dispatcher;
use crate::protocol::message::Message;
use crate::transport::tcp;
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

/// One occupied slot in the connection count, released on drop.
struct ConnectionSlot(Arc<AtomicU32>);

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Serve until ctrl-c.
#[instrument(skip_all, fields(address = %config.address))]
pub async fn serve(
    config: &ServerConfig,
    framing: &FramingConfig,
    dispatcher: Arc<Dispatcher>,
) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            info!("received ctrl-c, shutting down");
            let _ = shutdown_tx.send(()).await;
        }
    });

    serve_with_shutdown(config, framing, dispatcher, shutdown_rx).await
}

/// Serve until the shutdown channel fires.
#[instrument(skip_all, fields(address = %config.address))]
pub async fn serve_with_shutdown(
    config: &ServerConfig,
    framing: &FramingConfig,
    dispatcher: Arc<Dispatcher>,
    shutdown_rx: mpsc::Receiver<()>,
) -> Result<()> {
    let listener = tcp::bind(&config.address).await?;
    serve_listener(listener, config, framing, dispatcher, shutdown_rx).await
}

/// Serve on an already-bound listener until the shutdown channel fires.
pub async fn serve_listener(
    listener: tokio::net::TcpListener,
    config: &ServerConfig,
    framing: &FramingConfig,
    dispatcher: Arc<Dispatcher>,
    mut shutdown_rx: mpsc::Receiver<()>,
) -> Result<()> {
    let active_connections = Arc::new(AtomicU32::new(0));

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("shutting down, waiting for connections to drain");

                let deadline = tokio::time::sleep(config.shutdown_timeout);
                tokio::pin!(deadline);

                loop {
                    tokio::select! {
                        _ = &mut deadline => {
                            warn!("shutdown grace period elapsed, forcing exit");
                            break;
                        }
                        _ = tokio::time::sleep(Duration::from_millis(100)) => {
                            let connections = active_connections.load(Ordering::Acquire);
                            if connections == 0 {
                                info!("all connections drained");
                                break;
                            }
                            debug!(connections, "still draining");
                        }
                    }
                }

                return Ok(());
            }

            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer)) => {
                        let connections =
                            active_connections.fetch_add(1, Ordering::AcqRel) + 1;
                        if connections as usize > config.max_connections {
                            active_connections.fetch_sub(1, Ordering::AcqRel);
                            warn!(peer = %peer, "connection limit reached, refusing");
                            continue;
                        }
                        info!(peer = %peer, connections, "connection accepted");

                        let dispatcher = Arc::clone(&dispatcher);
                        let slot = ConnectionSlot(Arc::clone(&active_connections));
                        let max_payload = framing.max_payload_size;

                        tokio::spawn(async move {
                            // Held for the life of the task: the slot is
                            // released even when a handler panics.
                            let _slot = slot;
                            if let Err(e) =
                                handle_connection(stream, max_payload, dispatcher).await
                            {
                                warn!(peer = %peer, error = %e, "connection ended with error");
                            }
                            info!(peer = %peer, "connection closed");
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "accept failed");
                    }
                }
            }
        }
    }
}

/// Decode, route, reply. Returns when the peer disconnects.
async fn handle_connection(
    stream: TcpStream,
    max_payload: usize,
    dispatcher: Arc<Dispatcher>,
) -> Result<()> {
    stream.set_nodelay(true)?;
    let mut framed = tcp::framed(stream, max_payload);

    while let Some(item) = framed.next().await {
        let packet = item?;
        let msg = Message::decode(packet.payload)?;
        match msg {
            Message::Request {
                signature,
                opcode,
                payload,
            } => {
                debug!(signature, opcode = %opcode, "request");
                let reply = match dispatcher.dispatch(&Message::Request {
                    signature,
                    opcode,
                    payload,
                }) {
                    Ok(body) => Message::Response {
                        signature,
                        payload: body.into(),
                    },
                    Err(e) => Message::Error {
                        signature,
                        reason: e.to_string(),
                    },
                };
                framed.send(Packet::new(reply.encode())).await?;
            }
            Message::Notify { opcode, payload } => {
                debug!(opcode = %opcode, "notify");
                if let Err(e) = dispatcher.dispatch(&Message::Notify { opcode, payload }) {
                    // Fire-and-forget: nothing to send back, just record it.
                    warn!(error = %e, "notify handler failed");
                }
            }
            Message::Ping => {
                framed.send(Packet::new(Message::Pong.encode())).await?;
            }
            Message::Disconnect => {
                debug!("peer disconnected cleanly");
                break;
            }
            other => {
                warn!(?other, "unexpected message on server connection, ignoring");
            }
        }
    }
    Ok(())
}
