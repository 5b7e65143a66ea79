//! # Client Connection
//!
//! A connection with an in-flight call table.
//!
//! `call` assigns a fresh signature, sends a Request, and waits for the
//! Response or Error carrying that signature. A background reader task owns
//! the receive half and routes every reply to its waiting caller, so any
//! number of calls can be in flight concurrently and replies may arrive in
//! any order. An optional heartbeat task pings on an interval to keep idle
//! connections honest.

use crate::config::ClientConfig;
use crate::core::packet::Packet;
use crate::error::{Result, WireError};
use crate::protocol::message::Message;
use crate::transport::tcp::{self, FramedStream};
use crate::utils::timeout::with_timeout;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Bytes>>>>>;

pub struct Client {
    writer: Arc<AsyncMutex<SplitSink<FramedStream, Packet>>>,
    pending: PendingMap,
    next_signature: AtomicU64,
    call_timeout: Duration,
    reader: JoinHandle<()>,
    heartbeat: Option<JoinHandle<()>>,
}

impl Client {
    /// Connect and spawn the reader (and heartbeat, if configured).
    #[instrument(skip(config, max_payload), fields(address = %config.address))]
    pub async fn connect(config: &ClientConfig, max_payload: usize) -> Result<Self> {
        let framed = with_timeout(
            tcp::connect(&config.address, max_payload),
            config.connect_timeout,
        )
        .await?;
        let (sink, stream) = framed.split();
        let writer = Arc::new(AsyncMutex::new(sink));
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        let reader = tokio::spawn(read_loop(stream, Arc::clone(&pending)));

        let heartbeat = if config.heartbeat_interval.is_zero() {
            None
        } else {
            Some(tokio::spawn(heartbeat_loop(
                Arc::clone(&writer),
                config.heartbeat_interval,
            )))
        };

        Ok(Client {
            writer,
            pending,
            next_signature: AtomicU64::new(1),
            call_timeout: config.call_timeout,
            reader,
            heartbeat,
        })
    }

    /// Send a correlated request and wait for its reply.
    #[instrument(skip(self, payload), fields(payload_len = payload.len()))]
    pub async fn call(&self, opcode: &str, payload: Bytes) -> Result<Bytes> {
        let signature = self.next_signature.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().map_err(|_| WireError::LockPoisoned)?;
            pending.insert(signature, tx);
        }

        let msg = Message::Request {
            signature,
            opcode: opcode.to_string(),
            payload,
        };
        if let Err(e) = self.send(msg).await {
            self.forget(signature);
            return Err(e);
        }

        let reply = with_timeout(
            async {
                rx.await.map_err(|_| WireError::ConnectionClosed)?
            },
            self.call_timeout,
        )
        .await;
        if reply.is_err() {
            self.forget(signature);
        }
        reply
    }

    /// Send a fire-and-forget notification.
    pub async fn notify(&self, opcode: &str, payload: Bytes) -> Result<()> {
        self.send(Message::Notify {
            opcode: opcode.to_string(),
            payload,
        })
        .await
    }

    /// Send one unsolicited ping.
    pub async fn ping(&self) -> Result<()> {
        self.send(Message::Ping).await
    }

    /// Announce departure and tear the connection down.
    pub async fn close(self) -> Result<()> {
        let result = self.send(Message::Disconnect).await;
        self.reader.abort();
        if let Some(hb) = &self.heartbeat {
            hb.abort();
        }
        result
    }

    async fn send(&self, msg: Message) -> Result<()> {
        let packet = Packet::new(msg.encode());
        let mut writer = self.writer.lock().await;
        writer.send(packet).await
    }

    fn forget(&self, signature: u64) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&signature);
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.reader.abort();
        if let Some(hb) = &self.heartbeat {
            hb.abort();
        }
    }
}

/// Route inbound replies to their waiting callers by signature.
async fn read_loop(mut stream: SplitStream<FramedStream>, pending: PendingMap) {
    while let Some(item) = stream.next().await {
        let packet = match item {
            Ok(packet) => packet,
            Err(e) => {
                warn!(error = %e, "read failed, closing connection");
                break;
            }
        };
        let msg = match Message::decode(packet.payload) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, "undecodable message, closing connection");
                break;
            }
        };
        match msg {
            Message::Response { signature, payload } => {
                complete(&pending, signature, Ok(payload));
            }
            Message::Error { signature, reason } => {
                complete(&pending, signature, Err(WireError::Remote(reason)));
            }
            Message::Pong => debug!("pong"),
            Message::Disconnect => break,
            other => warn!(?other, "unexpected message on client connection"),
        }
    }

    // Whatever is still in flight will never be answered.
    if let Ok(mut pending) = pending.lock() {
        for (_, tx) in pending.drain() {
            let _ = tx.send(Err(WireError::ConnectionClosed));
        }
    }
}

fn complete(pending: &PendingMap, signature: u64, result: Result<Bytes>) {
    let tx = match pending.lock() {
        Ok(mut map) => map.remove(&signature),
        Err(_) => None,
    };
    match tx {
        Some(tx) => {
            let _ = tx.send(result);
        }
        None => warn!(signature, "reply with no waiting call"),
    }
}

async fn heartbeat_loop(
    writer: Arc<AsyncMutex<SplitSink<FramedStream, Packet>>>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await; // first tick fires immediately; skip it
    loop {
        ticker.tick().await;
        let packet = Packet::new(Message::Ping.encode());
        let mut writer = writer.lock().await;
        if writer.send(packet).await.is_err() {
            debug!("heartbeat send failed, stopping");
            break;
        }
    }
}
