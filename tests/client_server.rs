#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Loopback integration tests: a real server and client over TCP.

use bytes::Bytes;
use chunkwire::config::{ClientConfig, FramingConfig, ServerConfig};
use chunkwire::error::WireError;
use chunkwire::protocol::dispatcher::Dispatcher;
use chunkwire::service::{serve_listener, Client};
use chunkwire::transport::tcp;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

struct TestServer {
    address: String,
    shutdown_tx: mpsc::Sender<()>,
    handle: tokio::task::JoinHandle<()>,
}

/// Bind an ephemeral port and serve the given dispatcher on it.
async fn spawn_server(dispatcher: Arc<Dispatcher>) -> TestServer {
    let listener = tcp::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("local_addr").to_string();
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

    let config = ServerConfig {
        address: address.clone(),
        shutdown_timeout: Duration::from_secs(2),
        ..ServerConfig::default()
    };
    let framing = FramingConfig::default();

    let handle = tokio::spawn(async move {
        serve_listener(listener, &config, &framing, dispatcher, shutdown_rx)
            .await
            .expect("server run");
    });

    TestServer {
        address,
        shutdown_tx,
        handle,
    }
}

impl TestServer {
    async fn client(&self) -> Client {
        let config = ClientConfig {
            address: self.address.clone(),
            call_timeout: Duration::from_secs(2),
            ..ClientConfig::default()
        };
        Client::connect(&config, FramingConfig::default().max_payload_size)
            .await
            .expect("connect")
    }

    async fn stop(self) {
        self.shutdown_tx.send(()).await.expect("shutdown signal");
        self.handle.await.expect("server task");
    }
}

fn echo_dispatcher() -> Arc<Dispatcher> {
    let dispatcher = Arc::new(Dispatcher::new());
    dispatcher
        .register("echo", |payload| Ok(payload.to_vec()))
        .expect("register");
    dispatcher
        .register("reverse", |payload| {
            Ok(payload.iter().rev().copied().collect())
        })
        .expect("register");
    dispatcher
        .register("fail", |_| Err(WireError::Remote("handler broke".into())))
        .expect("register");
    dispatcher
}

#[tokio::test]
async fn call_roundtrip() {
    let server = spawn_server(echo_dispatcher()).await;
    let client = server.client().await;

    let reply = client
        .call("echo", Bytes::from_static(b"hello over loopback"))
        .await
        .expect("call");
    assert_eq!(&reply[..], b"hello over loopback");

    client.close().await.expect("close");
    server.stop().await;
}

#[tokio::test]
async fn concurrent_calls_come_back_correlated() {
    let server = spawn_server(echo_dispatcher()).await;
    let client = Arc::new(server.client().await);

    // Fire many overlapping requests; each reply must match its own body.
    let mut tasks = Vec::new();
    for i in 0..50u32 {
        let client = Arc::clone(&client);
        tasks.push(tokio::spawn(async move {
            let body = format!("request number {i}");
            let opcode = if i % 2 == 0 { "echo" } else { "reverse" };
            let reply = client
                .call(opcode, Bytes::from(body.clone().into_bytes()))
                .await
                .expect("call");
            if i % 2 == 0 {
                assert_eq!(&reply[..], body.as_bytes());
            } else {
                let reversed: Vec<u8> = body.bytes().rev().collect();
                assert_eq!(&reply[..], &reversed[..]);
            }
        }));
    }
    for task in tasks {
        task.await.expect("task");
    }

    let client = match Arc::try_unwrap(client) {
        Ok(client) => client,
        Err(_) => panic!("client still shared after tasks joined"),
    };
    client.close().await.expect("close");
    server.stop().await;
}

#[tokio::test]
async fn unknown_opcode_returns_remote_error() {
    let server = spawn_server(echo_dispatcher()).await;
    let client = server.client().await;

    let err = client.call("missing", Bytes::new()).await;
    match err {
        Err(WireError::Remote(reason)) => assert!(reason.contains("missing")),
        other => panic!("expected remote error, got {other:?}"),
    }

    // The connection survives the error.
    let reply = client.call("echo", Bytes::from_static(b"still alive")).await;
    assert_eq!(&reply.expect("call after error")[..], b"still alive");

    client.close().await.expect("close");
    server.stop().await;
}

#[tokio::test]
async fn handler_failure_propagates_as_remote_error() {
    let server = spawn_server(echo_dispatcher()).await;
    let client = server.client().await;

    match client.call("fail", Bytes::new()).await {
        Err(WireError::Remote(reason)) => assert!(reason.contains("handler broke")),
        other => panic!("expected remote error, got {other:?}"),
    }

    client.close().await.expect("close");
    server.stop().await;
}

#[tokio::test]
async fn notify_is_fire_and_forget() {
    let dispatcher = Arc::new(Dispatcher::new());
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    dispatcher
        .register("observe", move |payload| {
            seen_tx.send(payload.to_vec()).ok();
            Ok(Vec::new())
        })
        .expect("register");

    let server = spawn_server(dispatcher).await;
    let client = server.client().await;

    client
        .notify("observe", Bytes::from_static(b"one-way"))
        .await
        .expect("notify");

    let seen = tokio::time::timeout(Duration::from_secs(2), seen_rx.recv())
        .await
        .expect("handler ran")
        .expect("channel open");
    assert_eq!(seen, b"one-way");

    client.close().await.expect("close");
    server.stop().await;
}

#[tokio::test]
async fn ping_does_not_disturb_calls() {
    let server = spawn_server(echo_dispatcher()).await;
    let client = server.client().await;

    client.ping().await.expect("ping");
    let reply = client
        .call("echo", Bytes::from_static(b"after ping"))
        .await
        .expect("call");
    assert_eq!(&reply[..], b"after ping");

    client.close().await.expect("close");
    server.stop().await;
}

#[tokio::test]
async fn call_times_out_against_a_silent_peer() {
    let listener = tcp::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("local_addr").to_string();
    // Accept and hold the socket open without ever responding.
    let silent = tokio::spawn(async move {
        let (_stream, _) = listener.accept().await.expect("accept");
        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    let config = ClientConfig {
        address,
        call_timeout: Duration::from_millis(200),
        ..ClientConfig::default()
    };
    let client = Client::connect(&config, 1024 * 1024).await.expect("connect");

    let err = client.call("echo", Bytes::new()).await;
    assert!(matches!(err, Err(WireError::Timeout)));

    silent.abort();
}

#[tokio::test]
async fn server_drains_and_stops_on_shutdown() {
    let server = spawn_server(echo_dispatcher()).await;
    let client = server.client().await;
    client
        .call("echo", Bytes::from_static(b"before shutdown"))
        .await
        .expect("call");
    client.close().await.expect("close");

    // stop() joins the server task; finishing at all proves the drain loop
    // exits once the connection count reaches zero.
    server.stop().await;
}

#[tokio::test]
async fn panicking_handler_releases_its_connection_slot() {
    let dispatcher = Arc::new(Dispatcher::new());
    dispatcher
        .register("boom", |_| -> Result<Vec<u8>, WireError> {
            panic!("handler exploded")
        })
        .expect("register");
    dispatcher
        .register("echo", |payload| Ok(payload.to_vec()))
        .expect("register");

    let listener = tcp::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("local_addr").to_string();
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let config = ServerConfig {
        address: address.clone(),
        shutdown_timeout: Duration::from_secs(2),
        max_connections: 1,
        ..ServerConfig::default()
    };
    let framing = FramingConfig::default();
    let server = tokio::spawn(async move {
        serve_listener(listener, &config, &framing, dispatcher, shutdown_rx)
            .await
            .expect("server run");
    });

    let client_config = ClientConfig {
        address,
        call_timeout: Duration::from_secs(2),
        ..ClientConfig::default()
    };
    let max_payload = FramingConfig::default().max_payload_size;

    // The handler panic tears down the first connection mid-call.
    let first = Client::connect(&client_config, max_payload)
        .await
        .expect("first connect");
    assert!(first.call("boom", Bytes::new()).await.is_err());
    drop(first);
    tokio::time::sleep(Duration::from_millis(100)).await;

    // The lone slot must be free again for a second client.
    let second = Client::connect(&client_config, max_payload)
        .await
        .expect("second connect");
    let reply = second
        .call("echo", Bytes::from_static(b"still serving"))
        .await
        .expect("call on reused slot");
    assert_eq!(&reply[..], b"still serving");

    second.close().await.expect("close");
    shutdown_tx.send(()).await.expect("shutdown signal");
    server.await.expect("server task");
}

#[tokio::test]
async fn calls_fail_cleanly_when_the_peer_hangs_up() {
    let listener = tcp::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("local_addr").to_string();
    // Accept one connection and drop it straight away.
    let hangup = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        drop(stream);
    });

    let config = ClientConfig {
        address,
        call_timeout: Duration::from_secs(2),
        ..ClientConfig::default()
    };
    let client = Client::connect(&config, 1024 * 1024).await.expect("connect");
    hangup.await.expect("hangup task");

    let err = client.call("echo", Bytes::from_static(b"too late")).await;
    assert!(matches!(
        err,
        Err(WireError::ConnectionClosed | WireError::Timeout | WireError::Io(_))
    ));
}
