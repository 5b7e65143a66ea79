//! TCP transport: framed streams over `tokio::net::TcpStream`.

use crate::core::codec::PacketCodec;
use crate::error::Result;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;
use tracing::{info, instrument};

/// A packet-framed TCP stream.
pub type FramedStream = Framed<TcpStream, PacketCodec>;

/// Connect to a remote peer and frame the stream.
#[instrument(skip(max_payload))]
pub async fn connect(addr: &str, max_payload: usize) -> Result<FramedStream> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    info!(peer = %addr, "connected");
    Ok(Framed::new(stream, PacketCodec::new(max_payload)))
}

/// Bind a listener for the server accept loop.
pub async fn bind(addr: &str) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    info!(address = %addr, "listening");
    Ok(listener)
}

/// Frame an already-accepted stream.
pub fn framed(stream: TcpStream, max_payload: usize) -> FramedStream {
    Framed::new(stream, PacketCodec::new(max_payload))
}
