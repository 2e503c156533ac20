//! TCP stream transport

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use super::Transport;
use crate::{LinkError, Result};

const READ_BUFFER_SIZE: usize = 4096;

/// Client side of a TCP link.
pub struct TcpTransport {
    stream: TcpStream,
    buffer: BytesMut,
    peer: String,
}

impl TcpTransport {
    /// Connect to `host:port`.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let peer = format!("{host}:{port}");
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| LinkError::transport_io(format!("TCP connect to {peer} failed"), e))?;
        stream.set_nodelay(true)?;
        debug!("TCP connected to {}", peer);
        Ok(Self::from_stream(stream, peer))
    }

    /// Wrap an already connected stream.
    pub fn from_stream(stream: TcpStream, peer: String) -> Self {
        Self { stream, buffer: BytesMut::with_capacity(READ_BUFFER_SIZE), peer }
    }
}

#[async_trait::async_trait]
impl Transport for TcpTransport {
    async fn recv(&mut self) -> Result<Option<Bytes>> {
        self.buffer.reserve(READ_BUFFER_SIZE);
        // read_buf is cancel safe: no bytes are consumed unless it completes
        let read = self
            .stream
            .read_buf(&mut self.buffer)
            .await
            .map_err(|e| LinkError::transport_io(format!("TCP receive from {} failed", self.peer), e))?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(self.buffer.split().freeze()))
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream
            .write_all(bytes)
            .await
            .map_err(|e| LinkError::transport_io(format!("TCP send to {} failed", self.peer), e))
    }

    async fn close(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("TCP://{}", self.peer)
    }
}
