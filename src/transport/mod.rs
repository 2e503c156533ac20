//! Byte transports a session runs over.
//!
//! A [`Transport`] moves raw bytes; framing is left to
//! [`MavlinkCodec`](crate::protocol::MavlinkCodec). A [`Connector`] opens a
//! transport for a [`LinkEndpoint`], which lets tests swap the socket layer for
//! an in-memory one.

mod tcp;
mod udp;

pub use tcp::TcpTransport;
pub use udp::UdpTransport;

use bytes::Bytes;

use crate::Result;
use crate::types::{LinkEndpoint, TransportKind};

/// Bidirectional byte channel to a vehicle.
#[async_trait::async_trait]
pub trait Transport: Send + 'static {
    /// Next chunk of received bytes.
    ///
    /// Returns:
    /// - `Ok(Some(bytes))` - Bytes arrived (may hold partial or several frames)
    /// - `Ok(None)` - Peer closed the stream
    /// - `Err(e)` - Receive failed
    ///
    /// Must be cancel safe: dropping the future loses no received bytes.
    async fn recv(&mut self) -> Result<Option<Bytes>>;

    /// Write all of `bytes`.
    async fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Release the underlying socket.
    async fn close(&mut self) -> Result<()>;

    /// Human readable peer description for logs.
    fn describe(&self) -> String;

    /// Whether each received chunk is a whole datagram. Frames never span
    /// datagrams, so leftover bytes after one are dropped.
    fn is_datagram(&self) -> bool {
        false
    }
}

/// Opens transports for endpoints.
#[async_trait::async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn open(&self, endpoint: &LinkEndpoint) -> Result<Box<dyn Transport>>;
}

/// Connector backed by real TCP and UDP sockets.
#[derive(Debug, Clone, Default)]
pub struct SocketConnector {
    /// Local UDP port override. `None` binds to the remote port plus one.
    udp_local_port: Option<u16>,
}

impl SocketConnector {
    pub fn new(udp_local_port: Option<u16>) -> Self {
        Self { udp_local_port }
    }
}

#[async_trait::async_trait]
impl Connector for SocketConnector {
    async fn open(&self, endpoint: &LinkEndpoint) -> Result<Box<dyn Transport>> {
        match endpoint.transport {
            TransportKind::Tcp => Ok(Box::new(TcpTransport::connect(&endpoint.host, endpoint.port).await?)),
            TransportKind::Udp => {
                let local_port = match self.udp_local_port {
                    Some(port) => port,
                    None => endpoint.local_listen_port().ok_or_else(|| {
                        crate::LinkError::transport(format!(
                            "no local port available for UDP remote port {}",
                            endpoint.port
                        ))
                    })?,
                };
                Ok(Box::new(UdpTransport::bind(&endpoint.host, endpoint.port, local_port).await?))
            }
        }
    }
}
