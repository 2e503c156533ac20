//! UDP datagram transport
//!
//! The local socket listens on its own port and every datagram goes to the
//! configured remote address. Datagrams from other senders are accepted too,
//! matching how autopilot simulators reply from ephemeral ports.

use bytes::Bytes;
use std::net::SocketAddr;
use tokio::net::{UdpSocket, lookup_host};
use tracing::{debug, trace};

use super::Transport;
use crate::{LinkError, Result};

const MAX_DATAGRAM: usize = 65_535;

/// UDP link to a remote endpoint.
pub struct UdpTransport {
    socket: UdpSocket,
    remote: SocketAddr,
    buffer: Vec<u8>,
}

impl UdpTransport {
    /// Bind `0.0.0.0:local_port` and target `host:port`.
    ///
    /// A `local_port` of 0 lets the OS pick.
    pub async fn bind(host: &str, port: u16, local_port: u16) -> Result<Self> {
        let remote = lookup_host((host, port))
            .await
            .map_err(|e| LinkError::transport_io(format!("cannot resolve {host}:{port}"), e))?
            .next()
            .ok_or_else(|| LinkError::transport(format!("no address for {host}:{port}")))?;

        let socket = UdpSocket::bind(("0.0.0.0", local_port))
            .await
            .map_err(|e| LinkError::transport_io(format!("UDP bind on port {local_port} failed"), e))?;
        debug!(local = ?socket.local_addr().ok(), %remote, "UDP socket bound");

        Ok(Self { socket, remote, buffer: vec![0; MAX_DATAGRAM] })
    }

    /// Address the socket actually bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

#[async_trait::async_trait]
impl Transport for UdpTransport {
    async fn recv(&mut self) -> Result<Option<Bytes>> {
        // recv_from is cancel safe
        let (len, from) = self
            .socket
            .recv_from(&mut self.buffer)
            .await
            .map_err(|e| LinkError::transport_io("UDP receive failed", e))?;
        trace!(len, %from, "UDP datagram");
        Ok(Some(Bytes::copy_from_slice(&self.buffer[..len])))
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.socket
            .send_to(bytes, self.remote)
            .await
            .map_err(|e| LinkError::transport_io(format!("UDP send to {} failed", self.remote), e))?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        // Dropping the socket releases the port; nothing to flush
        Ok(())
    }

    fn describe(&self) -> String {
        format!("UDP://{}", self.remote)
    }

    fn is_datagram(&self) -> bool {
        true
    }
}
