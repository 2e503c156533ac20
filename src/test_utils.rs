//! Test utilities: in-memory transports and a scripted vehicle peer
//!
//! [`MemoryConnector`] hands the session one end of an in-memory byte pipe and
//! the test the other end as a [`MemoryPeer`], which speaks MAVLink with the
//! vehicle's ids.

#![cfg(any(test, feature = "benchmark"))]

use bytes::{Bytes, BytesMut};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::codec::Decoder;

use mavlink::ardupilotmega::{
    ATTITUDE_DATA, HEARTBEAT_DATA, MavAutopilot, MavModeFlag, MavSeverity, MavState, MavType, STATUSTEXT_DATA,
    SYS_STATUS_DATA,
};

use crate::protocol::{Frame, Inbound, MavMessage, MavlinkCodec, Outbound, ProtocolVersion};
use crate::transport::{Connector, Transport};
use crate::types::LinkEndpoint;
use crate::{LinkError, Result};

/// Vehicle-side system id used by the scripted peer.
pub const VEHICLE_SYSTEM_ID: u8 = 1;
/// Vehicle-side component id used by the scripted peer (`MAV_COMP_ID_AUTOPILOT1`).
pub const VEHICLE_COMPONENT_ID: u8 = 1;

/// Session side of an in-memory link.
pub struct MemoryTransport {
    incoming: mpsc::UnboundedReceiver<Bytes>,
    outgoing: mpsc::UnboundedSender<Bytes>,
    name: String,
    datagram: bool,
}

/// Test side of an in-memory link, acting as the vehicle.
pub struct MemoryPeer {
    to_session: mpsc::UnboundedSender<Bytes>,
    from_session: mpsc::UnboundedReceiver<Bytes>,
    codec: MavlinkCodec,
    buffer: BytesMut,
    endpoint: LinkEndpoint,
}

/// Create a connected transport/peer pair.
///
/// With `datagram` set every delivered chunk is a whole datagram, as UDP reads are.
pub fn memory_pair(endpoint: LinkEndpoint, datagram: bool) -> (MemoryTransport, MemoryPeer) {
    let (to_session, incoming) = mpsc::unbounded_channel();
    let (outgoing, from_session) = mpsc::unbounded_channel();
    let transport = MemoryTransport { incoming, outgoing, name: format!("MEMORY://{endpoint}"), datagram };
    let peer = MemoryPeer {
        to_session,
        from_session,
        codec: MavlinkCodec::new(ProtocolVersion::V2, VEHICLE_SYSTEM_ID, VEHICLE_COMPONENT_ID),
        buffer: BytesMut::new(),
        endpoint,
    };
    (transport, peer)
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    async fn recv(&mut self) -> Result<Option<Bytes>> {
        Ok(self.incoming.recv().await)
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.outgoing
            .send(Bytes::copy_from_slice(bytes))
            .map_err(|_| LinkError::transport("memory peer dropped"))
    }

    async fn close(&mut self) -> Result<()> {
        self.incoming.close();
        Ok(())
    }

    fn describe(&self) -> String {
        self.name.clone()
    }

    fn is_datagram(&self) -> bool {
        self.datagram
    }
}

impl MemoryPeer {
    /// Endpoint the session asked for.
    pub fn endpoint(&self) -> &LinkEndpoint {
        &self.endpoint
    }

    /// Encode and deliver a message to the session.
    pub fn send_message(&mut self, message: impl Into<Outbound>) {
        let bytes = self.codec.encode_frame(message).expect("test messages encode");
        self.send_raw(bytes);
    }

    /// Deliver raw bytes to the session.
    pub fn send_raw(&self, bytes: impl Into<Bytes>) {
        // The session may already be gone in teardown tests
        let _ = self.to_session.send(bytes.into());
    }

    /// Encode a message without sending it, for corrupting or splitting.
    pub fn encode(&mut self, message: impl Into<Outbound>) -> Bytes {
        self.codec.encode_frame(message).expect("test messages encode")
    }

    /// Next frame the session sent, `None` once the session closed its end.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        loop {
            match self.codec.decode(&mut self.buffer) {
                Ok(Some(Inbound::Frame(frame))) => return Some(frame),
                Ok(Some(Inbound::ChecksumFailure(_))) => continue,
                Ok(None) => {}
                Err(e) => panic!("peer decode failed: {e}"),
            }
            let bytes = self.from_session.recv().await?;
            self.buffer.extend_from_slice(&bytes);
        }
    }

    /// Skip frames until one matches `predicate`.
    pub async fn next_matching(&mut self, predicate: impl Fn(&Frame) -> bool) -> Option<Frame> {
        while let Some(frame) = self.next_frame().await {
            if predicate(&frame) {
                return Some(frame);
            }
        }
        None
    }
}

/// Connector that yields in-memory transports and hands the peers to the test.
pub struct MemoryConnector {
    peers: mpsc::UnboundedSender<MemoryPeer>,
    datagram: bool,
}

impl MemoryConnector {
    /// Stream links, like TCP.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<MemoryPeer>) {
        Self::build(false)
    }

    /// Datagram links, like UDP.
    pub fn datagrams() -> (Arc<Self>, mpsc::UnboundedReceiver<MemoryPeer>) {
        Self::build(true)
    }

    fn build(datagram: bool) -> (Arc<Self>, mpsc::UnboundedReceiver<MemoryPeer>) {
        let (peers, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { peers, datagram }), rx)
    }
}

#[async_trait::async_trait]
impl Connector for MemoryConnector {
    async fn open(&self, endpoint: &LinkEndpoint) -> Result<Box<dyn Transport>> {
        let (transport, peer) = memory_pair(endpoint.clone(), self.datagram);
        self.peers.send(peer).map_err(|_| LinkError::transport("test dropped the peer receiver"))?;
        Ok(Box::new(transport))
    }
}

/// Connector whose every attempt is refused.
pub struct FailingConnector;

#[async_trait::async_trait]
impl Connector for FailingConnector {
    async fn open(&self, endpoint: &LinkEndpoint) -> Result<Box<dyn Transport>> {
        Err(LinkError::transport(format!("connection to {endpoint} refused")))
    }
}

/// Connector that never finishes connecting.
pub struct PendingConnector;

#[async_trait::async_trait]
impl Connector for PendingConnector {
    async fn open(&self, _endpoint: &LinkEndpoint) -> Result<Box<dyn Transport>> {
        std::future::pending().await
    }
}

/// Heartbeat as an ArduCopter vehicle sends it.
pub fn vehicle_heartbeat(custom_mode: u32, base_mode: u8) -> MavMessage {
    MavMessage::HEARTBEAT(HEARTBEAT_DATA {
        custom_mode,
        mavtype: MavType::MAV_TYPE_QUADROTOR,
        autopilot: MavAutopilot::MAV_AUTOPILOT_ARDUPILOTMEGA,
        base_mode: MavModeFlag::from_bits_truncate(base_mode),
        system_status: MavState::MAV_STATE_ACTIVE,
        mavlink_version: 3,
    })
}

/// STATUSTEXT carrying `text`, cut to the 50-byte field.
pub fn status_text(severity: MavSeverity, text: &str) -> MavMessage {
    let mut raw = [0u8; 50];
    let len = text.len().min(raw.len());
    raw[..len].copy_from_slice(&text.as_bytes()[..len]);
    MavMessage::STATUSTEXT(STATUSTEXT_DATA { severity, text: raw.into(), ..Default::default() })
}

/// A byte stream of `frames` mixed telemetry frames, for throughput tests.
pub fn sample_telemetry_stream(frames: usize) -> Bytes {
    let mut codec = MavlinkCodec::new(ProtocolVersion::V2, VEHICLE_SYSTEM_ID, VEHICLE_COMPONENT_ID);
    let mut out = BytesMut::new();
    for i in 0..frames {
        let message = match i % 4 {
            0 => vehicle_heartbeat(i as u32, 89),
            1 => MavMessage::ATTITUDE(ATTITUDE_DATA {
                time_boot_ms: i as u32,
                roll: 0.1,
                pitch: -0.2,
                yaw: 1.5,
                ..Default::default()
            }),
            2 => MavMessage::SYS_STATUS(SYS_STATUS_DATA { load: 250, voltage_battery: 12_600, ..Default::default() }),
            _ => status_text(MavSeverity::MAV_SEVERITY_INFO, &format!("tick {i}")),
        };
        let frame = codec.encode_frame(message).expect("sample messages encode");
        out.extend_from_slice(&frame);
    }
    out.freeze()
}
