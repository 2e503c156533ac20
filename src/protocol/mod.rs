//! MAVLink wire protocol: framing, checksums and the dialect message set.
//!
//! Inbound bytes go through [`MavlinkCodec`] which yields [`Inbound`] items:
//! a decoded [`Frame`] or a [`ChecksumFailure`] signal. Payloads are parsed
//! into the `ardupilotmega` dialect's [`MavMessage`]. Outbound messages are
//! encoded with the session's system and component ids.
//!
//! ```rust
//! use bytes::BytesMut;
//! use mavsession::protocol::{Inbound, MavMessage, MavlinkCodec};
//! use mavlink::ardupilotmega::HEARTBEAT_DATA;
//! use tokio_util::codec::Decoder;
//!
//! let mut codec = MavlinkCodec::default();
//! let heartbeat = MavMessage::HEARTBEAT(HEARTBEAT_DATA { custom_mode: 4, ..Default::default() });
//! let bytes = codec.encode_frame(heartbeat.clone()).unwrap();
//!
//! let mut buf = BytesMut::from(&bytes[..]);
//! match codec.decode(&mut buf).unwrap() {
//!     Some(Inbound::Frame(frame)) => assert_eq!(frame.message, Some(heartbeat)),
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

mod codec;
mod crc;
mod frame;
mod messages;

pub use codec::{CodecStats, MavlinkCodec, STX_V1, STX_V2};
pub use crc::frame_checksum;
pub use frame::{ChecksumFailure, Frame, FrameHeader, Inbound, ProtocolVersion};
pub use messages::{
    MAX_PAYLOAD_LEN, MavMessage, Outbound, SetMode, command_ack, crc_extra, ids, message_fields, status_text,
};
