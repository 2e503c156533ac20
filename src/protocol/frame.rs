//! Decoded frame types

use bytes::Bytes;
use mavlink::Message as _;
use mavlink::MavlinkVersion;
use serde::{Deserialize, Serialize};

use super::messages::{MavMessage, SetMode, ids, message_fields};
use crate::types::FieldMap;

/// Wire protocol revision used for outbound frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProtocolVersion {
    /// `0xFE` start marker, 8-bit message ids, no payload truncation
    V1,
    /// `0xFD` start marker, 24-bit message ids, trailing zero truncation
    #[default]
    V2,
}

impl From<ProtocolVersion> for MavlinkVersion {
    fn from(version: ProtocolVersion) -> Self {
        match version {
            ProtocolVersion::V1 => MavlinkVersion::V1,
            ProtocolVersion::V2 => MavlinkVersion::V2,
        }
    }
}

/// Header fields common to both protocol revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FrameHeader {
    pub version: ProtocolVersion,
    pub sequence: u8,
    pub system_id: u8,
    pub component_id: u8,
}

/// One checksum-verified protocol unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub header: FrameHeader,
    pub message_id: u32,
    /// Payload as received. MAVLink 2 senders drop trailing zero bytes.
    pub payload: Bytes,
    /// Dialect view, `None` when the payload holds a value the dialect
    /// rejects (an enum entry it does not define, for example).
    pub message: Option<MavMessage>,
}

impl Frame {
    pub fn type_name(&self) -> &'static str {
        match &self.message {
            Some(message) => message.message_name(),
            None if self.message_id == ids::SET_MODE => "SET_MODE",
            None => "UNDECODED",
        }
    }

    /// SET_MODE contents, read from the raw payload.
    pub fn set_mode(&self) -> Option<SetMode> {
        (self.message_id == ids::SET_MODE).then(|| SetMode::decode(&self.payload))
    }

    /// Fields merged into the vehicle state, `None` for untracked types.
    pub fn fields(&self) -> Option<FieldMap> {
        match (&self.message, self.set_mode()) {
            (_, Some(set_mode)) => Some(set_mode.fields()),
            (Some(message), None) => message_fields(message, self.payload.len()),
            (None, None) => None,
        }
    }
}

/// A frame whose checksum did not match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecksumFailure {
    pub message_id: u32,
    pub expected: u16,
    pub actual: u16,
}

/// Output of the decoder: either a valid frame or a checksum failure signal.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Frame(Frame),
    ChecksumFailure(ChecksumFailure),
}
