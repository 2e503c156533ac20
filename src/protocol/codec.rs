//! Frame codec for byte-stream transports
//!
//! [`MavlinkCodec`] implements `tokio_util::codec::{Decoder, Encoder}` so the
//! same framing serves both TCP (where a read can split or merge frames) and
//! UDP (one datagram per read). Inbound bytes ahead of a start marker are
//! discarded.
//!
//! Nothing in a header is trusted before the checksum verifies it. A header
//! whose checksum fails, or whose message id the dialect does not define,
//! gives up only its start marker, and scanning resumes at the next byte, so a
//! corrupted length can never swallow the frames behind it. Checksum failures
//! are reported as [`Inbound::ChecksumFailure`] values instead of errors.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use mavlink::Message as _;
use serde::Serialize;
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use super::crc::frame_checksum;
use super::frame::{ChecksumFailure, Frame, FrameHeader, Inbound, ProtocolVersion};
use super::messages::{MAX_PAYLOAD_LEN, MavMessage, Outbound, crc_extra};
use crate::{LinkError, Result};

/// MAVLink 1 start-of-frame marker
pub const STX_V1: u8 = 0xFE;
/// MAVLink 2 start-of-frame marker
pub const STX_V2: u8 = 0xFD;

const HEADER_LEN_V1: usize = 6;
const HEADER_LEN_V2: usize = 10;
const CHECKSUM_LEN: usize = 2;
const SIGNATURE_LEN: usize = 13;
const INCOMPAT_FLAG_SIGNED: u8 = 0x01;

/// Running counters kept by the codec.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CodecStats {
    pub frames_decoded: u64,
    pub checksum_failures: u64,
    /// Headers skipped because the dialect does not define their message id
    pub unknown_headers: u64,
    /// Verified frames whose payload the dialect could not parse
    pub rejected_payloads: u64,
    /// Bytes skipped while searching for a frame
    pub bytes_discarded: u64,
    pub frames_encoded: u64,
}

/// Stateful MAVLink framing.
///
/// Outbound frames carry the configured system and component ids and a
/// sequence number that wraps at 255.
#[derive(Debug, Clone)]
pub struct MavlinkCodec {
    version: ProtocolVersion,
    system_id: u8,
    component_id: u8,
    sequence: u8,
    last_sequence: Option<u8>,
    stats: CodecStats,
}

impl MavlinkCodec {
    pub fn new(version: ProtocolVersion, system_id: u8, component_id: u8) -> Self {
        Self { version, system_id, component_id, sequence: 0, last_sequence: None, stats: CodecStats::default() }
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn stats(&self) -> CodecStats {
        self.stats
    }

    /// Sequence number the next encoded frame will carry.
    pub fn next_sequence(&self) -> u8 {
        self.sequence
    }

    /// Sequence number of the most recently encoded frame.
    pub fn last_sequence(&self) -> Option<u8> {
        self.last_sequence
    }

    /// Encode one message into a standalone buffer.
    pub fn encode_frame(&mut self, message: impl Into<Outbound>) -> Result<Bytes> {
        let mut out = BytesMut::with_capacity(HEADER_LEN_V2 + MAX_PAYLOAD_LEN + CHECKSUM_LEN);
        self.write_frame(&message.into(), &mut out)?;
        Ok(out.freeze())
    }

    fn write_frame(&mut self, message: &Outbound, dst: &mut BytesMut) -> Result<()> {
        let message_id = message.message_id();
        let extra = crc_extra(message_id).ok_or_else(|| {
            LinkError::parse("frame encoder", format!("no CRC extra for message id {message_id}"))
        })?;

        let mut payload = BytesMut::with_capacity(MAX_PAYLOAD_LEN);
        message.encode_payload(self.version.into(), &mut payload);

        let sequence = self.sequence;
        let mut header_buf = [0u8; HEADER_LEN_V2 - 1];
        let header = match self.version {
            ProtocolVersion::V1 => {
                let id = u8::try_from(message_id).map_err(|_| {
                    LinkError::parse("frame encoder", format!("message id {message_id} needs MAVLink 2"))
                })?;
                let len = payload.len() as u8;
                header_buf[..5].copy_from_slice(&[len, sequence, self.system_id, self.component_id, id]);
                &header_buf[..HEADER_LEN_V1 - 1]
            }
            ProtocolVersion::V2 => {
                // Trailing zeros are implied on the wire; at least one byte stays
                while payload.len() > 1 && payload.last() == Some(&0) {
                    payload.truncate(payload.len() - 1);
                }
                let [id0, id1, id2, _] = message_id.to_le_bytes();
                let len = payload.len() as u8;
                header_buf = [len, 0, 0, sequence, self.system_id, self.component_id, id0, id1, id2];
                &header_buf[..]
            }
        };

        let checksum = frame_checksum(header, &payload, extra);
        dst.reserve(1 + header.len() + payload.len() + CHECKSUM_LEN);
        dst.put_u8(match self.version {
            ProtocolVersion::V1 => STX_V1,
            ProtocolVersion::V2 => STX_V2,
        });
        dst.put_slice(header);
        dst.put_slice(&payload);
        dst.put_u16_le(checksum);

        self.sequence = sequence.wrapping_add(1);
        self.last_sequence = Some(sequence);
        self.stats.frames_encoded += 1;
        trace!(message = message.type_name(), sequence, "Encoded frame");
        Ok(())
    }

    fn discard(&mut self, src: &mut BytesMut, count: usize) {
        self.stats.bytes_discarded += count as u64;
        src.advance(count);
    }

    /// Verify and take the frame at the head of `src`.
    ///
    /// `src` starts with a start marker. Returns `None` when more bytes are
    /// needed, and `Some(None)` when the marker was dropped as a false start.
    fn take_frame(&mut self, src: &mut BytesMut) -> Option<Option<Inbound>> {
        let version = if src[0] == STX_V1 { ProtocolVersion::V1 } else { ProtocolVersion::V2 };
        let header_len = match version {
            ProtocolVersion::V1 => HEADER_LEN_V1,
            ProtocolVersion::V2 => HEADER_LEN_V2,
        };
        if src.len() < header_len {
            return None;
        }

        let (header, message_id, signature_len) = match version {
            ProtocolVersion::V1 => {
                let header = FrameHeader { version, sequence: src[2], system_id: src[3], component_id: src[4] };
                (header, src[5] as u32, 0)
            }
            ProtocolVersion::V2 => {
                let incompat = src[2];
                if incompat & !INCOMPAT_FLAG_SIGNED != 0 {
                    trace!(incompat, "Unsupported incompat flags, resyncing");
                    self.discard(src, 1);
                    return Some(None);
                }
                let header = FrameHeader { version, sequence: src[4], system_id: src[5], component_id: src[6] };
                let signature_len = if incompat & INCOMPAT_FLAG_SIGNED != 0 { SIGNATURE_LEN } else { 0 };
                (header, u32::from_le_bytes([src[7], src[8], src[9], 0]), signature_len)
            }
        };

        let Some(extra) = crc_extra(message_id) else {
            self.stats.unknown_headers += 1;
            trace!(message_id, "Unknown message id, resyncing");
            self.discard(src, 1);
            return Some(None);
        };

        let payload_len = src[1] as usize;
        let crc_at = header_len + payload_len;
        let frame_len = crc_at + CHECKSUM_LEN + signature_len;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return None;
        }

        let expected = frame_checksum(&src[1..header_len], &src[header_len..crc_at], extra);
        let actual = u16::from_le_bytes([src[crc_at], src[crc_at + 1]]);
        if expected != actual {
            self.stats.checksum_failures += 1;
            trace!(message_id, expected, actual, "Checksum mismatch, resyncing");
            self.discard(src, 1);
            return Some(Some(Inbound::ChecksumFailure(ChecksumFailure { message_id, expected, actual })));
        }

        let raw = src.split_to(frame_len).freeze();
        let payload = raw.slice(header_len..crc_at);
        let message = match MavMessage::parse(version.into(), message_id, &payload) {
            Ok(message) => Some(message),
            Err(e) => {
                self.stats.rejected_payloads += 1;
                trace!(message_id, "Dialect rejected payload: {}", e);
                None
            }
        };

        self.stats.frames_decoded += 1;
        Some(Some(Inbound::Frame(Frame { header, message_id, payload, message })))
    }
}

impl Default for MavlinkCodec {
    fn default() -> Self {
        Self::new(ProtocolVersion::V2, 255, 190)
    }
}

impl Decoder for MavlinkCodec {
    type Item = Inbound;
    type Error = LinkError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Inbound>> {
        loop {
            let Some(start) = src.iter().position(|b| *b == STX_V1 || *b == STX_V2) else {
                let len = src.len();
                self.discard(src, len);
                return Ok(None);
            };
            if start > 0 {
                trace!(skipped = start, "Discarding bytes before start marker");
                self.discard(src, start);
            }

            match self.take_frame(src) {
                Some(Some(inbound)) => return Ok(Some(inbound)),
                Some(None) => continue,
                None => return Ok(None),
            }
        }
    }

    /// Input ended (or a datagram did): a frame still waiting for bytes can no
    /// longer complete, so its marker is dropped and the rest rescanned.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Inbound>> {
        loop {
            if let Some(inbound) = self.decode(src)? {
                return Ok(Some(inbound));
            }
            if src.is_empty() {
                return Ok(None);
            }
            trace!(pending = src.len(), "Incomplete frame at end of input, resyncing");
            self.discard(src, 1);
        }
    }
}

impl<M: Into<Outbound>> Encoder<M> for MavlinkCodec {
    type Error = LinkError;

    fn encode(&mut self, item: M, dst: &mut BytesMut) -> Result<()> {
        self.write_frame(&item.into(), dst)
    }
}
