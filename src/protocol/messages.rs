//! Message set, on top of the `mavlink` crate's ArduPilot dialect.
//!
//! Payload layouts, serializers and CRC extras come from
//! [`mavlink::ardupilotmega`]. This module adds what a session needs on top:
//! flattening the tracked message types into [`FieldMap`]s, and a raw
//! SET_MODE whose `base_mode` carries the flag byte a vehicle reports.
//!
//! An extension field is reported as present when the received payload
//! reached at least one of its bytes, so a MAVLink 2 sender that truncated it
//! does not overwrite a value merged earlier.

use bytes::{Buf, BufMut, BytesMut};
use mavlink::Message as _;
use mavlink::MavlinkVersion;
use mavlink::ardupilotmega::{COMMAND_ACK_DATA, STATUSTEXT_DATA};
use serde::{Deserialize, Serialize};

use crate::types::{CommandAck, FieldMap, FieldValue};

pub use mavlink::ardupilotmega::MavMessage;

/// Largest payload a frame can carry.
pub const MAX_PAYLOAD_LEN: usize = 255;

/// Message ids of the tracked message set.
pub mod ids {
    pub const HEARTBEAT: u32 = 0;
    pub const SYS_STATUS: u32 = 1;
    pub const SET_MODE: u32 = 11;
    pub const RAW_IMU: u32 = 27;
    pub const ATTITUDE: u32 = 30;
    pub const LOCAL_POSITION_NED: u32 = 32;
    pub const GLOBAL_POSITION_INT: u32 = 33;
    pub const RC_CHANNELS_RAW: u32 = 35;
    pub const SERVO_OUTPUT_RAW: u32 = 36;
    pub const REQUEST_DATA_STREAM: u32 = 66;
    pub const COMMAND_ACK: u32 = 77;
    pub const STATUSTEXT: u32 = 253;
}

/// CRC extra byte for a message id the dialect defines.
///
/// The dialect reports 0 for ids it does not know.
pub fn crc_extra(message_id: u32) -> Option<u8> {
    match MavMessage::extra_crc(message_id) {
        0 => None,
        extra => Some(extra),
    }
}

/// SET_MODE with a raw `base_mode` byte.
///
/// The dialect types `base_mode` as `MAV_MODE`, which has no variant for the
/// flag combinations vehicles report in their heartbeat (89 for a disarmed
/// ArduCopter, for example), so this one message is framed by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SetMode {
    pub custom_mode: u32,
    pub target_system: u8,
    pub base_mode: u8,
}

impl SetMode {
    const ENCODED_LEN: usize = 6;

    /// Read a payload, zero-filling a truncated one.
    pub fn decode(payload: &[u8]) -> Self {
        let mut padded = [0u8; Self::ENCODED_LEN];
        let len = payload.len().min(Self::ENCODED_LEN);
        padded[..len].copy_from_slice(&payload[..len]);

        let mut buf = &padded[..];
        Self { custom_mode: buf.get_u32_le(), target_system: buf.get_u8(), base_mode: buf.get_u8() }
    }

    fn encode(&self, out: &mut BytesMut) {
        out.put_u32_le(self.custom_mode);
        out.put_u8(self.target_system);
        out.put_u8(self.base_mode);
    }

    pub fn fields(&self) -> FieldMap {
        field_map([
            ("custom_mode", self.custom_mode.into()),
            ("target_system", self.target_system.into()),
            ("base_mode", self.base_mode.into()),
        ])
    }
}

/// A message handed to the encoder.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Dialect(MavMessage),
    SetMode(SetMode),
}

impl Outbound {
    pub fn message_id(&self) -> u32 {
        match self {
            Outbound::Dialect(message) => message.message_id(),
            Outbound::SetMode(_) => ids::SET_MODE,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Outbound::Dialect(message) => message.message_name(),
            Outbound::SetMode(_) => "SET_MODE",
        }
    }

    /// Append the untruncated payload to `out`.
    pub fn encode_payload(&self, version: MavlinkVersion, out: &mut BytesMut) {
        match self {
            Outbound::Dialect(message) => {
                let mut buf = [0u8; MAX_PAYLOAD_LEN];
                let len = message.ser(version, &mut buf);
                out.put_slice(&buf[..len]);
            }
            Outbound::SetMode(set_mode) => set_mode.encode(out),
        }
    }
}

impl From<MavMessage> for Outbound {
    fn from(message: MavMessage) -> Self {
        Outbound::Dialect(message)
    }
}

impl From<SetMode> for Outbound {
    fn from(set_mode: SetMode) -> Self {
        Outbound::SetMode(set_mode)
    }
}

fn field_map<const N: usize>(entries: [(&str, FieldValue); N]) -> FieldMap {
    entries.into_iter().map(|(name, value)| (name.to_string(), value)).collect()
}

/// Extension field starting at `offset`, present if the payload reached it.
fn put_extension(map: &mut FieldMap, received: usize, offset: usize, name: &str, value: impl Into<FieldValue>) {
    if received > offset {
        map.insert(name.to_string(), value.into());
    }
}

/// STATUSTEXT text up to the first NUL.
pub fn status_text(data: &STATUSTEXT_DATA) -> String {
    let raw: &[u8] = &data.text[..];
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

/// Host-facing view of a COMMAND_ACK, `received` being the payload length on the wire.
pub fn command_ack(data: &COMMAND_ACK_DATA, received: usize) -> CommandAck {
    CommandAck {
        command: data.command as u16,
        result: data.result as u8,
        progress: (received > 3).then_some(data.progress),
        result_param2: (received > 4).then_some(data.result_param2),
        target_system: (received > 8).then_some(data.target_system),
        target_component: (received > 9).then_some(data.target_component),
    }
}

/// Field values of a tracked message, by MAVLink field name.
///
/// `received` is the payload length on the wire. Returns `None` for message
/// types the session does not aggregate.
pub fn message_fields(message: &MavMessage, received: usize) -> Option<FieldMap> {
    let fields = match message {
        MavMessage::HEARTBEAT(m) => field_map([
            ("custom_mode", m.custom_mode.into()),
            ("type", (m.mavtype as u32).into()),
            ("autopilot", (m.autopilot as u32).into()),
            ("base_mode", m.base_mode.bits().into()),
            ("system_status", (m.system_status as u32).into()),
            ("mavlink_version", m.mavlink_version.into()),
        ]),
        MavMessage::SYS_STATUS(m) => field_map([
            ("onboard_control_sensors_present", m.onboard_control_sensors_present.bits().into()),
            ("onboard_control_sensors_enabled", m.onboard_control_sensors_enabled.bits().into()),
            ("onboard_control_sensors_health", m.onboard_control_sensors_health.bits().into()),
            ("load", m.load.into()),
            ("voltage_battery", m.voltage_battery.into()),
            ("current_battery", m.current_battery.into()),
            ("drop_rate_comm", m.drop_rate_comm.into()),
            ("errors_comm", m.errors_comm.into()),
            ("errors_count1", m.errors_count1.into()),
            ("errors_count2", m.errors_count2.into()),
            ("errors_count3", m.errors_count3.into()),
            ("errors_count4", m.errors_count4.into()),
            ("battery_remaining", m.battery_remaining.into()),
        ]),
        MavMessage::SET_MODE(m) => field_map([
            ("custom_mode", m.custom_mode.into()),
            ("target_system", m.target_system.into()),
            ("base_mode", (m.base_mode as u32).into()),
        ]),
        MavMessage::RAW_IMU(m) => {
            let mut map = field_map([
                ("time_usec", m.time_usec.into()),
                ("xacc", m.xacc.into()),
                ("yacc", m.yacc.into()),
                ("zacc", m.zacc.into()),
                ("xgyro", m.xgyro.into()),
                ("ygyro", m.ygyro.into()),
                ("zgyro", m.zgyro.into()),
                ("xmag", m.xmag.into()),
                ("ymag", m.ymag.into()),
                ("zmag", m.zmag.into()),
            ]);
            put_extension(&mut map, received, 26, "id", m.id);
            put_extension(&mut map, received, 27, "temperature", m.temperature);
            map
        }
        MavMessage::ATTITUDE(m) => field_map([
            ("time_boot_ms", m.time_boot_ms.into()),
            ("roll", m.roll.into()),
            ("pitch", m.pitch.into()),
            ("yaw", m.yaw.into()),
            ("rollspeed", m.rollspeed.into()),
            ("pitchspeed", m.pitchspeed.into()),
            ("yawspeed", m.yawspeed.into()),
        ]),
        MavMessage::LOCAL_POSITION_NED(m) => field_map([
            ("time_boot_ms", m.time_boot_ms.into()),
            ("x", m.x.into()),
            ("y", m.y.into()),
            ("z", m.z.into()),
            ("vx", m.vx.into()),
            ("vy", m.vy.into()),
            ("vz", m.vz.into()),
        ]),
        MavMessage::GLOBAL_POSITION_INT(m) => field_map([
            ("time_boot_ms", m.time_boot_ms.into()),
            ("lat", m.lat.into()),
            ("lon", m.lon.into()),
            ("alt", m.alt.into()),
            ("relative_alt", m.relative_alt.into()),
            ("vx", m.vx.into()),
            ("vy", m.vy.into()),
            ("vz", m.vz.into()),
            ("hdg", m.hdg.into()),
        ]),
        MavMessage::RC_CHANNELS_RAW(m) => field_map([
            ("time_boot_ms", m.time_boot_ms.into()),
            ("port", m.port.into()),
            ("chan1_raw", m.chan1_raw.into()),
            ("chan2_raw", m.chan2_raw.into()),
            ("chan3_raw", m.chan3_raw.into()),
            ("chan4_raw", m.chan4_raw.into()),
            ("chan5_raw", m.chan5_raw.into()),
            ("chan6_raw", m.chan6_raw.into()),
            ("chan7_raw", m.chan7_raw.into()),
            ("chan8_raw", m.chan8_raw.into()),
            ("rssi", m.rssi.into()),
        ]),
        MavMessage::SERVO_OUTPUT_RAW(m) => field_map([
            ("time_usec", m.time_usec.into()),
            ("port", m.port.into()),
            ("servo1_raw", m.servo1_raw.into()),
            ("servo2_raw", m.servo2_raw.into()),
            ("servo3_raw", m.servo3_raw.into()),
            ("servo4_raw", m.servo4_raw.into()),
            ("servo5_raw", m.servo5_raw.into()),
            ("servo6_raw", m.servo6_raw.into()),
            ("servo7_raw", m.servo7_raw.into()),
            ("servo8_raw", m.servo8_raw.into()),
        ]),
        MavMessage::REQUEST_DATA_STREAM(m) => field_map([
            ("req_message_rate", m.req_message_rate.into()),
            ("target_system", m.target_system.into()),
            ("target_component", m.target_component.into()),
            ("req_stream_id", m.req_stream_id.into()),
            ("start_stop", m.start_stop.into()),
        ]),
        MavMessage::COMMAND_ACK(m) => {
            let mut map = field_map([("command", (m.command as u32).into()), ("result", (m.result as u32).into())]);
            put_extension(&mut map, received, 3, "progress", m.progress);
            put_extension(&mut map, received, 4, "result_param2", m.result_param2);
            put_extension(&mut map, received, 8, "target_system", m.target_system);
            put_extension(&mut map, received, 9, "target_component", m.target_component);
            map
        }
        MavMessage::STATUSTEXT(m) => {
            let mut map = field_map([
                ("severity", (m.severity as u32).into()),
                ("text", status_text(m).into()),
            ]);
            put_extension(&mut map, received, 51, "id", m.id);
            put_extension(&mut map, received, 53, "chunk_seq", m.chunk_seq);
            map
        }
        _ => return None,
    };
    Some(fields)
}
