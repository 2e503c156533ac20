//! Inbound frame routing
//!
//! Every decoded item goes through [`MessageDispatcher::dispatch`], which
//! updates the [`VehicleStateStore`] and returns the host notification the
//! item produces, if any.

use serde::Serialize;
use std::time::SystemTime;
use tracing::{debug, trace, warn};

use crate::LinkError;
use crate::protocol::{Frame, Inbound, MavMessage, command_ack, status_text};
use crate::store::VehicleStateStore;
use crate::types::{Diagnostic, LinkEvent};

/// Counters for what the dispatcher has seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub merged: u64,
    pub heartbeats: u64,
    pub acks: u64,
    pub checksum_failures: u64,
    pub ignored: u64,
}

#[derive(Debug, Default)]
pub struct MessageDispatcher {
    stats: DispatchStats,
}

impl MessageDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Apply one inbound item. `now` stamps heartbeat arrival.
    pub fn dispatch(&mut self, store: &VehicleStateStore, inbound: Inbound, now: SystemTime) -> Option<LinkEvent> {
        match inbound {
            Inbound::Frame(frame) => self.dispatch_frame(store, frame, now),
            Inbound::ChecksumFailure(failure) => {
                self.stats.checksum_failures += 1;
                let error = LinkError::from(failure);
                warn!(%error, "Dropping corrupted frame");
                Some(LinkEvent::Diagnostic(Diagnostic::ChecksumFailure {
                    message_id: failure.message_id,
                    expected: failure.expected,
                    actual: failure.actual,
                }))
            }
        }
    }

    fn dispatch_frame(&mut self, store: &VehicleStateStore, frame: Frame, now: SystemTime) -> Option<LinkEvent> {
        let type_name = frame.type_name();
        trace!(
            message = type_name,
            sequence = frame.header.sequence,
            system_id = frame.header.system_id,
            "Dispatching frame"
        );

        match &frame.message {
            Some(MavMessage::HEARTBEAT(_)) => {
                self.stats.heartbeats += 1;
                if store.record_heartbeat(frame.fields().unwrap_or_default(), now) {
                    debug!(system_id = frame.header.system_id, "First vehicle heartbeat");
                    return Some(LinkEvent::BecameConnected);
                }
                None
            }
            Some(MavMessage::COMMAND_ACK(data)) => {
                self.stats.acks += 1;
                let ack = command_ack(data, frame.payload.len());
                debug!(command = ack.command, result = ack.result, "Command acknowledged");
                Some(LinkEvent::CommandAck(ack))
            }
            Some(MavMessage::STATUSTEXT(data)) => {
                let event = LinkEvent::StatusText { severity: data.severity as u8, text: status_text(data) };
                self.merge(store, &frame);
                Some(event)
            }
            _ => {
                self.merge(store, &frame);
                None
            }
        }
    }

    fn merge(&mut self, store: &VehicleStateStore, frame: &Frame) {
        match frame.fields() {
            Some(fields) => {
                self.stats.merged += 1;
                store.merge(frame.type_name(), fields);
            }
            None => {
                self.stats.ignored += 1;
                trace!(message_id = frame.message_id, "Ignoring untracked message type");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ChecksumFailure, FrameHeader, MavlinkCodec, Outbound, SetMode, ids};
    use crate::types::{CommandAck, FieldValue};
    use bytes::{Bytes, BytesMut};
    use mavlink::ardupilotmega::{
        ATTITUDE_DATA, COMMAND_ACK_DATA, HEARTBEAT_DATA, MavCmd, MavModeFlag, MavResult, MavSeverity,
        PARAM_REQUEST_LIST_DATA, STATUSTEXT_DATA, SYS_STATUS_DATA,
    };
    use tokio_util::codec::Decoder;

    fn frame(message: impl Into<Outbound>) -> Inbound {
        let mut codec = MavlinkCodec::default();
        let mut buf = BytesMut::from(&codec.encode_frame(message).unwrap()[..]);
        codec.decode(&mut buf).unwrap().expect("one complete frame")
    }

    fn heartbeat(custom_mode: u32) -> Inbound {
        frame(MavMessage::HEARTBEAT(HEARTBEAT_DATA {
            custom_mode,
            base_mode: MavModeFlag::from_bits_truncate(89),
            ..Default::default()
        }))
    }

    #[test]
    fn first_heartbeat_connects_once() {
        let store = VehicleStateStore::new();
        let mut dispatcher = MessageDispatcher::new();
        let now = SystemTime::now();

        assert_eq!(dispatcher.dispatch(&store, heartbeat(0), now), Some(LinkEvent::BecameConnected));
        assert_eq!(dispatcher.dispatch(&store, heartbeat(4), now), None);
        assert_eq!(store.snapshot().custom_mode(), Some(4));
        assert_eq!(store.snapshot().base_mode(), Some(89));
        assert_eq!(dispatcher.stats().heartbeats, 2);
    }

    #[test]
    fn command_ack_is_forwarded_not_merged() {
        let store = VehicleStateStore::new();
        let mut dispatcher = MessageDispatcher::new();
        let ack = MavMessage::COMMAND_ACK(COMMAND_ACK_DATA {
            command: MavCmd::MAV_CMD_COMPONENT_ARM_DISARM,
            result: MavResult::MAV_RESULT_DENIED,
            ..Default::default()
        });

        let event = dispatcher.dispatch(&store, frame(ack), SystemTime::now());
        assert_eq!(
            event,
            Some(LinkEvent::CommandAck(CommandAck {
                command: 400,
                result: 2,
                progress: None,
                result_param2: None,
                target_system: None,
                target_component: None,
            }))
        );
        assert!(store.snapshot().get("COMMAND_ACK").is_none());
    }

    #[test]
    fn status_text_is_merged_and_forwarded() {
        let store = VehicleStateStore::new();
        let mut dispatcher = MessageDispatcher::new();
        let message = "PreArm: RC not calibrated";
        let mut text = [0u8; 50];
        text[..message.len()].copy_from_slice(message.as_bytes());
        let status = MavMessage::STATUSTEXT(STATUSTEXT_DATA {
            severity: MavSeverity::MAV_SEVERITY_CRITICAL,
            text: text.into(),
            ..Default::default()
        });

        let event = dispatcher.dispatch(&store, frame(status), SystemTime::now());
        assert_eq!(event, Some(LinkEvent::StatusText { severity: 2, text: message.into() }));
        assert_eq!(store.snapshot().field("STATUSTEXT", "text"), Some(&FieldValue::Text(message.into())));
    }

    #[test]
    fn telemetry_merges_by_type() {
        let store = VehicleStateStore::new();
        let mut dispatcher = MessageDispatcher::new();
        let now = SystemTime::now();

        dispatcher.dispatch(&store, frame(MavMessage::ATTITUDE(ATTITUDE_DATA { roll: 0.5, ..Default::default() })), now);
        dispatcher.dispatch(&store, frame(MavMessage::SYS_STATUS(SYS_STATUS_DATA { load: 300, ..Default::default() })), now);
        dispatcher.dispatch(&store, frame(SetMode { custom_mode: 6, target_system: 1, base_mode: 89 }), now);

        let state = store.snapshot();
        assert_eq!(state.field("ATTITUDE", "roll"), Some(&FieldValue::Float(0.5)));
        assert_eq!(state.field("SYS_STATUS", "load"), Some(&FieldValue::Int(300)));
        assert_eq!(state.field("SET_MODE", "base_mode"), Some(&FieldValue::Int(89)));
        assert_eq!(dispatcher.stats().merged, 3);
        assert!(!state.is_connected);
    }

    #[test]
    fn checksum_failure_becomes_diagnostic() {
        let store = VehicleStateStore::new();
        let mut dispatcher = MessageDispatcher::new();
        let failure = ChecksumFailure { message_id: 30, expected: 1, actual: 2 };

        let event = dispatcher.dispatch(&store, Inbound::ChecksumFailure(failure), SystemTime::now());
        assert_eq!(
            event,
            Some(LinkEvent::Diagnostic(Diagnostic::ChecksumFailure { message_id: 30, expected: 1, actual: 2 }))
        );
        assert_eq!(store.snapshot(), Default::default());
        assert_eq!(dispatcher.stats().checksum_failures, 1);
    }

    #[test]
    fn untracked_and_undecoded_types_are_ignored() {
        let store = VehicleStateStore::new();
        let mut dispatcher = MessageDispatcher::new();
        let now = SystemTime::now();
        let untracked = MavMessage::PARAM_REQUEST_LIST(PARAM_REQUEST_LIST_DATA::default());
        let undecoded = Inbound::Frame(Frame {
            header: FrameHeader::default(),
            message_id: ids::ATTITUDE,
            payload: Bytes::from_static(&[1, 2]),
            message: None,
        });

        assert_eq!(dispatcher.dispatch(&store, frame(untracked), now), None);
        assert_eq!(dispatcher.dispatch(&store, undecoded, now), None);
        assert!(store.snapshot().by_type.is_empty());
        assert_eq!(dispatcher.stats().ignored, 2);
    }
}
