//! Notifications delivered to the host

use serde::Serialize;

/// Asynchronous notification emitted by a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum LinkEvent {
    /// First vehicle heartbeat of the session. Fires once per session.
    BecameConnected,
    /// Vehicle acknowledged a command. Not part of the aggregated state.
    CommandAck(CommandAck),
    /// Vehicle status message.
    StatusText { severity: u8, text: String },
    /// Non-fatal problem worth surfacing.
    Diagnostic(Diagnostic),
    /// Reply to a mode query.
    ModeReport { custom_mode: Option<u32> },
    /// The session ended.
    Disconnected { reason: DisconnectReason },
}

/// A COMMAND_ACK as the host sees it.
///
/// Extension fields are `None` when the sender's payload stopped before them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommandAck {
    pub command: u16,
    pub result: u8,
    pub progress: Option<u8>,
    pub result_param2: Option<i32>,
    pub target_system: Option<u8>,
    pub target_component: Option<u8>,
}

/// Diagnostic events never stop the session on their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    ChecksumFailure { message_id: u32, expected: u16, actual: u16 },
    TransportError { reason: String },
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisconnectReason {
    /// Host asked for it.
    Requested,
    /// Remote end closed the stream.
    PeerClosed,
    /// Connect, send or receive failed.
    TransportError { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_tag_and_content() {
        let json = serde_json::to_string(&LinkEvent::BecameConnected).unwrap();
        assert_eq!(json, r#"{"event":"became_connected"}"#);

        let json = serde_json::to_string(&LinkEvent::Diagnostic(Diagnostic::ChecksumFailure {
            message_id: 0,
            expected: 1,
            actual: 2,
        }))
        .unwrap();
        assert_eq!(
            json,
            r#"{"event":"diagnostic","data":{"kind":"checksum_failure","message_id":0,"expected":1,"actual":2}}"#
        );

        let json = serde_json::to_string(&LinkEvent::Disconnected {
            reason: DisconnectReason::TransportError { reason: "reset".into() },
        })
        .unwrap();
        assert_eq!(
            json,
            r#"{"event":"disconnected","data":{"reason":{"kind":"transport_error","reason":"reset"}}}"#
        );
    }
}
