//! Outbound command construction

use serde::{Deserialize, Serialize};

use mavlink::ardupilotmega::{
    HEARTBEAT_DATA, MavAutopilot, MavModeFlag, MavState, MavType, REQUEST_DATA_STREAM_DATA,
};

use crate::protocol::{MavMessage, Outbound, SetMode};
use crate::types::VehicleState;

/// `base_mode` used when no vehicle heartbeat has reported one yet
/// (custom mode enabled, stabilize, manual input, safety armed).
pub const FALLBACK_BASE_MODE: u8 = 89;

/// Companion-computer identity announced in our heartbeat. Type 2 on the
/// wire, which the dialect enumerates as `MAV_TYPE_QUADROTOR`.
const GCS_HEARTBEAT_TYPE: MavType = MavType::MAV_TYPE_QUADROTOR;
const MAVLINK_VERSION: u8 = 3;
/// `MAV_DATA_STREAM_ALL`
const STREAM_ALL: u8 = 0;

/// Who outbound commands are addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommandTargets {
    pub target_system: u8,
    pub target_component: u8,
    /// Requested telemetry rate in Hz
    pub stream_rate_hz: u16,
}

impl Default for CommandTargets {
    fn default() -> Self {
        Self { target_system: 1, target_component: 1, stream_rate_hz: 1 }
    }
}

/// Stateless builder for the frames a session sends.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandBuilder {
    targets: CommandTargets,
}

impl CommandBuilder {
    pub fn new(targets: CommandTargets) -> Self {
        Self { targets }
    }

    pub fn targets(&self) -> CommandTargets {
        self.targets
    }

    /// Our own periodic heartbeat.
    pub fn heartbeat(&self) -> Outbound {
        MavMessage::HEARTBEAT(HEARTBEAT_DATA {
            custom_mode: 0,
            mavtype: GCS_HEARTBEAT_TYPE,
            autopilot: MavAutopilot::MAV_AUTOPILOT_GENERIC,
            base_mode: MavModeFlag::empty(),
            system_status: MavState::MAV_STATE_ACTIVE,
            mavlink_version: MAVLINK_VERSION,
        })
        .into()
    }

    /// Ask the vehicle to start streaming all telemetry.
    pub fn stream_rate_request(&self) -> Outbound {
        MavMessage::REQUEST_DATA_STREAM(REQUEST_DATA_STREAM_DATA {
            req_message_rate: self.targets.stream_rate_hz,
            target_system: self.targets.target_system,
            target_component: self.targets.target_component,
            req_stream_id: STREAM_ALL,
            start_stop: 1,
        })
        .into()
    }

    /// Switch the vehicle to `custom_mode`, keeping its reported `base_mode`.
    pub fn mode_change(&self, state: &VehicleState, custom_mode: u32) -> Outbound {
        Outbound::SetMode(SetMode {
            custom_mode,
            target_system: self.targets.target_system,
            base_mode: state.base_mode().unwrap_or(FALLBACK_BASE_MODE),
        })
    }
}
