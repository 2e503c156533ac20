//! Session configuration
//!
//! Every field has a default, so an empty document is a valid configuration:
//!
//! ```rust
//! use mavsession::LinkConfig;
//!
//! let config = LinkConfig::from_yaml_str(
//!     r#"
//! endpoint:
//!   transport: UDP
//!   port: 14550
//! heartbeat_interval_ms: 500
//! "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.endpoint.host, "127.0.0.1");
//! assert_eq!(config.heartbeat_interval().as_millis(), 500);
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::commands::CommandTargets;
use crate::protocol::ProtocolVersion;
use crate::types::LinkEndpoint;
use crate::{LinkError, Result};

const INLINE_SOURCE: &str = "<inline>";

/// Configuration for a [`LinkSession`](crate::LinkSession).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkConfig {
    /// Defaults applied to `connect` arguments the host leaves out
    pub endpoint: LinkEndpoint,
    /// Target spacing of outbound heartbeats
    pub heartbeat_interval_ms: u64,
    /// Our MAVLink system id (255 is the usual ground station id)
    pub system_id: u8,
    /// Our MAVLink component id (190 is `MAV_COMP_ID_MISSIONPLANNER`)
    pub component_id: u8,
    /// Framing used for outbound frames; inbound accepts both
    pub protocol: ProtocolVersion,
    /// Local UDP listen port. Unset means remote port plus one.
    pub udp_local_port: Option<u16>,
    /// Addressing of outbound commands
    pub targets: CommandTargets,
    /// Buffered host events before slow subscribers start lagging
    pub event_capacity: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            endpoint: LinkEndpoint::default(),
            heartbeat_interval_ms: 1000,
            system_id: 255,
            component_id: 190,
            protocol: ProtocolVersion::V2,
            udp_local_port: None,
            targets: CommandTargets::default(),
            event_capacity: 64,
        }
    }
}

impl LinkConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Self::parse(yaml, Path::new(INLINE_SOURCE))
    }

    /// Read, parse and validate a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| LinkError::config(path, format!("cannot read file: {e}")))?;
        Self::parse(&yaml, path)
    }

    fn parse(yaml: &str, source: &Path) -> Result<Self> {
        // An empty document deserializes to unit, not to an empty mapping
        let config = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml_ng::from_str::<Self>(yaml)
                .map_err(|e| LinkError::config(source, format!("YAML parsing failed: {e}")))?
        };
        config.validate().map_err(|reason| LinkError::config(source, reason))?;
        Ok(config)
    }

    /// Check values serde cannot rule out on its own.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.heartbeat_interval_ms == 0 {
            return Err("heartbeat_interval_ms must be greater than zero".to_string());
        }
        if self.event_capacity == 0 {
            return Err("event_capacity must be greater than zero".to_string());
        }
        if self.endpoint.host.trim().is_empty() {
            return Err("endpoint.host must not be empty".to_string());
        }
        Ok(())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}
