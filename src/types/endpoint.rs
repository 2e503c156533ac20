//! Link endpoint description

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{LinkError, Result};

/// Default remote host when none is given.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default remote port (SITL / autopilot TCP console).
pub const DEFAULT_PORT: u16 = 5760;

/// Byte transport used to carry frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransportKind {
    #[default]
    Tcp,
    Udp,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Tcp => f.write_str("TCP"),
            TransportKind::Udp => f.write_str("UDP"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "TCP" => Ok(TransportKind::Tcp),
            "UDP" => Ok(TransportKind::Udp),
            other => Err(LinkError::parse(
                "transport kind",
                format!("expected TCP or UDP, got '{}'", other),
            )),
        }
    }
}

/// Where a session connects to. Immutable for the lifetime of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkEndpoint {
    pub transport: TransportKind,
    pub host: String,
    pub port: u16,
}

impl Default for LinkEndpoint {
    fn default() -> Self {
        Self { transport: TransportKind::Tcp, host: DEFAULT_HOST.to_string(), port: DEFAULT_PORT }
    }
}

impl LinkEndpoint {
    /// Create an endpoint from explicit parts.
    pub fn new(transport: TransportKind, host: impl Into<String>, port: u16) -> Self {
        Self { transport, host: host.into(), port }
    }

    /// TCP endpoint.
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::new(TransportKind::Tcp, host, port)
    }

    /// UDP endpoint.
    pub fn udp(host: impl Into<String>, port: u16) -> Self {
        Self::new(TransportKind::Udp, host, port)
    }

    /// Fill missing parts from `defaults`.
    pub fn with_defaults(
        transport: Option<TransportKind>,
        host: Option<String>,
        port: Option<u16>,
        defaults: &LinkEndpoint,
    ) -> Self {
        Self {
            transport: transport.unwrap_or(defaults.transport),
            host: host.unwrap_or_else(|| defaults.host.clone()),
            port: port.unwrap_or(defaults.port),
        }
    }

    /// Local port a UDP session listens on: one above the remote port.
    ///
    /// Returns `None` for TCP endpoints and when `port + 1` overflows.
    pub fn local_listen_port(&self) -> Option<u16> {
        match self.transport {
            TransportKind::Udp => self.port.checked_add(1),
            TransportKind::Tcp => None,
        }
    }
}

impl fmt::Display for LinkEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.transport, self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_autopilot_console() {
        let endpoint = LinkEndpoint::default();
        assert_eq!(endpoint.transport, TransportKind::Tcp);
        assert_eq!(endpoint.host, "127.0.0.1");
        assert_eq!(endpoint.port, 5760);
        assert_eq!(endpoint.to_string(), "TCP://127.0.0.1:5760");
    }

    #[test]
    fn partial_parts_use_defaults() {
        let defaults = LinkEndpoint::default();
        let endpoint =
            LinkEndpoint::with_defaults(Some(TransportKind::Udp), None, Some(14550), &defaults);
        assert_eq!(endpoint, LinkEndpoint::udp("127.0.0.1", 14550));

        let endpoint = LinkEndpoint::with_defaults(None, None, None, &defaults);
        assert_eq!(endpoint, defaults);
    }

    #[test]
    fn udp_listens_one_port_up() {
        assert_eq!(LinkEndpoint::udp("10.0.0.2", 14550).local_listen_port(), Some(14551));
        assert_eq!(LinkEndpoint::udp("10.0.0.2", u16::MAX).local_listen_port(), None);
        assert_eq!(LinkEndpoint::tcp("10.0.0.2", 5760).local_listen_port(), None);
    }

    #[test]
    fn transport_kind_parses_case_insensitively() {
        assert_eq!("udp".parse::<TransportKind>().unwrap(), TransportKind::Udp);
        assert_eq!("TCP".parse::<TransportKind>().unwrap(), TransportKind::Tcp);
        assert!("serial".parse::<TransportKind>().is_err());
    }
}
