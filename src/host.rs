//! Line-oriented host command adapter
//!
//! Hosts send short text commands, one per line:
//!
//! | command                        | effect                                  |
//! |--------------------------------|-----------------------------------------|
//! | `connect [TCP\|UDP] [host] [port]` | open, or close when already connected |
//! | `disconnect`                   | close the current session               |
//! | `mode`                         | report the last known custom mode       |
//! | `mode <n>`                     | request custom mode `n`                 |
//! | `bang`                         | emit a state snapshot                   |
//!
//! ```rust
//! use mavsession::host::HostCommand;
//! use mavsession::TransportKind;
//!
//! let command: HostCommand = "connect udp 10.0.0.2".parse().unwrap();
//! assert_eq!(
//!     command,
//!     HostCommand::Connect { transport: Some(TransportKind::Udp), host: Some("10.0.0.2".into()), port: None }
//! );
//! ```

use serde::Serialize;
use std::str::FromStr;
use tracing::debug;

use crate::session::{ConnectOutcome, LinkSession, ModeOutcome};
use crate::types::{TransportKind, VehicleState};
use crate::{LinkError, Result};

const CONTEXT: &str = "host command";

/// A parsed host command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    Connect { transport: Option<TransportKind>, host: Option<String>, port: Option<u16> },
    Disconnect,
    Mode(Option<u32>),
    Bang,
}

/// What the host gets back for a command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reply", content = "data", rename_all = "snake_case")]
pub enum HostReply {
    Connect(ConnectOutcome),
    Disconnect { closed: bool },
    Mode(ModeOutcome),
    Snapshot(VehicleState),
}

impl FromStr for HostCommand {
    type Err = LinkError;

    fn from_str(line: &str) -> Result<Self> {
        let mut tokens = line.split_whitespace();
        let Some(name) = tokens.next() else {
            return Err(LinkError::parse(CONTEXT, "empty command"));
        };
        let args: Vec<&str> = tokens.collect();

        let command = match name.to_ascii_lowercase().as_str() {
            "connect" => {
                expect_at_most(name, &args, 3)?;
                let transport = args.first().map(|t| t.parse::<TransportKind>()).transpose()?;
                let host = args.get(1).map(|h| h.to_string());
                let port = args.get(2).map(|p| parse_number::<u16>("port", p)).transpose()?;
                HostCommand::Connect { transport, host, port }
            }
            "disconnect" => {
                expect_at_most(name, &args, 0)?;
                HostCommand::Disconnect
            }
            "mode" => {
                expect_at_most(name, &args, 1)?;
                HostCommand::Mode(args.first().map(|m| parse_number::<u32>("mode", m)).transpose()?)
            }
            "bang" => {
                expect_at_most(name, &args, 0)?;
                HostCommand::Bang
            }
            other => return Err(LinkError::parse(CONTEXT, format!("unknown command '{other}'"))),
        };
        Ok(command)
    }
}

fn expect_at_most(name: &str, args: &[&str], max: usize) -> Result<()> {
    if args.len() > max {
        return Err(LinkError::parse(
            CONTEXT,
            format!("'{name}' takes at most {max} arguments, got {}", args.len()),
        ));
    }
    Ok(())
}

fn parse_number<T: FromStr>(what: &str, token: &str) -> Result<T> {
    token.parse().map_err(|_| LinkError::parse(CONTEXT, format!("invalid {what} '{token}'")))
}

/// Run one command against a session.
pub async fn execute(session: &mut LinkSession, command: HostCommand) -> Result<HostReply> {
    debug!(?command, "Executing host command");
    match command {
        HostCommand::Connect { transport, host, port } => {
            Ok(HostReply::Connect(session.connect(transport, host, port).await?))
        }
        HostCommand::Disconnect => Ok(HostReply::Disconnect { closed: session.disconnect().await }),
        HostCommand::Mode(requested) => Ok(HostReply::Mode(session.mode(requested).await?)),
        HostCommand::Bang => Ok(HostReply::Snapshot(session.request_snapshot())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_connect_variants() {
        assert_eq!(
            "connect".parse::<HostCommand>().unwrap(),
            HostCommand::Connect { transport: None, host: None, port: None }
        );
        assert_eq!(
            "connect TCP 192.168.1.10 5762".parse::<HostCommand>().unwrap(),
            HostCommand::Connect {
                transport: Some(TransportKind::Tcp),
                host: Some("192.168.1.10".into()),
                port: Some(5762),
            }
        );
        assert_eq!(
            "  CONNECT   udp  ".parse::<HostCommand>().unwrap(),
            HostCommand::Connect { transport: Some(TransportKind::Udp), host: None, port: None }
        );
    }

    #[test]
    fn parses_mode_and_bang() {
        assert_eq!("mode".parse::<HostCommand>().unwrap(), HostCommand::Mode(None));
        assert_eq!("mode 4".parse::<HostCommand>().unwrap(), HostCommand::Mode(Some(4)));
        assert_eq!("bang".parse::<HostCommand>().unwrap(), HostCommand::Bang);
        assert_eq!("disconnect".parse::<HostCommand>().unwrap(), HostCommand::Disconnect);
    }

    #[test]
    fn rejects_malformed_commands() {
        for line in ["", "launch", "connect tcp host 70000", "connect serial", "mode four", "bang now", "mode 1 2"] {
            let err = line.parse::<HostCommand>().unwrap_err();
            assert!(matches!(err, LinkError::Parse { .. }), "{line}: {err}");
        }
    }

    #[test]
    fn replies_serialize_for_hosts() {
        let json = serde_json::to_string(&HostReply::Mode(ModeOutcome::Current { custom_mode: Some(4) })).unwrap();
        assert_eq!(json, r#"{"reply":"mode","data":{"outcome":"current","custom_mode":4}}"#);

        let json = serde_json::to_string(&HostReply::Disconnect { closed: false }).unwrap();
        assert_eq!(json, r#"{"reply":"disconnect","data":{"closed":false}}"#);
    }

    #[tokio::test]
    async fn execute_drives_the_session() {
        let (connector, mut peers) = crate::test_utils::MemoryConnector::new();
        let mut session = LinkSession::with_connector(Default::default(), connector);

        let reply = execute(&mut session, "mode 3".parse().unwrap()).await;
        assert!(matches!(reply, Err(LinkError::NotConnected)));

        let reply = execute(&mut session, "connect".parse().unwrap()).await.unwrap();
        assert!(matches!(reply, HostReply::Connect(ConnectOutcome::Opened { generation: 1, .. })));
        let _peer = peers.recv().await.unwrap();

        let reply = execute(&mut session, HostCommand::Bang).await.unwrap();
        assert!(matches!(reply, HostReply::Snapshot(_)));

        let reply = execute(&mut session, HostCommand::Disconnect).await.unwrap();
        assert_eq!(reply, HostReply::Disconnect { closed: true });
    }
}
