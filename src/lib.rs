//! Link session manager for MAVLink vehicles.
//!
//! mavsession keeps one live telemetry and command session with a remote
//! vehicle over TCP or UDP, the way a ground station plugin does.
//!
//! # Features
//!
//! - **Connection lifecycle**: `connect` toggles a session on and off; a
//!   generation counter keeps late callbacks of an ended session out
//! - **Heartbeat pacing**: outbound heartbeats at a fixed interval without drift
//! - **Aggregated state**: the latest fields of every message type, merged
//!   frame by frame and published as snapshots
//! - **Commands**: stream-rate requests and mode changes built from the last
//!   reported state
//! - **Diagnostics**: checksum failures and transport errors as events, never
//!   as a stopped stream
//!
//! # Example
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use mavsession::{LinkConfig, LinkEvent, LinkSession, TransportKind};
//!
//! #[tokio::main]
//! async fn main() -> mavsession::Result<()> {
//!     let mut session = LinkSession::new(LinkConfig::default());
//!     let mut events = session.events();
//!
//!     session.connect(Some(TransportKind::Tcp), None, Some(5760)).await?;
//!
//!     while let Some(event) = events.next().await {
//!         if event == LinkEvent::BecameConnected {
//!             session.mode(Some(4)).await?;
//!             break;
//!         }
//!     }
//!
//!     println!("{:?}", session.snapshot());
//!     session.disconnect().await;
//!     Ok(())
//! }
//! ```

mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Wire protocol
pub mod protocol;
pub mod transport;

// Session processing
pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod driver;
pub mod heartbeat;
pub mod host;
pub mod session;
pub mod store;
pub mod stream;

// Core exports
pub use error::*;
pub use types::*;

// Main API exports
pub use commands::{CommandBuilder, CommandTargets};
pub use config::LinkConfig;
pub use driver::CommandToken;
pub use host::{HostCommand, HostReply};
pub use session::{ConnectOutcome, LinkSession, ModeOutcome};
pub use transport::{Connector, SocketConnector, Transport};
