//! Link session manager
//!
//! [`LinkSession`] is the only object a host talks to. It owns at most one
//! live session at a time, each run by its own driver task, and turns host
//! commands into lifecycle transitions:
//!
//! ```text
//! Disconnected --open--> Connecting --transport up--> Connected
//!      ^                      |                           |
//!      +------ disconnect / transport error / peer close -+
//! ```
//!
//! Sessions are numbered by a generation counter. Ending a session retires its
//! generation before the driver is cancelled, so anything the old driver still
//! does while winding down never reaches the host.

use futures::StreamExt;
use futures::stream::BoxStream;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, oneshot};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, WatchStream};
use tracing::{debug, info, warn};

use crate::config::LinkConfig;
use crate::driver::{CommandToken, Driver, DriverChannels, DriverCommand, SessionGuard};
use crate::stream::ThrottleExt;
use crate::transport::{Connector, SocketConnector};
use crate::types::{
    DisconnectReason, LinkEndpoint, LinkEvent, LinkState, TransportKind, UpdateRate, VehicleState,
};
use crate::{LinkError, Result};


/// What a `connect` toggle did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConnectOutcome {
    /// A new session started connecting.
    Opened { endpoint: LinkEndpoint, generation: u64 },
    /// The connected session was closed.
    Closed,
}

/// What a `mode` command did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ModeOutcome {
    /// Last reported custom mode, if the vehicle reported one.
    Current { custom_mode: Option<u32> },
    /// A mode change frame was sent.
    Requested { token: CommandToken },
}

struct ActiveSession {
    endpoint: LinkEndpoint,
    generation: u64,
    channels: DriverChannels,
}

impl ActiveSession {
    fn state(&self) -> LinkState {
        *self.channels.link.borrow()
    }
}

/// Manages the link to one vehicle.
pub struct LinkSession {
    config: LinkConfig,
    connector: Arc<dyn Connector>,
    generation: Arc<AtomicU64>,
    events: broadcast::Sender<LinkEvent>,
    active: Option<ActiveSession>,
}

impl LinkSession {
    /// Manager using real sockets.
    pub fn new(config: LinkConfig) -> Self {
        let connector = Arc::new(SocketConnector::new(config.udp_local_port));
        Self::with_connector(config, connector)
    }

    /// Manager using a custom transport factory.
    pub fn with_connector(config: LinkConfig, connector: Arc<dyn Connector>) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self { config, connector, generation: Arc::new(AtomicU64::new(0)), events, active: None }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LinkState {
        self.active.as_ref().map_or(LinkState::Disconnected, ActiveSession::state)
    }

    /// Endpoint of the live session.
    pub fn endpoint(&self) -> Option<&LinkEndpoint> {
        self.active.as_ref().filter(|active| active.state().is_active()).map(|active| &active.endpoint)
    }

    /// Generation of the most recent session, 0 before the first one.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Start a session to `endpoint`.
    ///
    /// Returns the new session's generation. Fails with
    /// [`LinkError::AlreadyConnected`] unless the link is disconnected.
    /// Transport failures are reported asynchronously as events.
    pub fn open(&mut self, endpoint: LinkEndpoint) -> Result<u64> {
        self.reap();
        let state = self.state();
        if state.is_active() {
            debug!(%state, "Rejecting open");
            return Err(LinkError::AlreadyConnected { state });
        }

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let guard = SessionGuard::new(generation, self.generation.clone());
        info!(%endpoint, generation, "Opening link");

        let channels =
            Driver::spawn(endpoint.clone(), self.connector.clone(), &self.config, guard, self.events.clone());
        self.active = Some(ActiveSession { endpoint, generation, channels });
        Ok(generation)
    }

    /// Host-facing connect toggle.
    ///
    /// Missing parts fall back to the configured endpoint. A connected link is
    /// closed instead; a link still connecting rejects the command.
    pub async fn connect(
        &mut self,
        transport: Option<TransportKind>,
        host: Option<String>,
        port: Option<u16>,
    ) -> Result<ConnectOutcome> {
        self.reap();
        match self.state() {
            LinkState::Connected => {
                self.disconnect().await;
                Ok(ConnectOutcome::Closed)
            }
            LinkState::Connecting => Err(LinkError::AlreadyConnected { state: LinkState::Connecting }),
            LinkState::Disconnected => {
                let endpoint = LinkEndpoint::with_defaults(transport, host, port, &self.config.endpoint);
                let generation = self.open(endpoint.clone())?;
                Ok(ConnectOutcome::Opened { endpoint, generation })
            }
        }
    }

    /// Tear down the current session and wait for its driver to finish.
    ///
    /// Returns `false` when there was nothing to tear down.
    pub async fn disconnect(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };
        let was_active = active.state().is_active();

        // Retire the generation before the driver notices cancellation
        self.generation.fetch_add(1, Ordering::AcqRel);
        active.channels.cancel.cancel();
        if let Err(e) = active.channels.task.await {
            warn!(generation = active.generation, "Driver task failed: {}", e);
        }

        if was_active {
            info!(endpoint = %active.endpoint, generation = active.generation, "Link disconnected");
            let _ = self.events.send(LinkEvent::Disconnected { reason: DisconnectReason::Requested });
        }
        was_active
    }

    /// Copy of the aggregated vehicle state; default when disconnected.
    pub fn snapshot(&self) -> VehicleState {
        match &self.active {
            Some(active) if active.state().is_active() => active.channels.state.borrow().clone(),
            _ => VehicleState::default(),
        }
    }

    /// Snapshot requested by the host (`bang`).
    pub fn request_snapshot(&self) -> VehicleState {
        self.snapshot()
    }

    /// Send a SET_MODE frame built from the current state.
    ///
    /// Fire and forget: the returned token only proves the frame was written.
    pub async fn send_mode_change(&self, custom_mode: u32) -> Result<CommandToken> {
        let active = match &self.active {
            Some(active) if active.state() == LinkState::Connected => active,
            _ => return Err(LinkError::NotConnected),
        };

        let (reply, response) = oneshot::channel();
        active
            .channels
            .commands
            .send(DriverCommand::ModeChange { custom_mode, reply })
            .await
            .map_err(|_| LinkError::SessionClosed)?;
        response.await.map_err(|_| LinkError::SessionClosed)?
    }

    /// Report the current mode (`None`) or request a change (`Some`).
    pub async fn mode(&self, requested: Option<u32>) -> Result<ModeOutcome> {
        if self.state() != LinkState::Connected {
            return Err(LinkError::NotConnected);
        }
        match requested {
            None => {
                let custom_mode = self.snapshot().custom_mode();
                let _ = self.events.send(LinkEvent::ModeReport { custom_mode });
                Ok(ModeOutcome::Current { custom_mode })
            }
            Some(custom_mode) => {
                let token = self.send_mode_change(custom_mode).await?;
                Ok(ModeOutcome::Requested { token })
            }
        }
    }

    /// Raw receiver for host notifications.
    pub fn subscribe_events(&self) -> broadcast::Receiver<LinkEvent> {
        self.events.subscribe()
    }

    /// Host notifications as a stream. Lagging subscribers skip what they missed.
    pub fn events(&self) -> BoxStream<'static, LinkEvent> {
        BroadcastStream::new(self.events.subscribe())
            .filter_map(|event| async move {
                match event {
                    Ok(event) => Some(event),
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(skipped, "Event subscriber lagged");
                        None
                    }
                }
            })
            .boxed()
    }

    /// Snapshots of the current session, throttled to `rate`.
    ///
    /// Yields the current state immediately and ends with the session.
    /// Empty when disconnected.
    pub fn snapshots(&self, rate: UpdateRate) -> BoxStream<'static, VehicleState> {
        let Some(active) = self.active.as_ref().filter(|active| active.state().is_active()) else {
            return futures::stream::empty().boxed();
        };

        let states = WatchStream::new(active.channels.state.clone());
        match rate.throttle_interval() {
            None => states.boxed(),
            Some(interval) => states.throttle(interval).boxed(),
        }
    }

    /// Wait until the link reaches `target`.
    ///
    /// Fails with [`LinkError::SessionClosed`] if the session ends first.
    pub async fn wait_for_state(&self, target: LinkState) -> Result<()> {
        let Some(active) = &self.active else {
            return match target {
                LinkState::Disconnected => Ok(()),
                _ => Err(LinkError::SessionClosed),
            };
        };

        let mut link = active.channels.link.clone();
        link.wait_for(|state| *state == target).await.map_err(|_| LinkError::SessionClosed)?;
        Ok(())
    }

    /// Drop a session whose driver already ended on its own.
    fn reap(&mut self) {
        let finished = self.active.as_ref().is_some_and(|active| !active.state().is_active());
        if let Some(active) = self.active.take_if(|_| finished) {
            debug!(generation = active.generation, "Reaping finished session");
        }
    }
}

impl Drop for LinkSession {
    fn drop(&mut self) {
        if let Some(active) = &self.active {
            debug!(generation = active.generation, "Dropping link session");
            self.generation.fetch_add(1, Ordering::AcqRel);
            active.channels.cancel.cancel();
        }
    }
}
