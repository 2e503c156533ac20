//! Driver spawns and runs the task that owns one link session
//!
//! The driver task owns the transport, codec, dispatcher, state store and
//! heartbeat timer, and multiplexes them in a single `select!` loop. The
//! session talks to it through watch receivers, a command channel and a
//! cancellation token.

use bytes::BytesMut;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::codec::Decoder;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::commands::CommandBuilder;
use crate::config::LinkConfig;
use crate::dispatcher::MessageDispatcher;
use crate::heartbeat::HeartbeatScheduler;
use crate::protocol::{MavlinkCodec, Outbound};
use crate::store::VehicleStateStore;
use crate::transport::{Connector, Transport};
use crate::types::{Diagnostic, DisconnectReason, LinkEndpoint, LinkEvent, LinkState, VehicleState};
use crate::{LinkError, Result};

const COMMAND_QUEUE_DEPTH: usize = 16;

/// Identifies the session a driver belongs to.
///
/// The manager bumps the shared counter whenever a session ends, so a driver
/// that is still winding down sees itself as stale and stays silent.
#[derive(Debug, Clone)]
pub struct SessionGuard {
    generation: u64,
    current: Arc<AtomicU64>,
}

impl SessionGuard {
    pub fn new(generation: u64, current: Arc<AtomicU64>) -> Self {
        Self { generation, current }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::Acquire) == self.generation
    }
}

/// Proof that a command frame was written to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommandToken {
    pub generation: u64,
    /// Sequence number of the frame carrying the command
    pub sequence: u8,
}

/// Requests the session forwards to its driver.
#[derive(Debug)]
pub enum DriverCommand {
    ModeChange { custom_mode: u32, reply: oneshot::Sender<Result<CommandToken>> },
}

/// Result of spawning a driver task
pub struct DriverChannels {
    /// Aggregated vehicle state
    pub state: watch::Receiver<VehicleState>,
    /// Lifecycle of the link
    pub link: watch::Receiver<LinkState>,
    /// Command channel into the driver
    pub commands: mpsc::Sender<DriverCommand>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
    /// Handle to await full teardown
    pub task: JoinHandle<()>,
}

/// Driver spawns the per-session task
pub struct Driver;

impl Driver {
    /// Spawn a driver that connects to `endpoint` and serves the link until
    /// cancelled or the transport fails.
    ///
    /// The link starts in [`LinkState::Connecting`].
    pub fn spawn(
        endpoint: LinkEndpoint,
        connector: Arc<dyn Connector>,
        config: &LinkConfig,
        guard: SessionGuard,
        events: broadcast::Sender<LinkEvent>,
    ) -> DriverChannels {
        let store = VehicleStateStore::new();
        let state = store.subscribe();
        let (link_tx, link) = watch::channel(LinkState::Connecting);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let cancel = CancellationToken::new();

        let driver = SessionDriver {
            endpoint,
            guard,
            codec: MavlinkCodec::new(config.protocol, config.system_id, config.component_id),
            builder: CommandBuilder::new(config.targets),
            dispatcher: MessageDispatcher::new(),
            heartbeat: HeartbeatScheduler::new(config.heartbeat_interval()),
            store,
            link_tx,
            events,
            cancel: cancel.clone(),
            buffer: BytesMut::new(),
        };

        let task = tokio::spawn(driver.run(connector, command_rx));

        DriverChannels { state, link, commands: command_tx, cancel, task }
    }
}

struct SessionDriver {
    endpoint: LinkEndpoint,
    guard: SessionGuard,
    codec: MavlinkCodec,
    builder: CommandBuilder,
    dispatcher: MessageDispatcher,
    heartbeat: HeartbeatScheduler,
    store: VehicleStateStore,
    link_tx: watch::Sender<LinkState>,
    events: broadcast::Sender<LinkEvent>,
    cancel: CancellationToken,
    buffer: BytesMut,
}

impl SessionDriver {
    async fn run(mut self, connector: Arc<dyn Connector>, mut commands: mpsc::Receiver<DriverCommand>) {
        let generation = self.guard.generation();
        info!(endpoint = %self.endpoint, generation, "Session driver started");

        let cancel = self.cancel.clone();
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(generation, "Cancelled while connecting");
                self.finish(None, None).await;
                return;
            }
            opened = connector.open(&self.endpoint) => opened,
        };

        let mut transport = match opened {
            Ok(transport) => transport,
            Err(e) => {
                error!(endpoint = %self.endpoint, "Connect failed: {}", e);
                let reason = self.report_transport_error(&e);
                self.finish(None, Some(reason)).await;
                return;
            }
        };

        info!(generation, "Link connected via {}", transport.describe());
        self.link_tx.send_replace(LinkState::Connected);

        let reason = self.serve(transport.as_mut(), &mut commands).await;
        self.finish(Some(transport), reason).await;
    }

    /// Main loop. Returns why the link ended, `None` when cancelled.
    async fn serve(
        &mut self,
        transport: &mut dyn Transport,
        commands: &mut mpsc::Receiver<DriverCommand>,
    ) -> Option<DisconnectReason> {
        let request = self.builder.stream_rate_request();
        if let Err(e) = self.send(transport, &request).await {
            return Some(self.report_transport_error(&e));
        }

        let heartbeat_timer = sleep_until(self.heartbeat.next_deadline(Instant::now()));
        tokio::pin!(heartbeat_timer);
        let cancel = self.cancel.clone();
        let mut commands_open = true;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!(generation = self.guard.generation(), "Driver cancelled");
                    return None;
                }

                received = transport.recv() => match received {
                    Ok(Some(bytes)) => {
                        self.buffer.extend_from_slice(&bytes);
                        self.drain_frames(transport.is_datagram());
                    }
                    Ok(None) => {
                        info!(peer = %transport.describe(), "Peer closed the link");
                        return Some(DisconnectReason::PeerClosed);
                    }
                    Err(e) => {
                        error!("Receive failed: {}", e);
                        return Some(self.report_transport_error(&e));
                    }
                },

                _ = &mut heartbeat_timer => {
                    let heartbeat = self.builder.heartbeat();
                    if let Err(e) = self.send(transport, &heartbeat).await {
                        error!("Heartbeat send failed: {}", e);
                        return Some(self.report_transport_error(&e));
                    }
                    let now = Instant::now();
                    self.heartbeat.record_sent(now);
                    heartbeat_timer.as_mut().reset(self.heartbeat.next_deadline(now));
                }

                command = commands.recv(), if commands_open => match command {
                    Some(DriverCommand::ModeChange { custom_mode, reply }) => {
                        let message = self.builder.mode_change(&self.store.snapshot(), custom_mode);
                        match self.send(transport, &message).await {
                            Ok(sequence) => {
                                debug!(custom_mode, sequence, "Mode change sent");
                                let token = CommandToken { generation: self.guard.generation(), sequence };
                                let _ = reply.send(Ok(token));
                            }
                            Err(e) => {
                                error!(custom_mode, "Mode change send failed: {}", e);
                                let reason = self.report_transport_error(&e);
                                let _ = reply.send(Err(e));
                                return Some(reason);
                            }
                        }
                    }
                    None => commands_open = false,
                },
            }
        }
    }

    /// Decode and dispatch every complete frame in the receive buffer.
    ///
    /// A datagram never continues into the next one, so after a datagram the
    /// buffer is drained to empty instead of holding a partial frame.
    fn drain_frames(&mut self, datagram: bool) {
        loop {
            let decoded = if datagram {
                self.codec.decode_eof(&mut self.buffer)
            } else {
                self.codec.decode(&mut self.buffer)
            };
            let inbound = match decoded {
                Ok(Some(inbound)) => inbound,
                Ok(None) => break,
                Err(e) => {
                    warn!("Decoder error, dropping buffered bytes: {}", e);
                    self.buffer.clear();
                    break;
                }
            };

            if !self.guard.is_current() {
                trace!(generation = self.guard.generation(), "Stale session, dropping frame");
                continue;
            }

            if let Some(event) = self.dispatcher.dispatch(&self.store, inbound, SystemTime::now()) {
                self.emit(event);
            }
        }
    }

    async fn send(&mut self, transport: &mut dyn Transport, message: &Outbound) -> Result<u8> {
        let sequence = self.codec.next_sequence();
        let bytes = self.codec.encode_frame(message.clone())?;
        transport.send(&bytes).await?;
        trace!(message = message.type_name(), sequence, "Sent frame");
        Ok(sequence)
    }

    fn emit(&self, event: LinkEvent) {
        if self.guard.is_current() {
            // No subscribers is fine
            let _ = self.events.send(event);
        }
    }

    fn report_transport_error(&self, error: &LinkError) -> DisconnectReason {
        let reason = error.to_string();
        self.emit(LinkEvent::Diagnostic(Diagnostic::TransportError { reason: reason.clone() }));
        DisconnectReason::TransportError { reason }
    }

    async fn finish(&mut self, transport: Option<Box<dyn Transport>>, reason: Option<DisconnectReason>) {
        if let Some(mut transport) = transport {
            if let Err(e) = transport.close().await {
                debug!("Transport close failed: {}", e);
            }
        }

        self.store.mark_disconnected();
        if let Some(reason) = reason {
            self.emit(LinkEvent::Disconnected { reason });
        }
        self.link_tx.send_replace(LinkState::Disconnected);

        info!(
            generation = self.guard.generation(),
            codec = ?self.codec.stats(),
            dispatch = ?self.dispatcher.stats(),
            "Session driver ended"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_goes_stale_when_counter_moves() {
        let counter = Arc::new(AtomicU64::new(3));
        let guard = SessionGuard::new(3, counter.clone());
        assert!(guard.is_current());

        counter.fetch_add(1, Ordering::AcqRel);
        assert!(!guard.is_current());
        assert_eq!(guard.generation(), 3);
    }
}
