//! Realtime sync client
//!
//! Holds a Socket.IO session to the backend and reconciles every
//! `update_records` / `update_parking_spaces` snapshot into the shared tables.
//! Connection loss is reported through [`ChannelStatus`] and [`ChannelEvent`]
//! and followed by the reconnect loop; it never takes the desk down.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::socketio::{
    connect_packet, decode_engine, decode_socket, disconnect_packet, encode_engine, EnginePacket,
    SocketPacket,
};
use crate::state::{ChannelStatus, StateHandle};
use crate::table::ReconcileReport;
use crate::transport::{ConnectionFactory, ConnectionPair, FrameWriter};
use crate::types::{Record, Space};
use crate::DeskError;

pub const RECORDS_EVENT: &str = "update_records";
pub const SPACES_EVENT: &str = "update_parking_spaces";

/// Events broadcast by the sync client
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Connected { sid: String },
    Disconnected { reason: String },
    Reconnecting { attempt: u32 },
    ReconnectFailed { reason: String },
    RecordsUpdated(ReconcileReport),
    SpacesUpdated(ReconcileReport),
    Ignored { name: String },
}

/// How a session ended
#[derive(Debug)]
enum SessionEnd {
    Cancelled,
    Lost { reason: String, established: bool },
}

enum FrameOutcome {
    Continue,
    Lost(String),
}

/// Push channel client
pub struct SyncClient {
    url: String,
    config: SyncConfig,
    factory: Arc<dyn ConnectionFactory>,
    state: StateHandle,
    events: broadcast::Sender<ChannelEvent>,
}

impl std::fmt::Debug for SyncClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncClient")
            .field("url", &self.url)
            .field("config", &self.config)
            .finish()
    }
}

impl SyncClient {
    /// `url` is the full Socket.IO endpoint (see [`crate::socketio::endpoint_url`])
    pub fn new(
        url: impl Into<String>,
        config: SyncConfig,
        factory: Arc<dyn ConnectionFactory>,
        state: StateHandle,
    ) -> Self {
        let (events, _) = broadcast::channel(100);
        Self {
            url: url.into(),
            config,
            factory,
            state,
            events,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: ChannelEvent) {
        let _ = self.events.send(event);
    }

    async fn set_status(&self, status: ChannelStatus) {
        self.state.write().await.set_channel(status);
    }

    /// Connect and keep reconnecting until cancelled or retries run out
    pub async fn run(&self, cancel: CancellationToken) -> crate::Result<()> {
        let interval = Duration::from_secs(self.config.reconnect_interval_seconds);
        let timeout = Duration::from_secs(self.config.connection_timeout_seconds);
        let max_retries = self.config.max_retries;
        let mut attempt = 0u32;

        loop {
            if attempt == 0 {
                self.set_status(ChannelStatus::Connecting).await;
            } else {
                info!(
                    "Reconnecting push channel (attempt {}/{})",
                    attempt,
                    max_retries.map_or("unlimited".to_string(), |m| m.to_string())
                );
                self.set_status(ChannelStatus::Reconnecting { attempt }).await;
                self.emit(ChannelEvent::Reconnecting { attempt });
            }

            let connected = tokio::select! {
                result = self.factory.connect(&self.url, timeout) => result,
                _ = cancel.cancelled() => {
                    self.set_status(ChannelStatus::Disconnected { reason: "cancelled".to_string() }).await;
                    return Ok(());
                }
            };

            let reason = match connected {
                Ok(pair) => match self.session(pair, &cancel).await {
                    SessionEnd::Cancelled => {
                        debug!("Push channel closed on shutdown");
                        self.set_status(ChannelStatus::Disconnected {
                            reason: "cancelled".to_string(),
                        })
                        .await;
                        return Ok(());
                    }
                    SessionEnd::Lost {
                        reason,
                        established,
                    } => {
                        warn!("Push channel lost: {}", reason);
                        if established {
                            attempt = 0;
                        }
                        reason
                    }
                },
                Err(e) => {
                    debug!("Push channel connection attempt failed: {}", e);
                    e.to_string()
                }
            };

            self.set_status(ChannelStatus::Disconnected {
                reason: reason.clone(),
            })
            .await;
            self.emit(ChannelEvent::Disconnected {
                reason: reason.clone(),
            });

            if !self.config.auto_reconnect {
                return Err(DeskError::ConnectionFailed(reason));
            }

            attempt += 1;
            if let Some(max) = max_retries {
                if attempt > max {
                    let reason = format!("Max retries ({}) exceeded", max);
                    warn!("Push channel reconnection failed: {}", reason);
                    self.emit(ChannelEvent::ReconnectFailed {
                        reason: reason.clone(),
                    });
                    return Err(DeskError::ConnectionFailed(reason));
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = cancel.cancelled() => {
                    self.emit(ChannelEvent::ReconnectFailed { reason: "Reconnection cancelled".to_string() });
                    return Ok(());
                }
            }
        }
    }

    async fn session(&self, pair: ConnectionPair, cancel: &CancellationToken) -> SessionEnd {
        let ConnectionPair {
            mut reader,
            mut writer,
        } = pair;
        // Until the open handshake arrives, fall back to the connect timeout
        let mut liveness = Duration::from_secs(self.config.connection_timeout_seconds);
        let mut established = false;

        loop {
            let read = tokio::select! {
                read = tokio::time::timeout(liveness, reader.read_frame()) => read,
                _ = cancel.cancelled() => {
                    let _ = writer.write_frame(&disconnect_packet()).await;
                    let _ = writer.close().await;
                    return SessionEnd::Cancelled;
                }
            };

            let text = match read {
                Err(_) => {
                    return SessionEnd::Lost {
                        reason: format!("no heartbeat for {:?}", liveness),
                        established,
                    }
                }
                Ok(Err(e)) => {
                    return SessionEnd::Lost {
                        reason: format!("read error: {}", e),
                        established,
                    }
                }
                Ok(Ok(None)) => {
                    return SessionEnd::Lost {
                        reason: "connection closed by server".to_string(),
                        established,
                    }
                }
                Ok(Ok(Some(text))) => text,
            };

            match self
                .handle_frame(&text, writer.as_mut(), &mut liveness, &mut established)
                .await
            {
                Ok(FrameOutcome::Continue) => {}
                Ok(FrameOutcome::Lost(reason)) => {
                    let _ = writer.close().await;
                    return SessionEnd::Lost {
                        reason,
                        established,
                    };
                }
                Err(e) => {
                    warn!("Ignoring push channel frame {:?}: {}", text, e);
                }
            }
        }
    }

    async fn handle_frame(
        &self,
        text: &str,
        writer: &mut dyn FrameWriter,
        liveness: &mut Duration,
        established: &mut bool,
    ) -> crate::Result<FrameOutcome> {
        match decode_engine(text)? {
            EnginePacket::Open(handshake) => {
                debug!(
                    "Engine.IO open: sid={} ping={}ms/{}ms",
                    handshake.sid, handshake.ping_interval, handshake.ping_timeout
                );
                *liveness = Duration::from_millis(handshake.liveness_ms());
                if let Err(e) = writer.write_frame(&connect_packet()).await {
                    return Ok(FrameOutcome::Lost(e.to_string()));
                }
            }
            EnginePacket::Ping(data) => {
                if let Err(e) = writer.write_frame(&encode_engine(&EnginePacket::Pong(data))).await {
                    return Ok(FrameOutcome::Lost(e.to_string()));
                }
            }
            EnginePacket::Close => {
                return Ok(FrameOutcome::Lost("server closed the session".to_string()));
            }
            EnginePacket::Message(body) => match decode_socket(&body)? {
                SocketPacket::Connect(data) => {
                    let sid = data
                        .as_ref()
                        .and_then(|d| d.get("sid"))
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    info!("Push channel connected (sid {})", sid);
                    *established = true;
                    self.set_status(ChannelStatus::Connected).await;
                    self.emit(ChannelEvent::Connected { sid });
                }
                SocketPacket::Disconnect => {
                    return Ok(FrameOutcome::Lost("server disconnected the namespace".to_string()));
                }
                SocketPacket::ConnectError(data) => {
                    return Ok(FrameOutcome::Lost(format!("connect rejected: {}", data)));
                }
                SocketPacket::Event { name, payload } => {
                    self.handle_event(&name, payload).await;
                }
                SocketPacket::Ack(_) => {}
            },
            EnginePacket::Pong(_) | EnginePacket::Upgrade | EnginePacket::Noop => {}
        }
        Ok(FrameOutcome::Continue)
    }

    /// Apply one pushed event to the shared state
    pub async fn handle_event(&self, name: &str, payload: Value) {
        match name {
            RECORDS_EVENT => match serde_json::from_value::<Vec<Record>>(payload) {
                Ok(records) => {
                    let report = self.state.write().await.apply_records(&records);
                    debug!("Records snapshot applied: {:?}", report);
                    self.emit(ChannelEvent::RecordsUpdated(report));
                }
                Err(e) => warn!("Ignoring malformed {} payload: {}", RECORDS_EVENT, e),
            },
            SPACES_EVENT => match serde_json::from_value::<Vec<Space>>(payload) {
                Ok(spaces) => {
                    let report = self.state.write().await.apply_spaces(&spaces);
                    debug!("Spaces snapshot applied: {:?}", report);
                    self.emit(ChannelEvent::SpacesUpdated(report));
                }
                Err(e) => warn!("Ignoring malformed {} payload: {}", SPACES_EVENT, e),
            },
            other => {
                debug!("Ignoring push event {}", other);
                self.emit(ChannelEvent::Ignored {
                    name: other.to_string(),
                });
            }
        }
    }
}
