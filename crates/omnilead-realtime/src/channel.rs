//! Websocket connection lifecycle with a tokio mpsc command pattern.
//!
//! The socket is owned by a dedicated tokio task. External code talks to it
//! through [`ChannelCommand`]s; inbound frames are decoded and published on
//! the [`EventBus`]. One connection exists per client instance: `connect`
//! while connecting or connected is a no-op, `disconnect` is idempotent and
//! always releases the transport.
//!
//! Connection attempts are epoch-tagged. `disconnect` bumps the epoch, so
//! an attempt whose handshake was still in flight cannot complete
//! afterwards, and a superseded socket task's cleanup cannot touch the
//! state of its successor.

use std::sync::{Arc, Mutex, MutexGuard};

use futures::{Sink, SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use omnilead_shared::types::ConversationId;

use crate::bus::{EventBus, RealtimeEvent};
use crate::state::ConnectionState;
use crate::wire::{ClientFrame, ServerFrame};

#[derive(Error, Debug)]
pub enum RealtimeError {
    #[error("WebSocket connect failed: {0}")]
    Connect(String),

    #[error("Failed to send auth frame: {0}")]
    Auth(String),
}

/// Commands sent *into* the socket task.
#[derive(Debug)]
pub enum ChannelCommand {
    /// Start receiving message pushes for a conversation.
    Join(ConversationId),
    /// Stop receiving message pushes for a conversation.
    Leave(ConversationId),
    /// Gracefully close the connection.
    Shutdown,
}

/// Lifecycle fields, guarded together so connect/disconnect interleavings
/// resolve under one lock.
struct ChannelInner {
    state: ConnectionState,
    /// Bumped by every connect attempt and every disconnect. An attempt or
    /// socket task whose epoch is no longer current has been superseded.
    epoch: u64,
    cmd_tx: Option<mpsc::Sender<ChannelCommand>>,
}

impl ChannelInner {
    fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            epoch: 0,
            cmd_tx: None,
        }
    }

    /// Claim the channel for a new connection attempt. Returns the attempt's
    /// epoch, or `None` when a connection is already active.
    fn begin_connect(&mut self) -> Option<u64> {
        if self.state != ConnectionState::Disconnected {
            return None;
        }
        self.state = ConnectionState::Connecting;
        self.epoch += 1;
        Some(self.epoch)
    }

    /// Install the command sender and mark Connected. Refused when the
    /// attempt was superseded by an intervening disconnect or newer connect.
    fn finish_connect(&mut self, epoch: u64, cmd_tx: mpsc::Sender<ChannelCommand>) -> bool {
        if epoch != self.epoch {
            return false;
        }
        self.cmd_tx = Some(cmd_tx);
        self.state = ConnectionState::Connected;
        true
    }

    /// Roll back an attempt that failed before completing.
    fn abort_connect(&mut self, epoch: u64) {
        if epoch == self.epoch {
            self.state = ConnectionState::Disconnected;
        }
    }

    /// Invalidate the current connection and any in-flight attempt. Returns
    /// the command sender of the live connection, if one existed.
    fn invalidate(&mut self) -> Option<mpsc::Sender<ChannelCommand>> {
        self.epoch += 1;
        self.state = ConnectionState::Disconnected;
        self.cmd_tx.take()
    }

    /// Socket task exit. A stale task (superseded connection) must leave the
    /// state of its successor alone; returns whether cleanup was applied.
    fn finish_task(&mut self, epoch: u64) -> bool {
        if epoch != self.epoch {
            return false;
        }
        self.state = ConnectionState::Disconnected;
        self.cmd_tx = None;
        true
    }
}

/// Handle to the process-wide realtime connection.
///
/// Cheap to clone; clones share the connection, state and event bus.
#[derive(Clone)]
pub struct RealtimeChannel {
    url: String,
    inner: Arc<Mutex<ChannelInner>>,
    bus: EventBus,
}

impl RealtimeChannel {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            inner: Arc::new(Mutex::new(ChannelInner::new())),
            bus: EventBus::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.lock().state
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Open the websocket and authenticate with `credential`.
    ///
    /// Resolves once the handshake has completed and the auth frame has been
    /// written; callers must await this before relying on push delivery.
    /// A no-op when already connecting or connected. A `disconnect` issued
    /// while the handshake is in flight wins: the attempt is abandoned and
    /// its transport released.
    pub async fn connect(&self, credential: &str) -> Result<(), RealtimeError> {
        let auth = ClientFrame::Auth {
            token: credential.to_string(),
        };
        let auth_json =
            serde_json::to_string(&auth).map_err(|e| RealtimeError::Auth(e.to_string()))?;

        let Some(epoch) = self.lock().begin_connect() else {
            debug!("connect() ignored, channel already active");
            return Ok(());
        };

        let (mut socket, _response) = match connect_async(&self.url).await {
            Ok(ok) => ok,
            Err(e) => {
                self.lock().abort_connect(epoch);
                return Err(RealtimeError::Connect(e.to_string()));
            }
        };

        if let Err(e) = socket.send(WsMessage::Text(auth_json)).await {
            self.lock().abort_connect(epoch);
            return Err(RealtimeError::Auth(e.to_string()));
        }

        let (cmd_tx, cmd_rx) = mpsc::channel::<ChannelCommand>(256);
        if !self.lock().finish_connect(epoch, cmd_tx) {
            debug!("Connection attempt superseded, releasing transport");
            let _ = socket.close(None).await;
            return Ok(());
        }
        info!(url = %self.url, "Realtime channel connected");
        self.bus.publish(&RealtimeEvent::Connected);

        let inner = self.inner.clone();
        let bus = self.bus.clone();
        tokio::spawn(async move {
            socket_loop(socket, cmd_rx, bus.clone()).await;
            let applied = inner.lock().expect("channel lock poisoned").finish_task(epoch);
            if applied {
                info!("Realtime channel closed");
                bus.publish(&RealtimeEvent::Disconnected);
            } else {
                debug!("Stale socket task exited, state untouched");
            }
        });

        Ok(())
    }

    /// Close the connection. Safe to call redundantly; always ends in
    /// `Disconnected` and stays there even if a connect attempt was still
    /// mid-handshake.
    pub fn disconnect(&self) {
        let tx = self.lock().invalidate();
        match tx {
            Some(tx) => {
                // The task also exits when all senders are dropped, so a
                // full queue is not a problem.
                let _ = tx.try_send(ChannelCommand::Shutdown);
                info!("Realtime disconnect requested");
            }
            None => debug!("disconnect() ignored, channel not connected"),
        }
    }

    /// Advisory: scope the push stream to include `id`. Silent no-op while
    /// disconnected.
    pub async fn join(&self, id: ConversationId) {
        self.send_command(ChannelCommand::Join(id)).await;
    }

    /// Advisory: stop receiving pushes for `id`. Silent no-op while
    /// disconnected.
    pub async fn leave(&self, id: ConversationId) {
        self.send_command(ChannelCommand::Leave(id)).await;
    }

    async fn send_command(&self, command: ChannelCommand) {
        let tx = self.lock().cmd_tx.clone();
        match tx {
            Some(tx) => {
                if let Err(e) = tx.send(command).await {
                    debug!(error = %e, "Realtime command dropped, channel closing");
                }
            }
            None => debug!(?command, "Realtime command ignored, not connected"),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChannelInner> {
        self.inner.lock().expect("channel lock poisoned")
    }
}

type Socket = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Socket task event loop: commands in, server frames out to the bus.
async fn socket_loop(
    socket: Socket,
    mut cmd_rx: mpsc::Receiver<ChannelCommand>,
    bus: EventBus,
) {
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            // --- Commands from the application ---
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(ChannelCommand::Join(id)) => {
                        send_frame(&mut sink, &ClientFrame::JoinConversation {
                            conversation_id: id,
                        })
                        .await;
                    }
                    Some(ChannelCommand::Leave(id)) => {
                        send_frame(&mut sink, &ClientFrame::LeaveConversation {
                            conversation_id: id,
                        })
                        .await;
                    }
                    Some(ChannelCommand::Shutdown) => {
                        info!("Realtime shutdown requested");
                        let _ = sink.send(WsMessage::Close(None)).await;
                        break;
                    }
                    None => {
                        // All senders dropped; treat like a shutdown.
                        debug!("Command channel closed, closing socket");
                        let _ = sink.send(WsMessage::Close(None)).await;
                        break;
                    }
                }
            }

            // --- Frames from the server ---
            frame = stream.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        dispatch_frame(&bus, &text);
                    }
                    Some(Ok(WsMessage::Close(_))) => {
                        info!("Server closed the realtime connection");
                        break;
                    }
                    // Pings are answered by the protocol layer.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "Realtime socket error");
                        break;
                    }
                    None => {
                        info!("Realtime socket stream ended");
                        break;
                    }
                }
            }
        }
    }
}

async fn send_frame<S>(sink: &mut S, frame: &ClientFrame)
where
    S: Sink<WsMessage> + Unpin,
    S::Error: std::fmt::Display,
{
    match serde_json::to_string(frame) {
        Ok(json) => {
            if let Err(e) = sink.send(WsMessage::Text(json)).await {
                warn!(error = %e, "Failed to send realtime frame");
            }
        }
        Err(e) => warn!(error = %e, "Failed to encode realtime frame"),
    }
}

/// Decode one server frame and publish it. Unknown or malformed frames are
/// logged and dropped, never fatal.
fn dispatch_frame(bus: &EventBus, text: &str) {
    match serde_json::from_str::<ServerFrame>(text) {
        Ok(ServerFrame::NewMessage {
            conversation_id,
            message,
        }) => {
            debug!(conversation = %conversation_id, "new_message push");
            bus.publish(&RealtimeEvent::NewMessage {
                conversation_id,
                message,
            });
        }
        Ok(ServerFrame::ConversationUpdated { conversation }) => {
            debug!(conversation = %conversation.id, "conversation_updated push");
            bus.publish(&RealtimeEvent::ConversationUpdated(conversation));
        }
        Err(e) => {
            warn!(error = %e, "Unrecognized realtime frame dropped");
        }
    }
}
