//! WebSocket Game Server
//!
//! Async WebSocket server for the crash room.
//! Handles connections, routes bets into the room and drives the tick loop.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock, broadcast};
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn, error, debug, instrument};

use crate::config::ServerConfig;
use crate::game::state::PlayerId;
use crate::network::protocol::{ClientMessage, ServerMessage, ServerError, ErrorCode};
use crate::network::room::Room;

/// How long a closing connection gets to flush its queue.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// The shared room.
    room: Arc<RwLock<Room>>,
    /// Connected clients.
    clients: Arc<RwLock<BTreeMap<SocketAddr, PlayerId>>>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let room = Room::new(config.game.clone());

        Self {
            config,
            room: Arc::new(RwLock::new(room)),
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Bind the configured address and run until shutdown.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Run on an already bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        info!(
            "Crash server v{} listening on {}",
            self.config.version,
            listener.local_addr()?
        );

        let tick_room = self.room.clone();
        let tick_period = self.config.game.tick_period();
        let tick_shutdown = self.shutdown_tx.subscribe();

        // Spawn tick task
        let tick_handle = tokio::spawn(async move {
            Self::run_tick_loop(tick_room, tick_period, tick_shutdown).await;
        });

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let clients_count = self.clients.read().await.len();
                            if clients_count >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                Self::reject_overloaded(stream, addr);
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        if let Err(e) = tick_handle.await {
            error!("Tick task failed: {}", e);
        }

        Ok(())
    }

    /// Drive the room at a fixed rate. Late ticks are skipped, not bunched.
    async fn run_tick_loop(
        room: Arc<RwLock<Room>>,
        period: Duration,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        let mut tick_interval = interval(period);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    let result = room.write().await.tick();
                    if let Some(transition) = result.transition {
                        debug!("Phase transition: {:?}", transition);
                    }
                }
                _ = shutdown_rx.recv() => {
                    debug!("Tick loop stopped");
                    break;
                }
            }
        }
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let clients = self.clients.clone();
        let room = self.room.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(64);
            let player_id = PlayerId::random();

            // Register client
            clients.write().await.insert(addr, player_id);
            let mut evicted = room.write().await.join(player_id, msg_tx.clone());
            info!("New player {} from {}", player_id.to_uuid_string(), addr);

            // Spawn message sender task
            let mut sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                let _ = ws_sender.close().await;
            });

            // Handle incoming messages
            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                match ClientMessage::from_json(&text) {
                                    Ok(client_msg) => {
                                        Self::handle_client_message(player_id, client_msg, &room, &msg_tx).await;
                                    }
                                    Err(e) => {
                                        debug!("Invalid message from {}: {}", addr, e);
                                        Self::send_invalid_input(&msg_tx).await;
                                    }
                                }
                            }
                            Some(Ok(Message::Binary(_))) => {
                                debug!("Binary frame from {} rejected", addr);
                                Self::send_invalid_input(&msg_tx).await;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                error!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = &mut evicted => {
                        warn!("Client {} fell behind, disconnecting", addr);
                        break;
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = msg_tx.send(ServerMessage::Shutdown {
                            reason: "Server shutting down".to_string(),
                        }).await;
                        break;
                    }
                }
            }

            // Cleanup: once both senders are gone the writer drains and exits.
            let final_balance = room.write().await.leave(&player_id);
            clients.write().await.remove(&addr);
            drop(msg_tx);

            if tokio::time::timeout(FLUSH_TIMEOUT, &mut sender_task).await.is_err() {
                sender_task.abort();
            }

            info!(
                "Client {} ({}) cleaned up, final balance {:?}",
                addr,
                player_id.short(),
                final_balance
            );
        });
    }

    /// Tell a client over the cap why it is turned away, then close.
    fn reject_overloaded(stream: TcpStream, addr: SocketAddr) {
        tokio::spawn(async move {
            let mut ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    debug!("WebSocket handshake failed for rejected {}: {}", addr, e);
                    return;
                }
            };

            let rejection = ServerMessage::Error(ServerError {
                code: ErrorCode::ServerOverloaded,
                message: "Server is full".to_string(),
            });
            match rejection.to_json() {
                Ok(text) => {
                    let _ = ws_stream.send(Message::Text(text)).await;
                }
                Err(e) => error!("Failed to serialize message: {}", e),
            }
            let _ = ws_stream.close(None).await;
        });
    }

    /// Handle a client message.
    async fn handle_client_message(
        player_id: PlayerId,
        msg: ClientMessage,
        room: &Arc<RwLock<Room>>,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        match msg {
            ClientMessage::Bet { amount } => {
                // The player already got the outcome through the room.
                let result = room.write().await.bet(player_id, amount);
                if let Err(e) = result {
                    debug!("Bet from {} rejected: {}", player_id.short(), e);
                }
            }
            ClientMessage::Ping { timestamp } => {
                let _ = sender.send(ServerMessage::Pong {
                    timestamp,
                    server_time: chrono::Utc::now().timestamp_millis(),
                }).await;
            }
        }
    }

    async fn send_invalid_input(sender: &mpsc::Sender<ServerMessage>) {
        let _ = sender.send(ServerMessage::Error(ServerError {
            code: ErrorCode::InvalidInput,
            message: "Invalid message format".to_string(),
        })).await;
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Get the number of players in the room.
    pub async fn player_count(&self) -> usize {
        self.room.read().await.player_count()
    }
}
