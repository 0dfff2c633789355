//! Room
//!
//! The one shared match plus the outbound channel of every connected
//! client. The server keeps a `Room` behind a single `RwLock`; every
//! mutation (tick, bet, join, leave) takes the write lock.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::config::GameConfig;
use crate::core::rng::{EntropySource, OsEntropy};
use crate::game::engine::{MatchEngine, TickResult};
use crate::game::events::{EventSink, GameEvent};
use crate::game::ledger::{BetError, BetOutcome};
use crate::game::state::{MatchSnapshot, PlayerId};
use crate::network::protocol::ServerMessage;

// =============================================================================
// CLIENT SINK
// =============================================================================

/// Outbound side of one connection.
#[derive(Debug)]
struct Client {
    sender: mpsc::Sender<ServerMessage>,
    /// Dropped on eviction, which wakes the connection task.
    _evict: oneshot::Sender<()>,
}

/// Event sink that fans engine events out to per-client channels.
///
/// Never blocks. A full queue only costs a client `tick` frames, which the
/// next tick supersedes; any other message meeting a full or closed queue
/// evicts the client instead of being lost.
#[derive(Debug, Default)]
pub struct ClientSink {
    clients: BTreeMap<PlayerId, Client>,
}

impl ClientSink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a client's outbound channel.
    ///
    /// The returned receiver completes when the client is evicted or
    /// unregistered.
    pub fn register(
        &mut self,
        player_id: PlayerId,
        sender: mpsc::Sender<ServerMessage>,
    ) -> oneshot::Receiver<()> {
        let (evict_tx, evict_rx) = oneshot::channel();
        self.clients.insert(player_id, Client { sender, _evict: evict_tx });
        evict_rx
    }

    /// Detach a client. Dropping the sender ends its writer task.
    pub fn unregister(&mut self, player_id: &PlayerId) -> bool {
        self.clients.remove(player_id).is_some()
    }

    /// Attached clients.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Queue a message. Returns false if the client has to go.
    fn deliver(player_id: &PlayerId, client: &Client, message: ServerMessage) -> bool {
        match client.sender.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(ServerMessage::Tick(_))) => {
                debug!("Outbound queue full for {}, skipping tick", player_id.short());
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!("Outbound queue full for {}, disconnecting", player_id.short());
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Outbound queue closed for {}", player_id.short());
                false
            }
        }
    }
}

impl EventSink for ClientSink {
    fn notify(&mut self, player: PlayerId, event: GameEvent) {
        let keep = match self.clients.get(&player) {
            Some(client) => Self::deliver(&player, client, event.into()),
            None => true,
        };
        if !keep {
            self.unregister(&player);
        }
    }

    fn broadcast(&mut self, event: GameEvent) {
        let message = ServerMessage::from(event);
        let evicted: Vec<PlayerId> = self
            .clients
            .iter()
            .filter(|(player_id, client)| !Self::deliver(player_id, client, message.clone()))
            .map(|(player_id, _)| *player_id)
            .collect();
        for player_id in &evicted {
            self.unregister(player_id);
        }
    }
}

// =============================================================================
// ROOM
// =============================================================================

/// The single room: match engine wired to the connected clients.
pub struct Room<E = OsEntropy> {
    engine: MatchEngine<ClientSink, E>,
}

impl Room<OsEntropy> {
    /// Room drawing round seeds from the OS.
    pub fn new(config: GameConfig) -> Self {
        Self::with_entropy(config, OsEntropy)
    }
}

impl<E: EntropySource> Room<E> {
    /// Room with an explicit seed source.
    pub fn with_entropy(config: GameConfig, entropy: E) -> Self {
        Self {
            engine: MatchEngine::new(config, entropy, ClientSink::new()),
        }
    }

    /// Attach a client and run the engine's connect flow.
    ///
    /// The channel is registered first so the greeting reaches it. The
    /// returned receiver completes if the client is evicted for falling
    /// behind; the connection should then be closed and the player removed
    /// with [`Room::leave`].
    pub fn join(
        &mut self,
        player_id: PlayerId,
        sender: mpsc::Sender<ServerMessage>,
    ) -> oneshot::Receiver<()> {
        let evicted = self.engine.sink_mut().register(player_id, sender);
        self.engine.connect(player_id);
        evicted
    }

    /// Detach a client. An active bet is forfeited. Returns the final balance.
    pub fn leave(&mut self, player_id: &PlayerId) -> Option<Decimal> {
        self.engine.sink_mut().unregister(player_id);
        self.engine.disconnect(player_id)
    }

    /// Route an inbound bet request.
    pub fn bet(&mut self, player_id: PlayerId, amount: Decimal) -> Result<BetOutcome, BetError> {
        self.engine.bet(player_id, amount)
    }

    /// Advance one tick at the configured rate.
    pub fn tick(&mut self) -> TickResult {
        let dt = self.engine.tick_dt();
        self.engine.tick(dt)
    }

    /// Current public snapshot.
    pub fn snapshot(&self) -> MatchSnapshot {
        self.engine.snapshot()
    }

    /// Connected players.
    pub fn player_count(&self) -> usize {
        self.engine.sink().client_count()
    }

    /// Read access to the engine.
    pub fn engine(&self) -> &MatchEngine<ClientSink, E> {
        &self.engine
    }
}
