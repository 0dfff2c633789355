//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Every frame is a JSON object tagged by `type`.

use rust_decimal::Decimal;
use serde::{Serialize, Deserialize};

use crate::game::events::GameEvent;
use crate::game::state::{BetStateUpdate, LogMessage, MatchSnapshot};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Place a bet, or cancel / cash out the active one.
    Bet {
        /// Requested stake (ignored when withdrawing).
        amount: Decimal,
    },

    /// Ping for latency measurement.
    Ping {
        /// Client timestamp, echoed back.
        timestamp: u64,
    },
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Round snapshot (every tick).
    Tick(MatchSnapshot),

    /// Crash history, most recent last.
    CrashPoints {
        /// Past crash multipliers.
        points: Vec<f64>,
    },

    /// Player balance.
    Balance {
        /// New balance.
        balance: Decimal,
    },

    /// Player bet state.
    BetState(BetStateUpdate),

    /// Player log line.
    Log(LogMessage),

    /// Pong response.
    Pong {
        /// Echoed client timestamp.
        timestamp: u64,
        /// Server time (Unix millis).
        server_time: i64,
    },

    /// Error message.
    Error(ServerError),

    /// Server is shutting down.
    Shutdown {
        /// Why.
        reason: String,
    },
}

impl From<GameEvent> for ServerMessage {
    fn from(event: GameEvent) -> Self {
        match event {
            GameEvent::Tick(snapshot) => ServerMessage::Tick(snapshot),
            GameEvent::CrashPoints(points) => ServerMessage::CrashPoints { points },
            GameEvent::Balance(balance) => ServerMessage::Balance { balance },
            GameEvent::BetState(update) => ServerMessage::BetState(update),
            GameEvent::Log(log) => ServerMessage::Log(log),
        }
    }
}

/// Server error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Frame could not be parsed.
    InvalidInput,
    /// Server at capacity.
    ServerOverloaded,
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
