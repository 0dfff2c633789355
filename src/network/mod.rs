//! Network Layer
//!
//! WebSocket server for real-time play. All round logic runs through
//! `game/`; this layer only moves frames.

pub mod protocol;
pub mod room;
pub mod server;

pub use protocol::{ClientMessage, ServerMessage, ServerError, ErrorCode};
pub use room::{ClientSink, Room};
pub use server::{GameServer, GameServerError};
