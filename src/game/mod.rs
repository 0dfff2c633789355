//! Game Logic Module
//!
//! The round state machine and the money it moves.
//!
//! ## Module Structure
//!
//! - `state`: Player ids, phases, client payloads
//! - `events`: Outbound events and the sink the engine publishes through
//! - `ledger`: Balances and the per-round bet list
//! - `engine`: Tick-driven round state machine

pub mod state;
pub mod events;
pub mod ledger;
pub mod engine;

// Re-export key types
pub use state::{BetState, BetStateUpdate, LogMessage, LogType, MatchPhase, MatchSnapshot, MatchState, PlayerId};
pub use events::{Audience, EventSink, GameEvent, RecordingSink};
pub use ledger::{payout, Bet, BetError, BetOutcome, BettingLedger, Player};
pub use engine::{MatchEngine, PhaseTransition, TickResult};
