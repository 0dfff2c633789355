//! # Crash Game Server
//!
//! Authoritative match engine for a multiplayer crash betting game.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CRASH SERVER                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/             - Round primitives                        │
//! │  ├── curve.rs      - Time -> multiplier polynomial           │
//! │  ├── rng.rs        - Round seeds (OS or Xorshift128+)        │
//! │  └── crash_point.rs- HMAC-SHA256 crash point draw            │
//! │                                                              │
//! │  game/             - Game logic                              │
//! │  ├── state.rs      - Phases, player ids, payloads            │
//! │  ├── events.rs     - Event sink                              │
//! │  ├── ledger.rs     - Balances and bets                       │
//! │  └── engine.rs     - Tick-driven state machine               │
//! │                                                              │
//! │  network/          - Networking                              │
//! │  ├── server.rs     - WebSocket server                        │
//! │  ├── protocol.rs   - Message types                           │
//! │  └── room.rs       - Shared room and client fan-out          │
//! │                                                              │
//! │  config.rs         - Defaults and env overrides              │
//! │  simulation.rs     - Headless seeded runs                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Fairness
//!
//! Every round's crash point is `HMAC-SHA256(hex(seed), salt)` mapped to a
//! multiplier. The hash is logged when a round launches and the seed when it
//! crashes, so anyone holding the log can re-derive the round with
//! [`roll_from_seed`]. One round in `crash_per` crashes instantly at 1.00x.
//!
//! ## Money
//!
//! Balances and stakes are [`rust_decimal::Decimal`]; only the multiplier
//! is floating point.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod game;
pub mod network;
pub mod simulation;

// Re-export commonly used types
pub use config::{ConfigError, GameConfig, ServerConfig};
pub use crate::core::crash_point::{roll_from_seed, CrashPointGenerator, CrashRoll};
pub use crate::core::rng::{DeterministicRng, EntropySource, OsEntropy, RoundSeed};
pub use game::engine::{MatchEngine, PhaseTransition, TickResult};
pub use game::events::{EventSink, GameEvent, RecordingSink};
pub use game::ledger::{BetError, BetOutcome, BettingLedger};
pub use game::state::{MatchPhase, MatchSnapshot, PlayerId};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
